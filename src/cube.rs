// Copyright 2026, the wu-quant authors.
// Licensed under the MIT license, see the LICENSE file or <http://opensource.org/licenses/MIT>

//! Axis-aligned cubes over the 33^3 histogram lattice, and Wu's greedy
//! variance-maximizing split search. See spec section 4.D.

use crate::histogram::bin_index;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    Red,
    Green,
    Blue,
}

/// An axis-aligned box over the coarse RGB lattice. Bounds are
/// exclusive-min, inclusive-max: the bin covered on each axis is
/// `min+1 ..= max`.
#[derive(Clone, Copy, Debug)]
pub struct Cube {
    pub r_min: u8,
    pub r_max: u8,
    pub g_min: u8,
    pub g_max: u8,
    pub b_min: u8,
    pub b_max: u8,
    pub volume: i64,
}

impl Cube {
    pub fn whole() -> Self {
        let mut c = Cube { r_min: 0, r_max: 32, g_min: 0, g_max: 32, b_min: 0, b_max: 32, volume: 0 };
        c.recalc_volume();
        c
    }

    pub fn empty() -> Self {
        Cube { r_min: 0, r_max: 0, g_min: 0, g_max: 0, b_min: 0, b_max: 0, volume: 0 }
    }

    fn recalc_volume(&mut self) {
        self.volume = (self.r_max - self.r_min) as i64
            * (self.g_max - self.g_min) as i64
            * (self.b_max - self.b_min) as i64;
    }
}

/// 3D inclusion-exclusion sum of an integer moment table over `cube`.
pub fn vol(cube: &Cube, t: &[i64]) -> i64 {
    let (r0, r1) = (cube.r_min as usize, cube.r_max as usize);
    let (g0, g1) = (cube.g_min as usize, cube.g_max as usize);
    let (b0, b1) = (cube.b_min as usize, cube.b_max as usize);

    t[bin_index(r1, g1, b1)]
        - t[bin_index(r1, g1, b0)]
        - t[bin_index(r1, g0, b1)]
        + t[bin_index(r1, g0, b0)]
        - t[bin_index(r0, g1, b1)]
        + t[bin_index(r0, g1, b0)]
        + t[bin_index(r0, g0, b1)]
        - t[bin_index(r0, g0, b0)]
}

/// Same inclusion-exclusion sum, for the floating-point squared-magnitude table.
pub fn vol_f64(cube: &Cube, t: &[f64]) -> f64 {
    let (r0, r1) = (cube.r_min as usize, cube.r_max as usize);
    let (g0, g1) = (cube.g_min as usize, cube.g_max as usize);
    let (b0, b1) = (cube.b_min as usize, cube.b_max as usize);

    t[bin_index(r1, g1, b1)]
        - t[bin_index(r1, g1, b0)]
        - t[bin_index(r1, g0, b1)]
        + t[bin_index(r1, g0, b0)]
        - t[bin_index(r0, g1, b1)]
        + t[bin_index(r0, g1, b0)]
        + t[bin_index(r0, g0, b1)]
        - t[bin_index(r0, g0, b0)]
}

/// The moment of the degenerate face at `axis`'s minimum bound.
fn bottom(cube: &Cube, axis: Axis, t: &[i64]) -> i64 {
    let (r0, r1) = (cube.r_min as usize, cube.r_max as usize);
    let (g0, g1) = (cube.g_min as usize, cube.g_max as usize);
    let (b0, b1) = (cube.b_min as usize, cube.b_max as usize);

    match axis {
        Axis::Red => {
            -t[bin_index(r0, g1, b1)] + t[bin_index(r0, g1, b0)] + t[bin_index(r0, g0, b1)]
                - t[bin_index(r0, g0, b0)]
        }
        Axis::Green => {
            -t[bin_index(r1, g0, b1)] + t[bin_index(r1, g0, b0)] + t[bin_index(r0, g0, b1)]
                - t[bin_index(r0, g0, b0)]
        }
        Axis::Blue => {
            -t[bin_index(r1, g1, b0)] + t[bin_index(r1, g0, b0)] + t[bin_index(r0, g1, b0)]
                - t[bin_index(r0, g0, b0)]
        }
    }
}

/// The moment of the slab at `axis` fixed at `pos`, spanning the cube's
/// other two axes.
fn top(cube: &Cube, axis: Axis, pos: usize, t: &[i64]) -> i64 {
    let (r0, r1) = (cube.r_min as usize, cube.r_max as usize);
    let (g0, g1) = (cube.g_min as usize, cube.g_max as usize);
    let (b0, b1) = (cube.b_min as usize, cube.b_max as usize);

    match axis {
        Axis::Red => {
            t[bin_index(pos, g1, b1)] - t[bin_index(pos, g1, b0)] - t[bin_index(pos, g0, b1)]
                + t[bin_index(pos, g0, b0)]
        }
        Axis::Green => {
            t[bin_index(r1, pos, b1)] - t[bin_index(r1, pos, b0)] - t[bin_index(r0, pos, b1)]
                + t[bin_index(r0, pos, b0)]
        }
        Axis::Blue => {
            t[bin_index(r1, g1, pos)] - t[bin_index(r1, g0, pos)] - t[bin_index(r0, g1, pos)]
                + t[bin_index(r0, g0, pos)]
        }
    }
}

#[inline]
fn sq_mag(r: i64, g: i64, b: i64) -> f64 {
    // Cast before squaring: channel sums over very large images can exceed
    // i64's square root headroom even though the sums themselves fit i64.
    let (r, g, b) = (r as f64, g as f64, b as f64);
    r * r + g * g + b * b
}

/// The residual sum of squares if every pixel in `cube` is approximated by
/// its mean color. Zero for an empty cube.
pub fn variance(cube: &Cube, mr: &[i64], mg: &[i64], mb: &[i64], m2: &[f64], w: &[i64]) -> f64 {
    let weight = vol(cube, w);
    if weight == 0 {
        return 0.0;
    }
    let dr = vol(cube, mr);
    let dg = vol(cube, mg);
    let db = vol(cube, mb);
    let xx = vol_f64(cube, m2);
    xx - sq_mag(dr, dg, db) / weight as f64
}

struct MaximizeResult {
    score: f64,
    cut_pos: Option<u8>,
}

#[allow(clippy::too_many_arguments)]
fn maximize(
    cube: &Cube,
    axis: Axis,
    first: u8,
    last: u8,
    whole_r: i64,
    whole_g: i64,
    whole_b: i64,
    whole_w: i64,
    mr: &[i64],
    mg: &[i64],
    mb: &[i64],
    w: &[i64],
) -> MaximizeResult {
    let base_r = bottom(cube, axis, mr);
    let base_g = bottom(cube, axis, mg);
    let base_b = bottom(cube, axis, mb);
    let base_w = bottom(cube, axis, w);

    let mut best = 0.0;
    let mut cut_pos = None;

    for p in first..last {
        let lo_r = base_r + top(cube, axis, p as usize, mr);
        let lo_g = base_g + top(cube, axis, p as usize, mg);
        let lo_b = base_b + top(cube, axis, p as usize, mb);
        let lo_w = base_w + top(cube, axis, p as usize, w);

        if lo_w == 0 {
            continue;
        }

        let hi_w = whole_w - lo_w;
        if hi_w == 0 {
            continue;
        }

        let hi_r = whole_r - lo_r;
        let hi_g = whole_g - lo_g;
        let hi_b = whole_b - lo_b;

        let score = sq_mag(lo_r, lo_g, lo_b) / lo_w as f64 + sq_mag(hi_r, hi_g, hi_b) / hi_w as f64;

        if score > best {
            best = score;
            cut_pos = Some(p);
        }
    }

    MaximizeResult { score: best, cut_pos }
}

/// Splits `a` into a shrunken `a` and a new `b`, choosing the axis and
/// position that maximizes the combined variance of the two halves. Ties
/// between axes are broken Red > Green > Blue. Returns `false` (leaving
/// both cubes untouched) when no profitable split exists.
pub fn cut(a: &mut Cube, b: &mut Cube, mr: &[i64], mg: &[i64], mb: &[i64], w: &[i64]) -> bool {
    let whole_r = vol(a, mr);
    let whole_g = vol(a, mg);
    let whole_b = vol(a, mb);
    let whole_w = vol(a, w);

    let red = maximize(a, Axis::Red, a.r_min + 1, a.r_max, whole_r, whole_g, whole_b, whole_w, mr, mg, mb, w);
    let green = maximize(a, Axis::Green, a.g_min + 1, a.g_max, whole_r, whole_g, whole_b, whole_w, mr, mg, mb, w);
    let blue = maximize(a, Axis::Blue, a.b_min + 1, a.b_max, whole_r, whole_g, whole_b, whole_w, mr, mg, mb, w);

    let (axis, chosen) = if red.score >= green.score && red.score >= blue.score {
        (Axis::Red, &red)
    } else if green.score >= red.score && green.score >= blue.score {
        (Axis::Green, &green)
    } else {
        (Axis::Blue, &blue)
    };

    let Some(cut_pos) = chosen.cut_pos else {
        return false;
    };

    *b = *a;
    match axis {
        Axis::Red => {
            a.r_max = cut_pos;
            b.r_min = cut_pos;
        }
        Axis::Green => {
            a.g_max = cut_pos;
            b.g_min = cut_pos;
        }
        Axis::Blue => {
            a.b_max = cut_pos;
            b.b_min = cut_pos;
        }
    }

    a.recalc_volume();
    b.recalc_volume();

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Moments;

    fn moments_of_samples(samples: &[(u8, u8, u8)]) -> Moments {
        let mut m = Moments::new();
        for &(r, g, b) in samples {
            let ir = (r >> 3) as usize + 1;
            let ig = (g >> 3) as usize + 1;
            let ib = (b >> 3) as usize + 1;
            m.add(ir, ig, ib, r, g, b);
        }
        m.build();
        m
    }

    #[test]
    fn whole_cube_volume() {
        let c = Cube::whole();
        assert_eq!(c.volume, 32 * 32 * 32);
    }

    #[test]
    fn vol_of_whole_cube_equals_sample_count() {
        let m = moments_of_samples(&[(10, 10, 10), (200, 200, 200), (0, 0, 0)]);
        let c = Cube::whole();
        assert_eq!(vol(&c, &m.w), 3);
    }

    #[test]
    fn variance_is_nonnegative_and_zero_for_uniform_cube() {
        let m = moments_of_samples(&[(10, 10, 10), (10, 10, 10), (10, 10, 10)]);
        let c = Cube::whole();
        let v = variance(&c, &m.mr, &m.mg, &m.mb, &m.m2, &m.w);
        assert!(v >= -1e-6);
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn cut_splits_two_well_separated_clusters() {
        let mut samples = Vec::new();
        for _ in 0..50 {
            samples.push((0u8, 0u8, 0u8));
        }
        for _ in 0..50 {
            samples.push((255u8, 255u8, 255u8));
        }
        let m = moments_of_samples(&samples);
        let mut a = Cube::whole();
        let mut b = Cube::empty();
        let ok = cut(&mut a, &mut b, &m.mr, &m.mg, &m.mb, &m.w);
        assert!(ok);
        assert_eq!(vol(&a, &m.w) + vol(&b, &m.w), 100);
        assert!(vol(&a, &m.w) > 0);
        assert!(vol(&b, &m.w) > 0);
    }
}
