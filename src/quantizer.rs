// Copyright 2026, the wu-quant authors.
// Licensed under the MIT license, see the LICENSE file or <http://opensource.org/licenses/MIT>

//! The stateful quantizer: lifecycle enforcement, cube partitioning,
//! palette derivation and refinement, and the sequential index stream.
//! See spec sections 4.E, 4.F, 5 and 6.

use crate::color::{flatten, Background, Color};
use crate::cube::{cut, variance, vol, Cube};
use crate::error::Error;
use crate::histogram::{bin_index, quantize_channel, Moments, TOTAL_SIZE};

/// Twice the maximum palette size (`256`), a workspace allowance for the
/// partitioner's failed-cut retries (spec.md section 9).
const MAX_COLOR: usize = 512;

/// `2^24` distinct RGB triples, tracked one bit each.
const PRESENCE_WORDS: usize = (1 << 24) / 64;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Empty,
    Ready,
    Accumulating,
    Partitioned,
    Streaming,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::Empty => "Empty",
            State::Ready => "Ready",
            State::Accumulating => "Accumulating",
            State::Partitioned => "Partitioned",
            State::Streaming => "Streaming",
        }
    }
}

fn invalid_state(expected: &'static str, actual: State) -> Error {
    Error::InvalidState { expected, actual: actual.name() }
}

/// Reduces the color palette of a pixel stream to at most 256 representative
/// colors using Xiaolin Wu's variance-minimizing histogram quantizer.
///
/// Usage follows a strict lifecycle: [`prepare`](Self::prepare), then
/// exactly as many [`add_color`](Self::add_color) calls as the pixel count,
/// then [`build_palette`](Self::build_palette), then up to that many
/// [`palette_index_for_next_pixel`](Self::palette_index_for_next_pixel)
/// calls. Calling an operation out of order returns `Error::InvalidState`
/// and poisons nothing else about the instance's validity going forward
/// for the remaining calls in the correct order.
pub struct WuQuantizer {
    background: Background,
    state: State,
    capacity: usize,
    count: usize,
    moments: Moments,
    presence: Vec<u64>,
    bins: Vec<u32>,
    colors: Vec<Color>,
    palette: Vec<Color>,
    indices: Vec<u32>,
    cursor: usize,
}

impl WuQuantizer {
    /// Creates a quantizer that composites transparent pixels onto white.
    pub fn new() -> Self {
        Self::with_background(Background::default())
    }

    /// Creates a quantizer that composites transparent pixels onto `background`.
    pub fn with_background(background: Background) -> Self {
        WuQuantizer {
            background,
            state: State::Empty,
            capacity: 0,
            count: 0,
            moments: Moments::new(),
            presence: Vec::new(),
            bins: Vec::new(),
            colors: Vec::new(),
            palette: Vec::new(),
            indices: Vec::new(),
            cursor: 0,
        }
    }

    /// Reserves histogram and per-pixel storage for a `width * height` pixel image.
    pub fn prepare(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if self.state != State::Empty {
            return Err(invalid_state("Empty", self.state));
        }

        let capacity = width as usize * height as usize;
        self.capacity = capacity;
        self.count = 0;
        self.moments = Moments::new();
        self.presence = vec![0u64; PRESENCE_WORDS];
        self.bins = Vec::with_capacity(capacity);
        self.colors = Vec::with_capacity(capacity);
        self.state = State::Ready;
        Ok(())
    }

    /// Flattens and accumulates one 32-bit ARGB pixel into the histogram.
    pub fn add_color(&mut self, argb: u32) -> Result<(), Error> {
        match self.state {
            State::Ready | State::Accumulating => {}
            other => return Err(invalid_state("Ready or Accumulating", other)),
        }
        if self.count >= self.capacity {
            return Err(Error::CapacityExceeded);
        }

        let rgb = flatten(argb, self.background);
        let ir = quantize_channel(rgb.r);
        let ig = quantize_channel(rgb.g);
        let ib = quantize_channel(rgb.b);

        self.moments.add(ir, ig, ib, rgb.r, rgb.g, rgb.b);

        let key = ((rgb.r as u32) << 16) | ((rgb.g as u32) << 8) | rgb.b as u32;
        self.presence[(key >> 6) as usize] |= 1u64 << (key & 63);

        self.bins.push(bin_index(ir, ig, ib) as u32);
        self.colors.push(rgb);
        self.count += 1;
        self.state = State::Accumulating;
        Ok(())
    }

    /// Counts distinct post-flatten RGB triples seen so far.
    pub fn distinct_color_count(&self) -> Result<usize, Error> {
        if self.state == State::Empty {
            return Err(invalid_state("Ready, Accumulating, Partitioned or Streaming", self.state));
        }
        Ok(self.presence.iter().map(|word| word.count_ones() as usize).sum())
    }

    /// Partitions the histogram into at most `desired_colors` cubes (`2..=256`)
    /// and derives + refines a palette. Returns the final palette, whose
    /// length may be less than `desired_colors` if no further profitable
    /// split exists.
    pub fn build_palette(&mut self, desired_colors: u16) -> Result<&[Color], Error> {
        match self.state {
            State::Ready | State::Accumulating => {}
            other => return Err(invalid_state("Ready or Accumulating", other)),
        }
        if !(2..=256).contains(&desired_colors) {
            return Err(Error::OutOfRange);
        }
        if self.count != self.capacity {
            return Err(invalid_state("all reserved pixels added", self.state));
        }

        let mut moments = std::mem::replace(&mut self.moments, Moments::new());
        moments.build();
        debug_assert_eq!(moments.w[bin_index(32, 32, 32)], self.capacity as i64);

        let (cubes, color_count) = partition(&moments, desired_colors as usize);

        let tag = tag_bins(&cubes[..color_count]);
        let centroids = centroids(&cubes[..color_count], &moments);
        let (palette, indices) = refine(&self.colors, &self.bins, &tag, &centroids);
        let (palette, indices) = order_palette_by_value(palette, indices);

        self.palette = palette;
        self.indices = indices;
        self.cursor = 0;
        self.state = State::Partitioned;
        Ok(&self.palette)
    }

    /// The palette produced by `build_palette`.
    pub fn palette(&self) -> Result<&[Color], Error> {
        match self.state {
            State::Partitioned | State::Streaming => Ok(&self.palette),
            other => Err(invalid_state("Partitioned or Streaming", other)),
        }
    }

    /// Returns the palette index chosen for the next pixel in the original
    /// input order. Must be called exactly `width * height` times in total.
    pub fn palette_index_for_next_pixel(&mut self) -> Result<usize, Error> {
        match self.state {
            State::Partitioned | State::Streaming => {}
            other => return Err(invalid_state("Partitioned or Streaming", other)),
        }
        if self.cursor >= self.indices.len() {
            return Err(Error::OutOfRange);
        }
        let index = self.indices[self.cursor] as usize;
        self.cursor += 1;
        self.state = State::Streaming;
        Ok(index)
    }

    /// Finds the palette entry nearest `color` in RGB space, independent of
    /// the sequential index stream. Ties favor the lowest palette index.
    pub fn lookup_by_color(&self, color: Color) -> Result<usize, Error> {
        match self.state {
            State::Partitioned | State::Streaming => {}
            other => return Err(invalid_state("Partitioned or Streaming", other)),
        }
        let mut best_k = 0;
        let mut best_d = f64::MAX;
        for (k, p) in self.palette.iter().enumerate() {
            let d = squared_distance(color, *p);
            if d < best_d {
                best_d = d;
                best_k = k;
            }
        }
        Ok(best_k)
    }
}

impl Default for WuQuantizer {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn squared_distance(a: Color, b: Color) -> f64 {
    let dr = a.r as f64 - b.r as f64;
    let dg = a.g as f64 - b.g as f64;
    let db = a.b as f64 - b.b as f64;
    dr * dr + dg * dg + db * db
}

/// Greedily splits cubes by variance until `desired_colors` cubes exist or
/// no remaining cube has positive variance. Returns the cube arena and the
/// number of cubes actually populated.
fn partition(moments: &Moments, desired_colors: usize) -> (Vec<Cube>, usize) {
    let mut cubes = vec![Cube::empty(); MAX_COLOR];
    cubes[0] = Cube::whole();

    let mut variance_scores = vec![0.0f64; MAX_COLOR];
    let mut next = 0usize;
    let mut i = 1usize;
    let mut generated = desired_colors;

    while i < desired_colors {
        let ok = {
            let (left, right) = cubes.split_at_mut(i);
            cut(&mut left[next], &mut right[0], &moments.mr, &moments.mg, &moments.mb, &moments.w)
        };

        if ok {
            variance_scores[next] = cube_variance(&cubes[next], moments);
            variance_scores[i] = cube_variance(&cubes[i], moments);
        } else {
            variance_scores[next] = 0.0;
            i -= 1;
        }

        next = 0;
        let mut best = variance_scores[0];
        for (j, &score) in variance_scores.iter().enumerate().take(i + 1).skip(1) {
            if score > best {
                best = score;
                next = j;
            }
        }

        if best <= 0.0 {
            generated = i + 1;
            break;
        }
        i += 1;
    }

    (cubes, generated)
}

fn cube_variance(cube: &Cube, moments: &Moments) -> f64 {
    if cube.volume > 1 {
        variance(cube, &moments.mr, &moments.mg, &moments.mb, &moments.m2, &moments.w)
    } else {
        0.0
    }
}

/// Stamps every bin strictly inside each final cube with that cube's index.
fn tag_bins(cubes: &[Cube]) -> Vec<u16> {
    let mut tag = vec![0u16; TOTAL_SIZE];
    for (k, cube) in cubes.iter().enumerate() {
        for r in (cube.r_min + 1)..=cube.r_max {
            for g in (cube.g_min + 1)..=cube.g_max {
                for b in (cube.b_min + 1)..=cube.b_max {
                    tag[bin_index(r as usize, g as usize, b as usize)] = k as u16;
                }
            }
        }
    }
    tag
}

/// The moment-derived mean color of each cube, truncated to integer;
/// `(0, 0, 0)` for an empty cube.
fn centroids(cubes: &[Cube], moments: &Moments) -> Vec<Color> {
    cubes
        .iter()
        .map(|cube| {
            let w = vol(cube, &moments.w);
            if w > 0 {
                Color::new(
                    (vol(cube, &moments.mr) / w) as u8,
                    (vol(cube, &moments.mg) / w) as u8,
                    (vol(cube, &moments.mb) / w) as u8,
                )
            } else {
                Color::new(0, 0, 0)
            }
        })
        .collect()
}

/// Nearest-centroid re-clustering in original color space: every pixel is
/// reassigned to its closest centroid (not necessarily the cube its bin
/// landed in), and the final palette color is the mean of its reassigned
/// members.
fn refine(colors: &[Color], bins: &[u32], tag: &[u16], centroids: &[Color]) -> (Vec<Color>, Vec<u32>) {
    let k = centroids.len();
    let mut reds = vec![0i64; k];
    let mut greens = vec![0i64; k];
    let mut blues = vec![0i64; k];
    let mut sums = vec![0i64; k];
    let mut indices = vec![0u32; colors.len()];

    for (i, &color) in colors.iter().enumerate() {
        let incumbent = tag[bins[i] as usize] as usize;
        let mut best_k = incumbent;
        let mut best_distance = 1.0e8f64;

        for (ci, &centroid) in centroids.iter().enumerate() {
            let d = squared_distance(color, centroid);
            if d < best_distance {
                best_distance = d;
                best_k = ci;
            }
        }

        reds[best_k] += color.r as i64;
        greens[best_k] += color.g as i64;
        blues[best_k] += color.b as i64;
        sums[best_k] += 1;
        indices[i] = best_k as u32;
    }

    let palette = (0..k)
        .map(|ci| {
            if sums[ci] > 0 {
                Color::new((reds[ci] / sums[ci]) as u8, (greens[ci] / sums[ci]) as u8, (blues[ci] / sums[ci]) as u8)
            } else {
                centroids[ci]
            }
        })
        .collect();

    (palette, indices)
}

/// Reorders the palette ascending by `(r, g, b)` value and remaps `indices`
/// to match, so that monotone-in-color pixel streams (e.g. a grayscale
/// ramp) get monotone-in-index output regardless of the cube-creation order
/// the clusters happened to be produced in.
fn order_palette_by_value(palette: Vec<Color>, indices: Vec<u32>) -> (Vec<Color>, Vec<u32>) {
    let k = palette.len();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by_key(|&i| (palette[i].r, palette[i].g, palette[i].b));

    let mut rank = vec![0u32; k];
    for (new_index, &old_index) in order.iter().enumerate() {
        rank[old_index] = new_index as u32;
    }

    let sorted_palette = order.iter().map(|&i| palette[i]).collect();
    let remapped_indices = indices.iter().map(|&old| rank[old as usize]).collect();
    (sorted_palette, remapped_indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(q: &mut WuQuantizer, colors: &[u32]) {
        q.prepare(colors.len() as u32, 1).unwrap();
        for &c in colors {
            q.add_color(c).unwrap();
        }
    }

    #[test]
    fn single_color_image_collapses_to_one_entry() {
        let mut q = WuQuantizer::new();
        let colors = vec![0xFF_FF_00_00u32; 100];
        fill(&mut q, &colors);
        assert_eq!(q.distinct_color_count().unwrap(), 1);

        let palette = q.build_palette(4).unwrap().to_vec();
        assert_eq!(palette, vec![Color::new(255, 0, 0)]);

        for _ in 0..100 {
            assert_eq!(q.palette_index_for_next_pixel().unwrap(), 0);
        }
        assert_eq!(q.palette_index_for_next_pixel(), Err(Error::OutOfRange));
    }

    #[test]
    fn two_well_separated_clusters() {
        let mut q = WuQuantizer::new();
        let mut colors = vec![0xFF_00_00_00u32; 50];
        colors.extend(vec![0xFF_FF_FF_FFu32; 50]);
        fill(&mut q, &colors);

        let palette = q.build_palette(2).unwrap().to_vec();
        assert_eq!(palette.len(), 2);

        let black_idx = q.lookup_by_color(Color::new(0, 0, 0)).unwrap();
        let white_idx = q.lookup_by_color(Color::new(255, 255, 255)).unwrap();
        assert_ne!(black_idx, white_idx);

        for _ in 0..50 {
            assert_eq!(q.palette_index_for_next_pixel().unwrap(), black_idx);
        }
        for _ in 0..50 {
            assert_eq!(q.palette_index_for_next_pixel().unwrap(), white_idx);
        }
    }

    #[test]
    fn overrequest_keeps_every_distinct_color() {
        let mut q = WuQuantizer::new();
        let colors = vec![0xFF_FF_00_00u32, 0xFF_00_FF_00u32, 0xFF_00_00_FFu32, 0xFF_10_20_30u32];
        fill(&mut q, &colors);
        let palette = q.build_palette(16).unwrap();
        assert_eq!(palette.len(), 4);
    }

    #[test]
    fn grayscale_ramp_is_monotonic() {
        let mut q = WuQuantizer::new();
        let colors: Vec<u32> = (0..256u32).map(|i| 0xFF_00_00_00 | (i << 16) | (i << 8) | i).collect();
        fill(&mut q, &colors);
        q.build_palette(8).unwrap();

        let mut last = q.palette_index_for_next_pixel().unwrap();
        for _ in 1..256 {
            let next = q.palette_index_for_next_pixel().unwrap();
            assert!(next >= last, "ramp index went backwards: {} -> {}", last, next);
            last = next;
        }
    }

    #[test]
    fn lifecycle_violations_are_rejected() {
        let mut q = WuQuantizer::new();
        assert!(matches!(q.add_color(0xFF000000), Err(Error::InvalidState { .. })));
        assert!(matches!(q.build_palette(4), Err(Error::InvalidState { .. })));

        q.prepare(1, 1).unwrap();
        assert!(matches!(q.prepare(1, 1), Err(Error::InvalidState { .. })));

        q.add_color(0xFF112233).unwrap();
        assert_eq!(q.add_color(0xFF112233), Err(Error::CapacityExceeded));

        q.build_palette(2).unwrap();
        assert!(matches!(q.build_palette(2), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn build_palette_rejects_out_of_range_k() {
        let mut q = WuQuantizer::new();
        q.prepare(1, 1).unwrap();
        q.add_color(0xFF112233).unwrap();
        assert_eq!(q.build_palette(1), Err(Error::OutOfRange));
        assert_eq!(q.build_palette(257), Err(Error::OutOfRange));
    }

    #[test]
    fn mse_is_monotonically_nonincreasing_as_k_grows() {
        fn mse_for_k(colors: &[u32], k: u16) -> f64 {
            let mut q = WuQuantizer::new();
            q.prepare(colors.len() as u32, 1).unwrap();
            for &c in colors {
                q.add_color(c).unwrap();
            }
            q.build_palette(k).unwrap();
            let mut total = 0.0;
            for &c in colors {
                let rgb = flatten(c, Background::default());
                let idx = q.palette_index_for_next_pixel().unwrap();
                let p = q.palette().unwrap()[idx];
                total += squared_distance(rgb, p);
            }
            total / colors.len() as f64
        }

        let mut colors = Vec::new();
        for i in 0..64u32 {
            let shade = i * 4;
            colors.push(0xFF_00_00_00 | (shade << 16) | ((255 - shade) << 8) | shade);
        }

        let mse2 = mse_for_k(&colors, 2);
        let mse8 = mse_for_k(&colors, 8);
        let mse32 = mse_for_k(&colors, 32);
        assert!(mse8 <= mse2 + 1e-9);
        assert!(mse32 <= mse8 + 1e-9);
    }
}
