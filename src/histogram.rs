// Copyright 2026, the wu-quant authors.
// Licensed under the MIT license, see the LICENSE file or <http://opensource.org/licenses/MIT>

//! The coarse 33^3 RGB histogram and the summed-area moment tables built
//! from it. See spec sections 4.B and 4.C.

pub const SIDE: usize = 33;
pub const TOTAL_SIZE: usize = SIDE * SIDE * SIDE;

/// Packed bin id for a quantized `(r, g, b)` triple, each in `0..=32`.
///
/// This is algebraically identical to flat 3D indexing `r*33*33 + g*33 + b`
/// (since `(r<<10)+(r<<6)+r == r*1089 == r*33*33`); it is written with the
/// shifts to match the encoding spec.md assigns to `Q[]`/`Tag[]`, which the
/// two arrays must agree on bit-for-bit.
#[inline]
pub fn bin_index(r: usize, g: usize, b: usize) -> usize {
    (r << 10) + (r << 6) + r + (g << 5) + g + b
}

/// Reduces an 8-bit channel to its 5-bit histogram bucket, `1..=32`.
#[inline]
pub fn quantize_channel(c: u8) -> usize {
    (c >> 3) as usize + 1
}

/// The five moment tables, indexed `0..TOTAL_SIZE`. Row/plane 0 on every
/// axis stays zero and is the algebraic border for summed-area arithmetic.
pub struct Moments {
    pub w: Vec<i64>,
    pub mr: Vec<i64>,
    pub mg: Vec<i64>,
    pub mb: Vec<i64>,
    pub m2: Vec<f64>,
}

impl Moments {
    pub fn new() -> Self {
        Moments {
            w: vec![0; TOTAL_SIZE],
            mr: vec![0; TOTAL_SIZE],
            mg: vec![0; TOTAL_SIZE],
            mb: vec![0; TOTAL_SIZE],
            m2: vec![0.0; TOTAL_SIZE],
        }
    }

    /// Adds one sample into the raw histogram at its coarse bin.
    pub fn add(&mut self, ir: usize, ig: usize, ib: usize, r: u8, g: u8, b: u8) {
        let idx = bin_index(ir, ig, ib);
        self.w[idx] += 1;
        debug_assert!(self.w[idx] > 0, "pixel count overflowed a 64-bit moment accumulator");
        self.mr[idx] += r as i64;
        self.mg[idx] += g as i64;
        self.mb[idx] += b as i64;
        let (r, g, b) = (r as f64, g as f64, b as f64);
        self.m2[idx] += r * r + g * g + b * b;
    }

    /// Converts the raw per-bin histogram into full 3D summed-area tables,
    /// so that `T[r,g,b] == sum of H[i,j,k] for i<=r, j<=g, k<=b`.
    ///
    /// Standard row/line/area decomposition: for each fixed `r` plane, a 2D
    /// prefix sum over `(g, b)` is accumulated into `area`/`line`, then added
    /// to the already-converted `r-1` plane. All five tables share the pass.
    pub fn build(&mut self) {
        for r in 1..SIDE {
            let mut area_w = [0i64; SIDE];
            let mut area_r = [0i64; SIDE];
            let mut area_g = [0i64; SIDE];
            let mut area_b = [0i64; SIDE];
            let mut area_m2 = [0.0f64; SIDE];

            for g in 1..SIDE {
                let mut line_w = 0i64;
                let mut line_r = 0i64;
                let mut line_g = 0i64;
                let mut line_b = 0i64;
                let mut line_m2 = 0.0f64;

                for b in 1..SIDE {
                    let idx = bin_index(r, g, b);
                    let prev = bin_index(r - 1, g, b);

                    line_w += self.w[idx];
                    line_r += self.mr[idx];
                    line_g += self.mg[idx];
                    line_b += self.mb[idx];
                    line_m2 += self.m2[idx];

                    area_w[b] += line_w;
                    area_r[b] += line_r;
                    area_g[b] += line_g;
                    area_b[b] += line_b;
                    area_m2[b] += line_m2;

                    self.w[idx] = self.w[prev] + area_w[b];
                    self.mr[idx] = self.mr[prev] + area_r[b];
                    self.mg[idx] = self.mg[prev] + area_g[b];
                    self.mb[idx] = self.mb[prev] + area_b[b];
                    self.m2[idx] = self.m2[prev] + area_m2[b];
                }
            }
        }
    }
}

impl Default for Moments {
    fn default() -> Self {
        Self::new()
    }
}
