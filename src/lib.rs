// Copyright 2026, the wu-quant authors.
// Licensed under the MIT license, see the LICENSE file or <http://opensource.org/licenses/MIT>

/*!
*wu-quant* reduces the color palette of a raster image down to a
caller-specified number of representative colors, for indexed-color output
such as 8-bit PNG/GIF. It implements Xiaolin Wu's greedy
variance-minimization method over a coarse 33^3 RGB histogram.

Image decoding/encoding, pixel iteration over a platform image surface, and
dithering are out of scope: the only assumption made about a pixel source is
that it yields a finite sequence of 32-bit ARGB pixels with a known total
count, supplied one at a time through [`WuQuantizer::add_color`].

```
use wu_quant::WuQuantizer;

let mut q = WuQuantizer::new();
q.prepare(2, 1).unwrap();
q.add_color(0xFF_FF_00_00).unwrap();
q.add_color(0xFF_00_00_FF).unwrap();

let palette = q.build_palette(2).unwrap();
assert_eq!(palette.len(), 2);

for _ in 0..2 {
    let _index = q.palette_index_for_next_pixel().unwrap();
}
```
*/

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod color;
mod cube;
mod error;
mod histogram;
mod quantizer;

pub use color::{Background, Color};
pub use error::Error;
pub use quantizer::WuQuantizer;
