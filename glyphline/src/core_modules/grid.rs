// THEORY:
// `PixelGrid` is the "dumb" data container of the crate: a square grayscale
// image stored as row-major `f32` intensities, nominally in [0.0, 1.0]. It knows
// its side length and guarantees, by construction, that the buffer holds exactly
// `side * side` values. Everything else (cropping, resampling, serializing) lives
// in the modules that consume it.
//
// `BoundingBox` is the tightest inclusive rectangle around the "ink": the rows
// and columns holding at least one pixel above a threshold. A blank canvas has
// no bounding box at all, which is why `BoundingBox::of` returns an `Option`.

use crate::error::ShapeError;

/// A square grayscale image in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid {
    side: usize,
    pixels: Vec<f32>,
}

impl PixelGrid {
    pub fn new(pixels: Vec<f32>, side: usize) -> Result<Self, ShapeError> {
        let expected = side * side;
        if pixels.len() != expected {
            return Err(ShapeError {
                side,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { side, pixels })
    }

    /// For buffers that are `side * side` by construction.
    pub(crate) fn from_square(pixels: Vec<f32>, side: usize) -> Self {
        debug_assert_eq!(pixels.len(), side * side);
        Self { side, pixels }
    }

    /// An all-black grid.
    pub fn blank(side: usize) -> Self {
        Self {
            side,
            pixels: vec![0.0; side * side],
        }
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.side || col >= self.side {
            return None;
        }
        Some(self.pixels[row * self.side + col])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // `chunks` panics on zero, and a 0x0 grid has no rows anyway.
        self.pixels.chunks(self.side.max(1))
    }
}

/// Inclusive bounds of the active region of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub ymin: usize,
    pub ymax: usize,
    pub xmin: usize,
    pub xmax: usize,
}

impl BoundingBox {
    /// Finds the rows and columns holding a pixel strictly above `threshold`.
    /// Returns `None` for a blank grid.
    pub fn of(grid: &PixelGrid, threshold: f32) -> Option<Self> {
        let mut bounds: Option<Self> = None;

        for (y, row) in grid.rows().enumerate() {
            for (x, &value) in row.iter().enumerate() {
                if value <= threshold || value.is_nan() {
                    continue;
                }
                bounds = Some(match bounds {
                    None => Self {
                        ymin: y,
                        ymax: y,
                        xmin: x,
                        xmax: x,
                    },
                    Some(b) => Self {
                        ymin: b.ymin.min(y),
                        ymax: b.ymax.max(y),
                        xmin: b.xmin.min(x),
                        xmax: b.xmax.max(x),
                    },
                });
            }
        }

        bounds
    }

    pub fn width(&self) -> usize {
        self.xmax - self.xmin + 1
    }

    pub fn height(&self) -> usize {
        self.ymax - self.ymin + 1
    }
}
