// THEORY:
// The normalizer turns whatever the user scribbled into the layout the digit
// classifier was trained on: the glyph is cut out of the canvas, scaled so its
// longer side spans `GLYPH_EXTENT` pixels, and pasted onto the middle of a black
// canvas of the original size. It is a stateless, deterministic transform.
//
// Algorithm steps:
// 1.  **Bounding Box**: rows and columns holding a pixel above
//     `INTENSITY_THRESHOLD` define the glyph. No such pixel means a blank canvas,
//     which is passed through untouched.
// 2.  **Crop & Quantize**: the inclusive box is copied into an 8-bit `GrayImage`
//     (round(v * 255), clamped), which is what the resampler works on.
// 3.  **Aspect-preserving Resize**: one uniform scale factor, each axis rounded
//     and never below one pixel. Resampling is Lanczos3. Cheaper filters smear
//     thin strokes and cost the classifier accuracy.
// 4.  **Center**: the resized glyph is pasted onto a zeroed canvas at the
//     floor-divided offset.
// 5.  **Transpose & Flatten**: the engine reads pixels column-major, so the canvas
//     is emitted transposed, then scaled back to [0.0, 1.0].

pub mod normalizer {
    use crate::core_modules::grid::{BoundingBox, PixelGrid};
    use crate::error::ShapeError;
    use image::imageops::{self, FilterType};
    use image::{GrayImage, Luma};

    /// A row or column is part of the glyph if any pixel in it exceeds this.
    pub const INTENSITY_THRESHOLD: f32 = 0.1;
    /// Length in pixels of the glyph's longer side after scaling.
    pub const GLYPH_EXTENT: f64 = 20.0;
    /// Side of the canvas the inference engine expects.
    pub const CANVAS_SIDE: usize = 28;

    /// Validates the buffer as a `side x side` grid and normalizes it.
    pub fn normalize_pixels(pixels: Vec<f32>, side: usize) -> Result<PixelGrid, ShapeError> {
        let grid = PixelGrid::new(pixels, side)?;
        Ok(normalize(&grid))
    }

    /// Crops, rescales and recenters the glyph. A blank grid is returned unchanged.
    pub fn normalize(grid: &PixelGrid) -> PixelGrid {
        let Some(bounds) = BoundingBox::of(grid, INTENSITY_THRESHOLD) else {
            return grid.clone();
        };
        let side = grid.side();

        let cropped = crop_to_luma(grid, &bounds);
        let (new_width, new_height) = scaled_dimensions(bounds.width(), bounds.height());
        let resized = imageops::resize(&cropped, new_width, new_height, FilterType::Lanczos3);

        let mut canvas = GrayImage::new(side as u32, side as u32);
        let offset_x = (side as i64 - new_width as i64).div_euclid(2);
        let offset_y = (side as i64 - new_height as i64).div_euclid(2);
        imageops::replace(&mut canvas, &resized, offset_x, offset_y);

        // Walking x in the outer loop emits the transpose of the canvas.
        let mut pixels = Vec::with_capacity(side * side);
        for x in 0..side as u32 {
            for y in 0..side as u32 {
                pixels.push(canvas.get_pixel(x, y).0[0] as f32 / 255.0);
            }
        }

        PixelGrid::from_square(pixels, side)
    }

    /// New (width, height) so the longer side becomes `GLYPH_EXTENT`.
    pub fn scaled_dimensions(width: usize, height: usize) -> (u32, u32) {
        let scale = GLYPH_EXTENT / width.max(height) as f64;
        let scaled = |dim: usize| ((dim as f64 * scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }

    pub fn to_intensity(value: f32) -> u8 {
        // NaN survives `clamp`, and `as u8` maps it to 0.
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    }

    fn crop_to_luma(grid: &PixelGrid, bounds: &BoundingBox) -> GrayImage {
        let side = grid.side();
        let pixels = grid.pixels();
        GrayImage::from_fn(bounds.width() as u32, bounds.height() as u32, |x, y| {
            let row = bounds.ymin + y as usize;
            let col = bounds.xmin + x as usize;
            Luma([to_intensity(pixels[row * side + col])])
        })
    }
}
