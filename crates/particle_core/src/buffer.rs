//! 2D buffers shared by every stage of the engine.
//!
//! - `Mask`: binary image, `true` marks particle foreground
//! - `Canvas`: real-valued grayscale image, nominally in [0.0, 1.0]
//!
//! Both are row-major and addressed as `(x, y)` = `(column, row)`.
//! Reads outside the buffer return background; writes outside are ignored.

use image::{GrayImage, Luma};

/// Axis-aligned pixel rectangle, `x0..x1` by `y0..y1` (exclusive ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// A binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Flat array of foreground flags (row-major order).
    pub data: Vec<bool>,
}

impl Mask {
    /// Create an all-background mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Set the pixel at (x, y). Does nothing if out of bounds.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Get the pixel at (x, y). Returns background if out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x]
    }

    /// Signed lookup, background outside the buffer.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && self.get(x as usize, y as usize)
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Whether the mask has no foreground at all.
    pub fn is_blank(&self) -> bool {
        !self.data.iter().any(|&v| v)
    }

    /// Reset every pixel to background.
    pub fn clear(&mut self) {
        self.data.fill(false);
    }

    /// Whether any row `y` pixel is foreground.
    pub fn row_any(&self, y: usize) -> bool {
        y < self.height && self.data[y * self.width..(y + 1) * self.width].iter().any(|&v| v)
    }

    /// Whether any column `x` pixel is foreground.
    pub fn col_any(&self, x: usize) -> bool {
        x < self.width && (0..self.height).any(|y| self.data[y * self.width + x])
    }

    /// Tight bounding box of the foreground, `None` for a blank mask.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut rect: Option<Rect> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.data[y * self.width + x] {
                    continue;
                }
                rect = Some(match rect {
                    None => Rect { x0: x, y0: y, x1: x + 1, y1: y + 1 },
                    Some(r) => Rect {
                        x0: r.x0.min(x),
                        y0: r.y0.min(y),
                        x1: r.x1.max(x + 1),
                        y1: r.y1.max(y + 1),
                    },
                });
            }
        }
        rect
    }

    /// Copy out a sub-rectangle. The rect must lie inside the mask.
    pub fn crop(&self, rect: Rect) -> Mask {
        let mut out = Mask::new(rect.width(), rect.height());
        for y in 0..rect.height() {
            let src = (rect.y0 + y) * self.width + rect.x0;
            out.data[y * out.width..(y + 1) * out.width]
                .copy_from_slice(&self.data[src..src + rect.width()]);
        }
        out
    }

    /// OR `other` into this mask with its top-left at (x0, y0).
    ///
    /// Pixels landing outside this mask are clipped.
    pub fn or_at(&mut self, other: &Mask, x0: i64, y0: i64) {
        for y in 0..other.height {
            for x in 0..other.width {
                if !other.data[y * other.width + x] {
                    continue;
                }
                let tx = x0 + x as i64;
                let ty = y0 + y as i64;
                if tx >= 0 && ty >= 0 {
                    self.set(tx as usize, ty as usize, true);
                }
            }
        }
    }

    /// Whether `other` placed at (x0, y0) touches any foreground here.
    pub fn intersects_at(&self, other: &Mask, x0: i64, y0: i64) -> bool {
        (0..other.height).any(|y| {
            (0..other.width).any(|x| {
                other.data[y * other.width + x] && self.get_signed(x0 + x as i64, y0 + y as i64)
            })
        })
    }

    /// Foreground pixels as `(x, y)` pairs in row-major order.
    pub fn foreground(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(move |(i, _)| (i % self.width, i / self.width))
    }

    /// Pixels set here but not in `other` (same dimensions).
    pub fn difference(&self, other: &Mask) -> Mask {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        Mask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| a && !b)
                .collect(),
        }
    }

    /// Render as a 0/1 real-valued canvas.
    pub fn to_canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect(),
        }
    }
}

/// A grayscale real-valued image.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Flat array of intensities (row-major order).
    pub data: Vec<f32>,
}

impl Canvas {
    /// Create a canvas filled with zeros.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Returns 0.0 if out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x < self.width && y < self.height {
            self.data[y * self.width + x]
        } else {
            0.0
        }
    }

    /// Whether every pixel is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    /// Multiply every pixel selected by `mask` by `factor`.
    pub fn scale_where(&mut self, mask: &Mask, factor: f32) {
        for (value, &selected) in self.data.iter_mut().zip(&mask.data) {
            if selected {
                *value *= factor;
            }
        }
    }

    /// Overwrite every pixel selected by `mask` with `value`.
    pub fn fill_where(&mut self, mask: &Mask, value: f32) {
        for (pixel, &selected) in self.data.iter_mut().zip(&mask.data) {
            if selected {
                *pixel = value;
            }
        }
    }

    /// Convert to an 8-bit grayscale image, clamping to [0.0, 1.0].
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.get(x as usize, y as usize).clamp(0.0, 1.0);
            Luma([(v * 255.0).round() as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mask_is_blank() {
        let mask = Mask::new(4, 3);
        assert_eq!(mask.data.len(), 12);
        assert!(mask.is_blank());
        assert_eq!(mask.bounding_box(), None);
    }

    #[test]
    fn test_set_get_out_of_bounds() {
        let mut mask = Mask::new(4, 4);
        mask.set(1, 2, true);
        mask.set(10, 10, true);
        assert!(mask.get(1, 2));
        assert!(!mask.get(10, 10));
        assert!(!mask.get_signed(-1, 0));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn test_bounding_box_and_crop() {
        let mut mask = Mask::new(6, 6);
        mask.set(1, 2, true);
        mask.set(3, 4, true);
        let rect = mask.bounding_box().unwrap();
        assert_eq!(rect, Rect { x0: 1, y0: 2, x1: 4, y1: 5 });

        let cropped = mask.crop(rect);
        assert_eq!((cropped.width, cropped.height), (3, 3));
        assert!(cropped.get(0, 0));
        assert!(cropped.get(2, 2));
        assert_eq!(cropped.count(), 2);
    }

    #[test]
    fn test_or_at_clips() {
        let mut stamp = Mask::new(2, 2);
        stamp.data.fill(true);
        let mut mask = Mask::new(3, 3);
        mask.or_at(&stamp, -1, 2);
        assert_eq!(mask.count(), 1);
        assert!(mask.get(0, 2));
    }

    #[test]
    fn test_intersects_at() {
        let mut mask = Mask::new(5, 5);
        mask.set(2, 2, true);
        let mut stamp = Mask::new(2, 2);
        stamp.data.fill(true);
        assert!(mask.intersects_at(&stamp, 1, 1));
        assert!(!mask.intersects_at(&stamp, 3, 3));
    }

    #[test]
    fn test_difference() {
        let mut a = Mask::new(2, 1);
        a.data.fill(true);
        let mut b = Mask::new(2, 1);
        b.set(0, 0, true);
        let d = a.difference(&b);
        assert!(!d.get(0, 0));
        assert!(d.get(1, 0));
    }

    #[test]
    fn test_canvas_scale_and_fill() {
        let mut canvas = Canvas::new(2, 1);
        canvas.data = vec![0.4, 0.4];
        let mut mask = Mask::new(2, 1);
        mask.set(1, 0, true);
        canvas.scale_where(&mask, 2.0);
        assert_eq!(canvas.data, vec![0.4, 0.8]);
        canvas.fill_where(&mask, 1.0);
        assert_eq!(canvas.data, vec![0.4, 1.0]);
    }

    #[test]
    fn test_to_gray_image_clamps() {
        let mut canvas = Canvas::new(3, 1);
        canvas.data = vec![-0.5, 0.5, 2.0];
        let img = canvas.to_gray_image();
        assert_eq!(img.get_pixel(0, 0)[0], 0);
        assert_eq!(img.get_pixel(1, 0)[0], 128);
        assert_eq!(img.get_pixel(2, 0)[0], 255);
    }
}
