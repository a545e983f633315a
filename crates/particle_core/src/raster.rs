//! Rasterization of outlines into pixel sets, and rotation of pixel sets.
//!
//! A `PixelSet` is the sparse form of a particle: parallel row/column index
//! lists, free to hold negative or out-of-canvas indices until placement
//! clips them.
//!
//! Rotation goes through a dense buffer on purpose. Rotating the sparse
//! coordinates directly leaves holes at non-axis-aligned angles; rotating a
//! filled image and re-extracting its foreground keeps the fill solid.

use crate::buffer::Mask;
use crate::shape::{Outline, SizeSpec};

/// Foreground threshold applied to bilinear samples of a rotated 0/1 image.
const ROTATION_THRESHOLD: f64 = 0.5;

/// Sparse set of pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelSet {
    pub rows: Vec<i64>,
    pub cols: Vec<i64>,
}

/// Inclusive index bounds of a non-empty pixel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_row: i64,
    pub max_row: i64,
    pub min_col: i64,
    pub max_col: i64,
}

impl Bounds {
    pub fn height(&self) -> usize {
        (self.max_row - self.min_row + 1) as usize
    }

    pub fn width(&self) -> usize {
        (self.max_col - self.min_col + 1) as usize
    }
}

impl PixelSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: i64, col: i64) {
        self.rows.push(row);
        self.cols.push(col);
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let min_row = *self.rows.iter().min()?;
        let max_row = *self.rows.iter().max()?;
        let min_col = *self.cols.iter().min()?;
        let max_col = *self.cols.iter().max()?;
        Some(Bounds {
            min_row,
            max_row,
            min_col,
            max_col,
        })
    }

    /// Shift every pixel by (d_row, d_col).
    pub fn translated(&self, d_row: i64, d_col: i64) -> PixelSet {
        PixelSet {
            rows: self.rows.iter().map(|r| r + d_row).collect(),
            cols: self.cols.iter().map(|c| c + d_col).collect(),
        }
    }

    /// Drop pixels outside `[0, height) × [0, width)`.
    ///
    /// Out-of-range pixels are a clipping policy, not an error.
    pub fn clipped(&self, height: usize, width: usize) -> PixelSet {
        let mut out = PixelSet::default();
        for (r, c) in self.iter() {
            if r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width {
                out.push(r, c);
            }
        }
        out
    }

    /// Foreground pixels of `mask`, offset by (row0, col0).
    pub fn from_mask(mask: &Mask, row0: i64, col0: i64) -> PixelSet {
        let mut out = PixelSet::default();
        for (x, y) in mask.foreground() {
            out.push(row0 + y as i64, col0 + x as i64);
        }
        out
    }

    /// Draw onto the smallest mask holding every pixel.
    ///
    /// Returns the mask with the (row, col) of its top-left corner.
    pub fn to_local_mask(&self) -> Option<(Mask, i64, i64)> {
        let b = self.bounds()?;
        let mut mask = Mask::new(b.width(), b.height());
        for (r, c) in self.iter() {
            mask.set((c - b.min_col) as usize, (r - b.min_row) as usize, true);
        }
        Some((mask, b.min_row, b.min_col))
    }
}

/// Fill the interior of a shape at the given size, before rotation.
pub fn rasterize(outline: &Outline, size: SizeSpec) -> PixelSet {
    match (outline, size) {
        (Outline::Disk, size) => disk(size.nominal().round().max(1.0) as i64),
        (Outline::Ellipse, SizeSpec::Axes { major, minor }) => ellipse(major as i64, minor as i64),
        (Outline::Ellipse, SizeSpec::Scalar(s)) => ellipse(s as i64, s as i64),
        (Outline::Polygon { x, y }, size) => {
            let scale = size.nominal();
            let xs: Vec<f64> = spread_from_mid(x.iter().map(|v| v * scale).collect())
                .into_iter()
                .map(|v| v / 4.0)
                .collect();
            let ys: Vec<f64> = spread_from_mid(y.iter().map(|v| v * scale).collect())
                .into_iter()
                .map(|v| v / 4.0)
                .collect();
            polygon(&ys, &xs)
        }
    }
}

/// Disk of `radius` centered at (radius, radius).
pub fn disk(radius: i64) -> PixelSet {
    ellipse_at(radius, radius, radius, radius)
}

/// Ellipse with row semi-axis `minor` and column semi-axis `major`, 0°.
pub fn ellipse(major: i64, minor: i64) -> PixelSet {
    ellipse_at(minor, major, minor, major)
}

fn ellipse_at(center_row: i64, center_col: i64, row_radius: i64, col_radius: i64) -> PixelSet {
    let mut out = PixelSet::default();
    let rr = row_radius.max(1) as f64;
    let cr = col_radius.max(1) as f64;
    for r in (center_row - row_radius)..=(center_row + row_radius) {
        for c in (center_col - col_radius)..=(center_col + col_radius) {
            let dr = (r - center_row) as f64 / rr;
            let dc = (c - center_col) as f64 / cr;
            if dr * dr + dc * dc < 1.0 {
                out.push(r, c);
            }
        }
    }
    out
}

/// Push vertices away from the midpoint by one unit, then shift to be non-negative.
///
/// Keeps opposite vertices from collapsing onto adjacent pixels at small sizes.
fn spread_from_mid(mut values: Vec<f64>) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mid = max / 2.0;
    for v in values.iter_mut() {
        if *v > mid {
            *v += 1.0;
        } else if *v < mid {
            *v -= 1.0;
        }
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if min < 0.0 {
        for v in values.iter_mut() {
            *v += min.abs();
        }
    }
    values
}

/// Pixels whose centers lie inside or on the polygon.
pub fn polygon(rows: &[f64], cols: &[f64]) -> PixelSet {
    let mut out = PixelSet::default();
    if rows.len() < 3 || rows.len() != cols.len() {
        return out;
    }
    let r0 = rows.iter().copied().fold(f64::INFINITY, f64::min).floor() as i64;
    let r1 = rows.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
    let c0 = cols.iter().copied().fold(f64::INFINITY, f64::min).floor() as i64;
    let c1 = cols.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil() as i64;

    for r in r0..=r1 {
        for c in c0..=c1 {
            if point_in_polygon(r as f64, c as f64, rows, cols) {
                out.push(r, c);
            }
        }
    }
    out
}

fn point_in_polygon(pr: f64, pc: f64, rows: &[f64], cols: &[f64]) -> bool {
    const EPS: f64 = 1e-9;
    let n = rows.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (ri, ci, rj, cj) = (rows[i], cols[i], rows[j], cols[j]);

        // Boundary counts as inside.
        let cross = (rj - ri) * (pc - ci) - (cj - ci) * (pr - ri);
        if cross.abs() < EPS
            && pr >= ri.min(rj) - EPS
            && pr <= ri.max(rj) + EPS
            && pc >= ci.min(cj) - EPS
            && pc <= ci.max(cj) + EPS
        {
            return true;
        }

        if (ri > pr) != (rj > pr) {
            let at = ci + (pr - ri) / (rj - ri) * (cj - ci);
            if pc < at {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Size of the buffer that holds a `width × height` image rotated by
/// `angle_deg` without clipping.
///
/// Returns `None` if the result does not fit in memory-addressable sizes.
pub fn rotated_extent(width: usize, height: usize, angle_deg: f64) -> Option<(usize, usize)> {
    if width == 0 || height == 0 {
        return Some((width, height));
    }
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let w = (width - 1) as f64;
    let h = (height - 1) as f64;
    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    let (mut min_x, mut max_x, mut min_y, mut max_y) =
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let rx = x * cos + y * sin;
        let ry = -x * sin + y * cos;
        min_x = min_x.min(rx);
        max_x = max_x.max(rx);
        min_y = min_y.min(ry);
        max_y = max_y.max(ry);
    }

    let out_w = (max_x - min_x + 1.0).round();
    let out_h = (max_y - min_y + 1.0).round();
    if !out_w.is_finite() || !out_h.is_finite() || out_w > u32::MAX as f64 || out_h > u32::MAX as f64 {
        return None;
    }
    let (out_w, out_h) = (out_w.max(1.0) as usize, out_h.max(1.0) as usize);
    out_w.checked_mul(out_h)?;
    Some((out_w, out_h))
}

/// Rotate a mask counter-clockwise by `angle_deg`, growing the buffer to fit.
///
/// Bilinear sampling, thresholded back to binary.
pub fn rotate_mask(mask: &Mask, angle_deg: f64) -> Option<Mask> {
    let (out_w, out_h) = rotated_extent(mask.width, mask.height, angle_deg)?;
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let cx_in = (mask.width as f64 - 1.0) / 2.0;
    let cy_in = (mask.height as f64 - 1.0) / 2.0;
    let cx_out = (out_w as f64 - 1.0) / 2.0;
    let cy_out = (out_h as f64 - 1.0) / 2.0;

    let mut out = Mask::new(out_w, out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let dx = ox as f64 - cx_out;
            let dy = oy as f64 - cy_out;
            let sx = cx_in + dx * cos - dy * sin;
            let sy = cy_in + dx * sin + dy * cos;
            if sample_bilinear(mask, sx, sy) >= ROTATION_THRESHOLD {
                out.set(ox, oy, true);
            }
        }
    }
    Some(out)
}

fn sample_bilinear(mask: &Mask, fx: f64, fy: f64) -> f64 {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let v = |x: i64, y: i64| if mask.get_signed(x, y) { 1.0 } else { 0.0 };

    let top = v(x0, y0) * (1.0 - tx) + v(x0 + 1, y0) * tx;
    let bottom = v(x0, y0 + 1) * (1.0 - tx) + v(x0 + 1, y0 + 1) * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Rotate a pixel set by `angle_deg` degrees.
///
/// Identity for 0°. Otherwise the set is drawn onto its minimal local
/// buffer, rotated with resize, and re-extracted, offset back by the
/// original minimum row/column.
pub fn rotate(pixels: &PixelSet, angle_deg: f64) -> PixelSet {
    if angle_deg == 0.0 {
        return pixels.clone();
    }
    let Some((local, row0, col0)) = pixels.to_local_mask() else {
        return PixelSet::default();
    };
    match rotate_mask(&local, angle_deg) {
        Some(rotated) => PixelSet::from_mask(&rotated, row0, col0),
        None => pixels.clone(),
    }
}
