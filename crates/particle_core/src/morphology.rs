//! Binary morphology on particle masks.
//!
//! - `add_noise`: salt noise followed by small-object removal
//! - `close`: closing with a size-tiered disk, re-fusing noise into one blob
//! - `dilate`: disk dilation, for shadow halos and the collision margin
//! - `tight_crop`: minimal crop around a particle, grown from a seed pixel
//!
//! Structuring elements are discrete disks: every offset with
//! `dx² + dy² <= r²`. Radius 0 is the single center pixel.

use crate::buffer::{Mask, Rect};
use crate::rng::SynthRng;
use std::collections::VecDeque;

/// Half-width of a radius-`r` disk on each row offset `dy` in `-r..=r`.
fn disk_spans(radius: usize) -> Vec<(i64, i64)> {
    let r = radius as i64;
    (-r..=r)
        .map(|dy| {
            let half = ((r * r - dy * dy) as f64).sqrt().floor() as i64;
            (dy, half)
        })
        .collect()
}

/// Dilate with a disk of `radius`. Pixels pushed past the edge are dropped.
pub fn dilate(mask: &Mask, radius: usize) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let spans = disk_spans(radius);
    let (w, h) = (mask.width as i64, mask.height as i64);
    let mut out = Mask::new(mask.width, mask.height);
    for (x, y) in mask.foreground() {
        let (x, y) = (x as i64, y as i64);
        for &(dy, half) in &spans {
            let ty = y + dy;
            if ty < 0 || ty >= h {
                continue;
            }
            let x0 = (x - half).max(0);
            let x1 = (x + half).min(w - 1);
            let row = ty as usize * mask.width;
            out.data[row + x0 as usize..=row + x1 as usize].fill(true);
        }
    }
    out
}

/// Erode with a disk of `radius`.
///
/// Outside the buffer counts as foreground, so erosion never eats the
/// part of a particle that touches the edge.
pub fn erode(mask: &Mask, radius: usize) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let inverse = invert(mask);
    invert(&dilate(&inverse, radius))
}

fn invert(mask: &Mask) -> Mask {
    Mask {
        width: mask.width,
        height: mask.height,
        data: mask.data.iter().map(|&v| !v).collect(),
    }
}

/// Closing radius for a particle of nominal `size`: 2 above 20, 1 above 10, else 0.
pub fn closing_radius(size: f64) -> usize {
    if size > 20.0 {
        2
    } else if size > 10.0 {
        1
    } else {
        0
    }
}

/// Binary closing (dilate then erode) with a disk of `radius`.
pub fn closing(mask: &Mask, radius: usize) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    erode(&dilate(mask, radius), radius)
}

/// Closing sized by the particle's nominal size.
pub fn close(mask: &Mask, size: f64) -> Mask {
    closing(mask, closing_radius(size))
}

/// Salt noise at rate `level / 2`, then drop components under `characteristic_size²` pixels.
///
/// The removal step stops stray salt from leaving islands that later
/// overlap checks would treat as occupied territory.
pub fn add_noise(
    mask: &Mask,
    level: f64,
    characteristic_size: f64,
    rng: &mut dyn SynthRng,
) -> Mask {
    let amount = (level / 2.0).clamp(0.0, 1.0);
    let mut out = mask.clone();
    if amount > 0.0 {
        for pixel in out.data.iter_mut() {
            if rng.next_double() < amount {
                *pixel = true;
            }
        }
    }
    let min_size = (characteristic_size * characteristic_size).max(0.0) as usize;
    remove_small_objects(&out, min_size)
}

/// Remove 4-connected components with fewer than `min_size` pixels.
pub fn remove_small_objects(mask: &Mask, min_size: usize) -> Mask {
    let mut out = mask.clone();
    if min_size <= 1 {
        return out;
    }
    for component in components(mask) {
        if component.len() < min_size {
            for idx in component {
                out.data[idx] = false;
            }
        }
    }
    out
}

/// 4-connected foreground components, as lists of flat indices.
pub fn components(mask: &Mask) -> Vec<Vec<usize>> {
    let (w, h) = (mask.width, mask.height);
    let mut seen = vec![false; w * h];
    let mut found = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if !mask.data[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        queue.push_back(start);
        let mut component = Vec::new();

        while let Some(idx) = queue.pop_front() {
            component.push(idx);
            let (x, y) = (idx % w, idx / w);
            let mut visit = |n: usize| {
                if mask.data[n] && !seen[n] {
                    seen[n] = true;
                    queue.push_back(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < w {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - w);
            }
            if y + 1 < h {
                visit(idx + w);
            }
        }
        found.push(component);
    }
    found
}

/// Zero everything outside `keep`.
pub fn suppress_outside(mask: &mut Mask, keep: Rect) {
    for y in 0..mask.height {
        for x in 0..mask.width {
            if x < keep.x0 || x >= keep.x1 || y < keep.y0 || y >= keep.y1 {
                mask.data[y * mask.width + x] = false;
            }
        }
    }
}

/// Crop to the particle containing the seed pixel (x, y).
///
/// Starting at the seed, each side of the box moves outward while the next
/// row or column still holds foreground; the result has no background
/// padding on any side. Falls back to the whole-mask bounding box when the
/// seed row or column is blank. Returns `None` for a blank mask.
pub fn tight_crop(mask: &Mask, seed_x: usize, seed_y: usize) -> Option<(Mask, Rect)> {
    let rect = if seed_x < mask.width
        && seed_y < mask.height
        && mask.row_any(seed_y)
        && mask.col_any(seed_x)
    {
        let mut rect = Rect {
            x0: seed_x,
            y0: seed_y,
            x1: seed_x + 1,
            y1: seed_y + 1,
        };
        while rect.y0 > 0 && mask.row_any(rect.y0 - 1) {
            rect.y0 -= 1;
        }
        while rect.y1 < mask.height && mask.row_any(rect.y1) {
            rect.y1 += 1;
        }
        while rect.x0 > 0 && mask.col_any(rect.x0 - 1) {
            rect.x0 -= 1;
        }
        while rect.x1 < mask.width && mask.col_any(rect.x1) {
            rect.x1 += 1;
        }
        rect
    } else {
        mask.bounding_box()?
    };

    // The band may carry foreground only outside its own columns or rows.
    let band = mask.crop(rect);
    let inner = band.bounding_box()?;
    let rect = Rect {
        x0: rect.x0 + inner.x0,
        y0: rect.y0 + inner.y0,
        x1: rect.x0 + inner.x1,
        y1: rect.y0 + inner.y1,
    };
    Some((mask.crop(rect), rect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::StdRandom;

    fn square(size: usize, x0: usize, y0: usize, side: usize) -> Mask {
        let mut mask = Mask::new(size, size);
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                mask.set(x, y, true);
            }
        }
        mask
    }

    fn touches_all_edges(mask: &Mask) -> bool {
        mask.row_any(0)
            && mask.row_any(mask.height - 1)
            && mask.col_any(0)
            && mask.col_any(mask.width - 1)
    }

    #[test]
    fn test_disk_element_shapes() {
        let mut single = Mask::new(5, 5);
        single.set(2, 2, true);
        assert_eq!(dilate(&single, 0).count(), 1);
        assert_eq!(dilate(&single, 1).count(), 5);
        assert_eq!(dilate(&single, 2).count(), 13);
    }

    #[test]
    fn test_dilate_clips_at_edge() {
        let mut corner = Mask::new(4, 4);
        corner.set(0, 0, true);
        let d = dilate(&corner, 1);
        assert_eq!(d.count(), 3);
    }

    #[test]
    fn test_closing_fills_hole() {
        let mut mask = square(12, 2, 2, 7);
        mask.set(5, 5, false);
        let closed = closing(&mask, 1);
        assert!(closed.get(5, 5));
        assert_eq!(closed.count(), 49);
    }

    #[test]
    fn test_closing_keeps_edge_particle() {
        let mask = square(8, 0, 0, 4);
        assert_eq!(closing(&mask, 2), mask);
    }

    #[test]
    fn test_closing_radius_tiers() {
        assert_eq!(closing_radius(5.0), 0);
        assert_eq!(closing_radius(10.0), 0);
        assert_eq!(closing_radius(11.0), 1);
        assert_eq!(closing_radius(20.0), 1);
        assert_eq!(closing_radius(21.0), 2);
    }

    #[test]
    fn test_remove_small_objects() {
        let mut mask = square(10, 0, 0, 3);
        mask.set(8, 8, true);
        mask.set(8, 7, true);
        let cleaned = remove_small_objects(&mask, 4);
        assert_eq!(cleaned.count(), 9);
        assert!(!cleaned.get(8, 8));
    }

    #[test]
    fn test_diagonal_pixels_are_separate_components() {
        let mut mask = Mask::new(3, 3);
        mask.set(0, 0, true);
        mask.set(1, 1, true);
        assert_eq!(components(&mask).len(), 2);
    }

    #[test]
    fn test_zero_noise_is_identity() {
        let mut rng = StdRandom::from_u64_seed(4);
        let mask = square(20, 5, 5, 6);
        assert_eq!(add_noise(&mask, 0.0, 3.0, &mut rng), mask);
    }

    #[test]
    fn test_noise_never_shrinks_large_particle() {
        let mut rng = StdRandom::from_u64_seed(8);
        let mask = square(40, 10, 10, 12);
        for level in [0.1, 0.4, 0.8, 1.0] {
            let noisy = add_noise(&mask, level, 4.0, &mut rng);
            assert!(noisy.count() >= mask.count());
            for (x, y) in mask.foreground() {
                assert!(noisy.get(x, y));
            }
        }
    }

    #[test]
    fn test_noise_leaves_no_small_islands() {
        let mut rng = StdRandom::from_u64_seed(9);
        let mask = square(40, 10, 10, 12);
        let noisy = add_noise(&mask, 0.3, 3.0, &mut rng);
        for component in components(&noisy) {
            assert!(component.len() >= 9);
        }
    }

    #[test]
    fn test_tight_crop() {
        let mask = square(20, 4, 6, 5);
        let (crop, rect) = tight_crop(&mask, 6, 8).unwrap();
        assert_eq!(rect, Rect { x0: 4, y0: 6, x1: 9, y1: 11 });
        assert_eq!(crop.count(), 25);
        assert!(touches_all_edges(&crop));
    }

    #[test]
    fn test_tight_crop_seed_off_particle() {
        let mask = square(20, 4, 6, 5);
        let (crop, _) = tight_crop(&mask, 15, 15).unwrap();
        assert_eq!((crop.width, crop.height), (5, 5));
        assert!(tight_crop(&Mask::new(5, 5), 2, 2).is_none());
    }

    #[test]
    fn test_suppress_outside() {
        let mut mask = square(10, 0, 0, 10);
        suppress_outside(&mut mask, Rect { x0: 2, y0: 3, x1: 5, y1: 4 });
        assert_eq!(mask.count(), 3);
    }
}
