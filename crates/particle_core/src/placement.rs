//! Collision-aware placement of particles on a binary canvas.
//!
//! Placement is a bounded random search. Each attempt samples a center,
//! checks the placement rules and either commits or retries. Once the
//! retry budget is spent the rules are switched off for the rest of the
//! engine's life and a warning is raised; the next attempt then always
//! succeeds, so placement terminates even on an over-constrained canvas.
//!
//! Two modes:
//! - `place`: redraw the particle from its raw outline, with fresh noise,
//!   closing and a tight re-crop of the committed mask
//! - `place_held`: stamp the particle's stored mask verbatim, falling back
//!   to `place` when the stored mask is absent or cannot fit the canvas

use crate::buffer::{Mask, Rect};
use crate::morphology::{add_noise, close, closing_radius, dilate, suppress_outside, tight_crop};
use crate::params::{GenerationParameters, PlacementRules};
use crate::particle::Particle;
use crate::raster::PixelSet;
use crate::rng::SynthRng;
use tracing::{debug, warn};

/// Message raised when the retry budget runs out.
pub const RULES_IGNORED_MESSAGE: &str =
    "The image size is too small for the particle. All rules are ignored";

/// User-facing notices raised during placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementNotice {
    /// Retry budget exhausted; edge and overlap rules were switched off.
    RulesIgnored {
        /// Ordinal of the particle (in placement order) that hit the budget.
        particle: usize,
        /// Attempts spent before relaxing.
        attempts: u32,
    },
}

/// How a particle ended up on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Redrawn from the raw outline.
    Redrawn,
    /// Stored mask stamped verbatim.
    Held,
    /// Hold requested but the stored mask was absent or invalid.
    HeldFallback,
}

/// Result of placing one particle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Committed center (x, y).
    pub center: (i64, i64),
    /// Attempts used, including the committed one.
    pub attempts: u32,
    pub mode: PlacementMode,
    /// Canvas rectangle of the committed tight mask, `None` if nothing landed.
    pub footprint: Option<Rect>,
}

/// Why a candidate was turned down.
#[derive(Debug, Clone, Copy)]
enum Rejection {
    /// No center satisfies the edge rule.
    NoRoom,
    /// Raw footprint lands on foreground.
    Overlap,
    /// Safety margin touches foreground.
    TooClose,
}

/// Places particles on one canvas, owning the (relaxable) rules.
pub struct PlacementEngine {
    rules: PlacementRules,
    retry_budget: u32,
    safety_margin: usize,
    warned: bool,
    placed: usize,
    notices: Vec<PlacementNotice>,
}

impl PlacementEngine {
    pub fn new(rules: PlacementRules, retry_budget: u32, safety_margin: usize) -> Self {
        Self {
            rules,
            retry_budget: retry_budget.max(1),
            safety_margin,
            warned: false,
            placed: 0,
            notices: Vec::new(),
        }
    }

    pub fn from_params(params: &GenerationParameters) -> Self {
        Self::new(params.rules, params.retry_budget, params.safety_margin)
    }

    /// Rules currently enforced.
    pub fn rules(&self) -> PlacementRules {
        self.rules
    }

    /// Whether the retry budget was exhausted at some point.
    pub fn rules_relaxed(&self) -> bool {
        self.warned
    }

    pub fn notices(&self) -> &[PlacementNotice] {
        &self.notices
    }

    /// Redraw `particle` onto `canvas`.
    ///
    /// Updates the particle's tight mask and center on commit.
    pub fn place(
        &mut self,
        particle: &mut Particle,
        canvas: &mut Mask,
        rng: &mut dyn SynthRng,
    ) -> Placement {
        self.place_redrawn(particle, canvas, rng, PlacementMode::Redrawn)
    }

    /// Stamp the stored mask of `particle` onto `canvas`.
    ///
    /// Falls back to a full redraw when the particle has no stored mask, the
    /// mask is blank, or it is larger than the canvas.
    pub fn place_held(
        &mut self,
        particle: &mut Particle,
        canvas: &mut Mask,
        rng: &mut dyn SynthRng,
    ) -> Placement {
        let stored = match particle.mask.as_ref() {
            Some(mask)
                if !mask.is_blank() && mask.width <= canvas.width && mask.height <= canvas.height =>
            {
                mask.clone()
            }
            _ => {
                debug!(particle = self.placed, "no usable stored mask, redrawing");
                return self.place_redrawn(particle, canvas, rng, PlacementMode::HeldFallback);
            }
        };

        let margin = self.safety_margin;
        let halo = dilate(&pad(&stored, margin), margin);
        let (mw, mh) = (stored.width as i64, stored.height as i64);
        let (w, h) = (canvas.width as i64, canvas.height as i64);

        let mut attempts = 0;
        loop {
            attempts += 1;
            // The stored mask fits the canvas, so the edge range is never empty.
            let (x, y) = if self.rules.avoid_edges {
                (
                    rng.next_int_range(mw / 2, w - mw + mw / 2 + 1),
                    rng.next_int_range(mh / 2, h - mh + mh / 2 + 1),
                )
            } else {
                (rng.next_int_range(0, w), rng.next_int_range(0, h))
            };
            let (x0, y0) = (x - mw / 2, y - mh / 2);
            let verdict = if self.rules.no_overlap
                && canvas.intersects_at(&halo, x0 - margin as i64, y0 - margin as i64)
            {
                Err(Rejection::TooClose)
            } else {
                Ok(())
            };

            match verdict {
                Ok(()) => {
                    canvas.or_at(&stored, x0, y0);
                    particle.center = Some((x, y));
                    self.placed += 1;
                    return Placement {
                        center: (x, y),
                        attempts,
                        mode: PlacementMode::Held,
                        footprint: clip_rect(x0, y0, mw, mh, w, h),
                    };
                }
                Err(reason) => self.reject(attempts, reason),
            }
        }
    }

    fn place_redrawn(
        &mut self,
        particle: &mut Particle,
        canvas: &mut Mask,
        rng: &mut dyn SynthRng,
        mode: PlacementMode,
    ) -> Placement {
        let pixels = particle.rotated_pixels();
        let Some(bounds) = pixels.bounds() else {
            self.placed += 1;
            return Placement {
                center: (0, 0),
                attempts: 0,
                mode,
                footprint: None,
            };
        };
        let half_x = bounds.max_col / 2;
        let half_y = bounds.max_row / 2;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_redraw(particle, &pixels, half_x, half_y, canvas, rng) {
                Ok(commit) => {
                    canvas.or_at(&commit.closed, commit.origin.0, commit.origin.1);
                    let footprint = match commit.tight {
                        Some((mask, rect)) => {
                            particle.commit(mask, commit.center);
                            Some(Rect {
                                x0: rect.x0 + commit.origin.0 as usize,
                                y0: rect.y0 + commit.origin.1 as usize,
                                x1: rect.x1 + commit.origin.0 as usize,
                                y1: rect.y1 + commit.origin.1 as usize,
                            })
                        }
                        None => {
                            particle.center = Some(commit.center);
                            None
                        }
                    };
                    self.placed += 1;
                    return Placement {
                        center: commit.center,
                        attempts,
                        mode,
                        footprint,
                    };
                }
                Err(reason) => self.reject(attempts, reason),
            }
        }
    }

    /// One placement attempt: sample, check, and build the committed mask.
    fn try_redraw(
        &self,
        particle: &Particle,
        pixels: &PixelSet,
        half_x: i64,
        half_y: i64,
        canvas: &Mask,
        rng: &mut dyn SynthRng,
    ) -> Result<Commit, Rejection> {
        let (w, h) = (canvas.width as i64, canvas.height as i64);
        let (x, y) = if self.rules.avoid_edges {
            if w - half_x <= half_x || h - half_y <= half_y {
                return Err(Rejection::NoRoom);
            }
            (
                rng.next_int_range(half_x, w - half_x),
                rng.next_int_range(half_y, h - half_y),
            )
        } else {
            (rng.next_int_range(0, w), rng.next_int_range(0, h))
        };

        let placed = pixels
            .translated(y - half_y, x - half_x)
            .clipped(canvas.height, canvas.width);

        // Cheap test before building the safety margin.
        if self.rules.no_overlap
            && placed
                .iter()
                .any(|(r, c)| canvas.get(c as usize, r as usize))
        {
            return Err(Rejection::Overlap);
        }

        // Noise is kept to the particle's extent padded by one half-extent
        // per side (twice the half-extent from the center).
        let extent_x = pixels.bounds().map_or(0, |b| b.max_col);
        let extent_y = pixels.bounds().map_or(0, |b| b.max_row);
        let pad_x = half_x.max(1);
        let pad_y = half_y.max(1);
        let keep = (
            x - half_x - pad_x,
            y - half_y - pad_y,
            x - half_x + extent_x + 1 + pad_x,
            y - half_y + extent_y + 1 + pad_y,
        );

        // Scratch window: the kept box plus room for closing and the margin.
        let size = particle.nominal_size();
        let reach = (closing_radius(size) + self.safety_margin) as i64;
        let wx0 = (keep.0 - reach).clamp(0, w);
        let wy0 = (keep.1 - reach).clamp(0, h);
        let wx1 = (keep.2 + reach).clamp(0, w);
        let wy1 = (keep.3 + reach).clamp(0, h);
        let mut scratch = Mask::new((wx1 - wx0) as usize, (wy1 - wy0) as usize);
        for (r, c) in placed.iter() {
            scratch.set((c - wx0) as usize, (r - wy0) as usize, true);
        }

        let characteristic = (half_x + half_y) as f64 / 2.0;
        let mut noisy = add_noise(&scratch, particle.noise, characteristic, rng);
        suppress_outside(
            &mut noisy,
            Rect {
                x0: (keep.0 - wx0).clamp(0, wx1 - wx0) as usize,
                y0: (keep.1 - wy0).clamp(0, wy1 - wy0) as usize,
                x1: (keep.2 - wx0).clamp(0, wx1 - wx0) as usize,
                y1: (keep.3 - wy0).clamp(0, wy1 - wy0) as usize,
            },
        );
        let closed = close(&noisy, size);

        if self.rules.no_overlap {
            let margin = dilate(&closed, self.safety_margin);
            if canvas.intersects_at(&margin, wx0, wy0) {
                return Err(Rejection::TooClose);
            }
        }

        let seed_x = (x - wx0).clamp(0, (wx1 - wx0 - 1).max(0)) as usize;
        let seed_y = (y - wy0).clamp(0, (wy1 - wy0 - 1).max(0)) as usize;
        let tight = tight_crop(&closed, seed_x, seed_y);
        Ok(Commit {
            center: (x, y),
            origin: (wx0, wy0),
            closed,
            tight,
        })
    }

    /// Count a failed attempt, relaxing the rules when the budget runs out.
    fn reject(&mut self, attempts: u32, reason: Rejection) {
        debug!(particle = self.placed, attempt = attempts, ?reason, "candidate rejected");
        if attempts < self.retry_budget || !self.rules.any() {
            return;
        }
        self.rules = PlacementRules::default();
        if !self.warned {
            self.warned = true;
            warn!(particle = self.placed, attempts, "{}", RULES_IGNORED_MESSAGE);
            self.notices.push(PlacementNotice::RulesIgnored {
                particle: self.placed,
                attempts,
            });
        }
    }
}

/// A candidate that passed every enforced rule.
struct Commit {
    center: (i64, i64),
    /// Canvas position of the scratch window.
    origin: (i64, i64),
    closed: Mask,
    tight: Option<(Mask, Rect)>,
}

/// Copy of `mask` with `margin` blank pixels on every side.
fn pad(mask: &Mask, margin: usize) -> Mask {
    let mut out = Mask::new(mask.width + 2 * margin, mask.height + 2 * margin);
    out.or_at(mask, margin as i64, margin as i64);
    out
}

fn clip_rect(x0: i64, y0: i64, w: i64, h: i64, canvas_w: i64, canvas_h: i64) -> Option<Rect> {
    let (cx0, cy0) = (x0.clamp(0, canvas_w), y0.clamp(0, canvas_h));
    let (cx1, cy1) = ((x0 + w).clamp(0, canvas_w), (y0 + h).clamp(0, canvas_h));
    if cx0 >= cx1 || cy0 >= cy1 {
        return None;
    }
    Some(Rect {
        x0: cx0 as usize,
        y0: cy0 as usize,
        x1: cx1 as usize,
        y1: cy1 as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::components;
    use crate::particle::ParticleDraft;
    use crate::rng::StdRandom;
    use crate::shape::{ShapeKind, SizeSpec};

    fn particle(kind: ShapeKind, size: u32, rng: &mut StdRandom) -> Particle {
        Particle::new(&ParticleDraft::new(kind, SizeSpec::Scalar(size)), rng).unwrap()
    }

    fn strict() -> PlacementRules {
        PlacementRules {
            avoid_edges: true,
            no_overlap: true,
        }
    }

    fn stamp(rect: Rect, mask: &Mask, width: usize, height: usize) -> Mask {
        let mut canvas = Mask::new(width, height);
        canvas.or_at(mask, rect.x0 as i64, rect.y0 as i64);
        canvas
    }

    #[test]
    fn test_single_octagon_lands_whole() {
        let mut rng = StdRandom::from_u64_seed(10);
        let mut p = particle(ShapeKind::Octagon, 5, &mut rng);
        let mut canvas = Mask::new(500, 500);
        let mut engine = PlacementEngine::new(strict(), 50, 5);

        let placement = engine.place(&mut p, &mut canvas, &mut rng);
        assert_eq!(placement.attempts, 1);
        assert_eq!(placement.mode, PlacementMode::Redrawn);
        assert_eq!(components(&canvas).len(), 1);
        assert_eq!(canvas.count(), 30);
        assert_eq!(p.center, Some(placement.center));
        assert_eq!(p.mask.as_ref().map(|m| m.count()), Some(30));
        assert!(!engine.rules_relaxed());
    }

    #[test]
    fn test_committed_mask_is_tight_for_every_shape() {
        let mut rng = StdRandom::from_u64_seed(11);
        for kind in ShapeKind::ALL {
            let size = if kind == ShapeKind::Ellipse {
                SizeSpec::Axes { major: 14, minor: 6 }
            } else {
                SizeSpec::Scalar(14)
            };
            let draft = ParticleDraft::new(kind, size).with_rotation(25.0);
            let mut p = Particle::new(&draft, &mut rng).unwrap();
            let mut canvas = Mask::new(200, 200);
            let mut engine = PlacementEngine::new(strict(), 50, 5);
            let placement = engine.place(&mut p, &mut canvas, &mut rng);

            let mask = p.mask.as_ref().unwrap();
            assert!(mask.row_any(0) && mask.row_any(mask.height - 1), "{}", kind);
            assert!(mask.col_any(0) && mask.col_any(mask.width - 1), "{}", kind);
            let rect = placement.footprint.unwrap();
            assert_eq!((rect.width(), rect.height()), (mask.width, mask.height));
            assert_eq!(stamp(rect, mask, 200, 200), canvas);
        }
    }

    #[test]
    fn test_edge_avoidance_bounds_center() {
        let mut rng = StdRandom::from_u64_seed(12);
        let rules = PlacementRules {
            avoid_edges: true,
            no_overlap: false,
        };
        for _ in 0..40 {
            let mut p = particle(ShapeKind::Square, 10, &mut rng);
            let b = p.rotated_pixels().bounds().unwrap();
            let (hx, hy) = (b.max_col / 2, b.max_row / 2);
            let mut canvas = Mask::new(40, 30);
            let mut engine = PlacementEngine::new(rules, 50, 5);
            let (x, y) = engine.place(&mut p, &mut canvas, &mut rng).center;
            assert!(hx <= x && x <= 40 - hx);
            assert!(hy <= y && y <= 30 - hy);
        }
    }

    #[test]
    fn test_no_overlap_keeps_safety_margin() {
        let mut rng = StdRandom::from_u64_seed(13);
        for _ in 0..10 {
            let mut canvas = Mask::new(80, 80);
            let mut engine = PlacementEngine::new(strict(), 50, 5);
            let mut a = particle(ShapeKind::Octagon, 10, &mut rng);
            let mut b = particle(ShapeKind::Octagon, 10, &mut rng);
            let pa = engine.place(&mut a, &mut canvas, &mut rng);
            let pb = engine.place(&mut b, &mut canvas, &mut rng);
            assert!(!engine.rules_relaxed());

            let first = stamp(pa.footprint.unwrap(), a.mask.as_ref().unwrap(), 80, 80);
            let second = stamp(pb.footprint.unwrap(), b.mask.as_ref().unwrap(), 80, 80);
            let halo = dilate(&second, 5);
            assert!(first.foreground().all(|(x, y)| !halo.get(x, y)));
        }
    }

    #[test]
    fn test_retry_exhaustion_relaxes_rules_once() {
        let mut rng = StdRandom::from_u64_seed(14);
        let mut canvas = Mask::new(10, 10);
        let mut engine = PlacementEngine::new(strict(), 50, 5);
        let mut big = particle(ShapeKind::Square, 12, &mut rng);
        let b = big.rotated_pixels().bounds().unwrap();
        assert!(b.max_col / 2 > 5);

        let first = engine.place(&mut big, &mut canvas, &mut rng);
        assert_eq!(first.attempts, 51);
        assert!(engine.rules_relaxed());
        assert_eq!(engine.rules(), PlacementRules::default());
        assert_eq!(
            engine.notices(),
            &[PlacementNotice::RulesIgnored {
                particle: 0,
                attempts: 50
            }]
        );
        assert!(!canvas.is_blank());

        let mut second = particle(ShapeKind::Square, 12, &mut rng);
        let again = engine.place(&mut second, &mut canvas, &mut rng);
        assert_eq!(again.attempts, 1);
        assert_eq!(engine.notices().len(), 1);
    }

    #[test]
    fn test_unconstrained_placement_clips_silently() {
        let mut rng = StdRandom::from_u64_seed(15);
        let mut engine = PlacementEngine::new(PlacementRules::default(), 50, 5);
        for _ in 0..20 {
            let mut canvas = Mask::new(12, 12);
            let mut p = particle(ShapeKind::Circle, 8, &mut rng);
            let placement = engine.place(&mut p, &mut canvas, &mut rng);
            assert_eq!(placement.attempts, 1);
            assert!(canvas.count() < p.raw.len());
        }
        assert!(engine.notices().is_empty());
    }

    #[test]
    fn test_held_mask_is_stamped_verbatim() {
        let mut rng = StdRandom::from_u64_seed(16);
        let mut p = particle(ShapeKind::Octagon, 12, &mut rng);
        let mut engine = PlacementEngine::new(strict(), 50, 5);
        let mut first_canvas = Mask::new(100, 100);
        engine.place(&mut p, &mut first_canvas, &mut rng);
        let stored = p.mask.clone().unwrap();

        let mut canvas = Mask::new(100, 100);
        let placement = engine.place_held(&mut p, &mut canvas, &mut rng);
        assert_eq!(placement.mode, PlacementMode::Held);
        assert_eq!(p.mask.as_ref(), Some(&stored));
        let rect = placement.footprint.unwrap();
        assert_eq!(canvas.crop(rect), stored);
        assert_eq!(canvas.count(), stored.count());
    }

    #[test]
    fn test_held_without_mask_falls_back() {
        let mut rng = StdRandom::from_u64_seed(17);
        let mut p = particle(ShapeKind::Square, 6, &mut rng);
        let mut canvas = Mask::new(60, 60);
        let mut engine = PlacementEngine::new(strict(), 50, 5);
        let placement = engine.place_held(&mut p, &mut canvas, &mut rng);
        assert_eq!(placement.mode, PlacementMode::HeldFallback);
        assert!(p.mask.is_some());
    }

    #[test]
    fn test_held_mask_larger_than_canvas_falls_back() {
        let mut rng = StdRandom::from_u64_seed(18);
        let mut p = particle(ShapeKind::Square, 6, &mut rng);
        let mut huge = Mask::new(80, 80);
        huge.data.fill(true);
        p.mask = Some(huge);
        let mut canvas = Mask::new(40, 40);
        let mut engine = PlacementEngine::new(PlacementRules::default(), 50, 5);
        let placement = engine.place_held(&mut p, &mut canvas, &mut rng);
        assert_eq!(placement.mode, PlacementMode::HeldFallback);
        assert!(p.mask.as_ref().unwrap().width < 40);
    }
}
