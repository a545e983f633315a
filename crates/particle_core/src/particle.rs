//! Particle records and the ordered store that owns them.
//!
//! A `Particle` keeps the outline sampled when it was created, its raw
//! (pre-rotation) rasterization, and, once drawn, a tight mask plus the
//! center it was last placed at. The store preserves insertion order,
//! which is also placement order.

use crate::buffer::Mask;
use crate::morphology::{add_noise, closing, closing_radius, tight_crop};
use crate::raster::{rasterize, rotate, PixelSet};
use crate::rng::SynthRng;
use crate::shape::{ShapeKind, ShapeSpec, SizeSpec, SizeSpecError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// User-entered particle settings, before an outline is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleDraft {
    pub shape: ShapeKind,
    pub size: SizeSpec,
    /// Noise level in [0, 1].
    #[serde(default)]
    pub noise: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
}

impl ParticleDraft {
    pub fn new(shape: ShapeKind, size: SizeSpec) -> Self {
        Self {
            shape,
            size,
            noise: 0.0,
            rotation: 0.0,
        }
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }
}

/// Errors from store edits.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Selected index past the end of the store.
    IndexOutOfRange { index: usize, len: usize },
    /// Size does not fit the shape.
    Size(SizeSpecError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IndexOutOfRange { index, len } => {
                write!(f, "particle {} does not exist (store holds {})", index, len)
            }
            StoreError::Size(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<SizeSpecError> for StoreError {
    fn from(e: SizeSpecError) -> Self {
        StoreError::Size(e)
    }
}

/// One particle.
#[derive(Debug, Clone)]
pub struct Particle {
    pub shape: ShapeSpec,
    pub size: SizeSpec,
    /// Noise level in [0, 1].
    pub noise: f64,
    /// Rotation in degrees, in [0, 360).
    pub rotation: f64,
    /// Rasterized outline before rotation.
    pub raw: PixelSet,
    /// Tight mask from the last placement or preview.
    pub mask: Option<Mask>,
    /// Center from the last placement, as (x, y).
    pub center: Option<(i64, i64)>,
}

impl Particle {
    /// Sample an outline for `draft` and rasterize it.
    pub fn new(draft: &ParticleDraft, rng: &mut dyn SynthRng) -> Result<Self, SizeSpecError> {
        draft.size.check_shape(draft.shape)?;
        let shape = ShapeSpec::sample(draft.shape, rng);
        let rotation = if draft.shape.is_rotation_invariant() {
            0.0
        } else {
            draft.rotation.rem_euclid(360.0)
        };
        let raw = rasterize(&shape.outline, draft.size);
        Ok(Self {
            shape,
            size: draft.size,
            noise: draft.noise.clamp(0.0, 1.0),
            rotation,
            raw,
            mask: None,
            center: None,
        })
    }

    /// Settings this particle was built from.
    pub fn draft(&self) -> ParticleDraft {
        ParticleDraft {
            shape: self.shape.kind,
            size: self.size,
            noise: self.noise,
            rotation: self.rotation,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind
    }

    /// Nominal size, used to pick the closing radius.
    pub fn nominal_size(&self) -> f64 {
        self.size.nominal()
    }

    /// Raw outline rotated by the particle's rotation, shifted so the
    /// smallest row and column are 0.
    pub fn rotated_pixels(&self) -> PixelSet {
        let rotated = rotate(&self.raw, self.rotation);
        match rotated.bounds() {
            Some(b) => rotated.translated(-b.min_row, -b.min_col),
            None => rotated,
        }
    }

    /// Render the particle on its own and store the tight result as its mask.
    ///
    /// The particle is drawn centered on a scratch buffer six half-extents
    /// wide, noised, closed by its mean half-extent and tight-cropped.
    pub fn preview(&mut self, rng: &mut dyn SynthRng) -> Option<&Mask> {
        let pixels = self.rotated_pixels();
        let b = pixels.bounds()?;
        let half_x = ((b.max_col - b.min_col) as f64 / 2.0).ceil().max(1.0) as i64;
        let half_y = ((b.max_row - b.min_row) as f64 / 2.0).ceil().max(1.0) as i64;
        let (w, h) = ((half_x * 6) as usize, (half_y * 6) as usize);
        let (cx, cy) = ((w as i64 + 1) / 2, (h as i64 + 1) / 2);

        let mut scratch = Mask::new(w, h);
        for (r, c) in pixels.translated(cy - half_y, cx - half_x).clipped(h, w).iter() {
            scratch.set(c as usize, r as usize, true);
        }

        let characteristic = (half_x + half_y) as f64 / 2.0;
        let noisy = add_noise(&scratch, self.noise, characteristic, rng);
        let closed = closing(&noisy, closing_radius(characteristic));
        let (mask, _) = tight_crop(&closed, cx as usize, cy as usize)?;
        self.mask = Some(mask);
        self.mask.as_ref()
    }

    /// Record a committed placement.
    pub(crate) fn commit(&mut self, mask: Mask, center: (i64, i64)) {
        self.mask = Some(mask);
        self.center = Some(center);
    }
}

/// Ordered collection of particles.
#[derive(Debug, Clone, Default)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Particle> {
        self.particles.iter_mut()
    }

    /// Append `amount` particles built from `draft`.
    ///
    /// Each particle samples its own outline, so randomized shapes differ.
    /// Returns the index range of the new particles.
    pub fn add(
        &mut self,
        draft: &ParticleDraft,
        amount: usize,
        rng: &mut dyn SynthRng,
    ) -> Result<Range<usize>, StoreError> {
        draft.size.check_shape(draft.shape)?;
        let start = self.particles.len();
        for _ in 0..amount {
            self.particles.push(Particle::new(draft, rng)?);
        }
        Ok(start..self.particles.len())
    }

    /// Push an already built particle.
    pub fn push(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Replace the selected particles with fresh ones built from `draft`.
    ///
    /// Nothing changes unless every index is valid.
    pub fn replace(
        &mut self,
        indices: &[usize],
        draft: &ParticleDraft,
        rng: &mut dyn SynthRng,
    ) -> Result<(), StoreError> {
        self.check_indices(indices)?;
        draft.size.check_shape(draft.shape)?;
        for &index in indices {
            self.particles[index] = Particle::new(draft, rng)?;
        }
        Ok(())
    }

    /// Remove the selected particles; the rest keep their relative order.
    pub fn remove(&mut self, indices: &[usize]) -> Result<usize, StoreError> {
        self.check_indices(indices)?;
        let before = self.particles.len();
        let mut index = 0;
        self.particles.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        Ok(before - self.particles.len())
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    fn check_indices(&self, indices: &[usize]) -> Result<(), StoreError> {
        let len = self.particles.len();
        match indices.iter().find(|&&i| i >= len) {
            Some(&index) => Err(StoreError::IndexOutOfRange { index, len }),
            None => Ok(()),
        }
    }
}
