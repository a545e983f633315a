//! Particle micrograph synthesis engine.
//!
//! This crate provides:
//! - Shape outlines for the supported particle families
//! - Rasterization and dense-buffer rotation
//! - Binary morphology (noise, closing, dilation, tight crop)
//! - Collision-aware placement with bounded retry
//! - Compositing of the binary, background, shadow and blended images
//! - A particle store and a cache-aware editing session
//!
//! # Example
//!
//! ```ignore
//! use particle_core::{GenerationParameters, ParticleDraft, Session, ShapeKind, SizeSpec, StdRandom};
//!
//! let params = GenerationParameters::new(256, 256).with_no_overlap(true);
//! let mut session = Session::new(params, Box::new(StdRandom::from_u64_seed(7)));
//! session.add(&ParticleDraft::new(ShapeKind::Octagon, SizeSpec::Scalar(12)), 20)?;
//! let images = session.images()?;
//! ```

pub mod buffer;
pub mod compositor;
pub mod morphology;
pub mod params;
pub mod particle;
pub mod placement;
pub mod raster;
pub mod rng;
pub mod session;
pub mod shape;

pub use buffer::{Canvas, Mask, Rect};
pub use compositor::{generate, GeneratedImages, GenerationReport, ImageKind};
pub use params::{
    GenerationParameters, ParamsError, PlacementRules, DEFAULT_BACKGROUND_VARIANCE,
    DEFAULT_RETRY_BUDGET, DEFAULT_SAFETY_MARGIN,
};
pub use particle::{Particle, ParticleDraft, ParticleStore, StoreError};
pub use placement::{
    Placement, PlacementEngine, PlacementMode, PlacementNotice, RULES_IGNORED_MESSAGE,
};
pub use raster::{rasterize, rotate, PixelSet};
pub use rng::{StdRandom, SynthRng};
pub use session::Session;
pub use shape::{Outline, ShapeKind, ShapeSpec, SizeSpec, SizeSpecError, UnknownShape};
