//! Generation parameters.
//!
//! A plain value object: built once (usually deserialized from a scene
//! file or assembled with the `with_*` builders), validated, and then left
//! untouched for the length of a generation pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placement attempts before the edge and overlap rules are dropped.
pub const DEFAULT_RETRY_BUDGET: u32 = 50;

/// Dilation radius of the collision margin checked around each particle.
pub const DEFAULT_SAFETY_MARGIN: usize = 5;

/// Variance of the gaussian background noise.
pub const DEFAULT_BACKGROUND_VARIANCE: f64 = 0.01;

/// Errors from `GenerationParameters::validate`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamsError {
    /// Width or height is zero.
    EmptyCanvas { width: usize, height: usize },
    /// A field is outside its allowed range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A retry budget of zero would never attempt a placement.
    ZeroRetryBudget,
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamsError::EmptyCanvas { width, height } => {
                write!(f, "canvas must be non-empty, got {}x{}", width, height)
            }
            ParamsError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{} = {} is outside [{}, {}]", field, value, min, max),
            ParamsError::ZeroRetryBudget => write!(f, "retry budget must be at least 1"),
        }
    }
}

impl std::error::Error for ParamsError {}

/// Placement rules, relaxable as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementRules {
    /// Keep every particle fully inside the canvas.
    pub avoid_edges: bool,
    /// Keep particles apart by at least the safety margin.
    pub no_overlap: bool,
}

impl PlacementRules {
    pub fn any(&self) -> bool {
        self.avoid_edges || self.no_overlap
    }
}

/// Everything a generation pass needs besides the particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParameters {
    /// Canvas width in pixels.
    pub width: usize,
    /// Canvas height in pixels.
    pub height: usize,
    /// Re-place each particle's stored footprint instead of redrawing it.
    pub hold_shape: bool,
    #[serde(flatten)]
    pub rules: PlacementRules,
    /// Mean intensity of the background noise, 0 disables it.
    pub background_intensity: f64,
    /// Variance of the background noise.
    pub background_variance: f64,
    /// Particle/background contrast in [0, 1].
    pub contrast: f64,
    /// Shadow halo strength in [0, 1], 0 disables the shadow.
    pub shadow_strength: f64,
    /// Gaussian blur sigma for the blended image, 0 disables blurring.
    pub blur_sigma: f64,
    /// Placement attempts per particle before the rules are relaxed.
    pub retry_budget: u32,
    /// Collision margin radius in pixels.
    pub safety_margin: usize,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            hold_shape: false,
            rules: PlacementRules::default(),
            background_intensity: 0.0,
            background_variance: DEFAULT_BACKGROUND_VARIANCE,
            contrast: 0.0,
            shadow_strength: 0.0,
            blur_sigma: 0.0,
            retry_budget: DEFAULT_RETRY_BUDGET,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl GenerationParameters {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_hold_shape(mut self, hold: bool) -> Self {
        self.hold_shape = hold;
        self
    }

    pub fn with_avoid_edges(mut self, enabled: bool) -> Self {
        self.rules.avoid_edges = enabled;
        self
    }

    pub fn with_no_overlap(mut self, enabled: bool) -> Self {
        self.rules.no_overlap = enabled;
        self
    }

    pub fn with_background(mut self, intensity: f64) -> Self {
        self.background_intensity = intensity;
        self
    }

    pub fn with_contrast(mut self, contrast: f64) -> Self {
        self.contrast = contrast;
        self
    }

    pub fn with_shadow(mut self, strength: f64) -> Self {
        self.shadow_strength = strength;
        self
    }

    pub fn with_blur(mut self, sigma: f64) -> Self {
        self.blur_sigma = sigma;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Check ranges. The engine assumes validated parameters.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.width == 0 || self.height == 0 {
            return Err(ParamsError::EmptyCanvas {
                width: self.width,
                height: self.height,
            });
        }
        if self.retry_budget == 0 {
            return Err(ParamsError::ZeroRetryBudget);
        }
        check_range("background_intensity", self.background_intensity, 0.0, 1.0)?;
        check_range("background_variance", self.background_variance, 0.0, 1.0)?;
        check_range("contrast", self.contrast, 0.0, 1.0)?;
        check_range("shadow_strength", self.shadow_strength, 0.0, 1.0)?;
        check_range("blur_sigma", self.blur_sigma, 0.0, 100.0)?;
        Ok(())
    }

    /// Shadow dilation radius in pixels.
    pub fn shadow_radius(&self) -> usize {
        (self.shadow_strength * 20.0).round().max(0.0) as usize
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamsError> {
    if value.is_nan() || value < min || value > max {
        return Err(ParamsError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
