//! Builds the four images of a generation pass.
//!
//! ```ignore
//! let report = compositor::generate(&mut store, &params, &mut rng)?;
//! let png = report.images.gray_image(ImageKind::Blended);
//! ```
//!
//! Particles are placed in store order on one shared binary canvas, so
//! later particles treat earlier ones as occupied. The remaining layers are
//! derived from that canvas and the parameters.

use crate::buffer::{Canvas, Mask};
use crate::morphology::dilate;
use crate::params::{GenerationParameters, ParamsError, PlacementRules};
use crate::particle::ParticleStore;
use crate::placement::{Placement, PlacementEngine, PlacementNotice};
use crate::rng::SynthRng;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Kernel half-width in standard deviations.
const BLUR_TRUNCATE: f64 = 4.0;

/// One of the four images produced per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Binary,
    Background,
    Shadow,
    Blended,
}

impl ImageKind {
    pub const ALL: [ImageKind; 4] = [
        ImageKind::Binary,
        ImageKind::Background,
        ImageKind::Shadow,
        ImageKind::Blended,
    ];

    /// File stem used when the image is saved.
    pub fn file_stem(&self) -> &'static str {
        match self {
            ImageKind::Binary => "binary_image",
            ImageKind::Background => "background_image",
            ImageKind::Shadow => "shadow_image",
            ImageKind::Blended => "particle_background_image",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageKind::Binary => "binary",
            ImageKind::Background => "background",
            ImageKind::Shadow => "shadow",
            ImageKind::Blended => "blended",
        };
        f.write_str(name)
    }
}

/// The four canvases of one pass. All share the same dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImages {
    /// Placed particles.
    pub binary: Mask,
    /// Independent background noise.
    pub background: Canvas,
    /// Dilation halo around the particles, excluding the particles.
    pub shadow: Mask,
    /// Background with particles and shadow blended in, optionally blurred.
    pub blended: Canvas,
}

impl GeneratedImages {
    pub fn width(&self) -> usize {
        self.binary.width
    }

    pub fn height(&self) -> usize {
        self.binary.height
    }

    /// Real-valued view of one image.
    pub fn canvas(&self, kind: ImageKind) -> Canvas {
        match kind {
            ImageKind::Binary => self.binary.to_canvas(),
            ImageKind::Background => self.background.clone(),
            ImageKind::Shadow => self.shadow.to_canvas(),
            ImageKind::Blended => self.blended.clone(),
        }
    }

    /// 8-bit grayscale rendering of one image.
    pub fn gray_image(&self, kind: ImageKind) -> GrayImage {
        match kind {
            ImageKind::Background => self.background.to_gray_image(),
            ImageKind::Blended => self.blended.to_gray_image(),
            _ => self.canvas(kind).to_gray_image(),
        }
    }
}

/// Output of `generate`.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub images: GeneratedImages,
    /// One entry per particle, in store order.
    pub placements: Vec<Placement>,
    /// Rules in force at the end of the pass.
    pub rules: PlacementRules,
    /// Whether the retry budget ran out and the rules were dropped.
    pub rules_relaxed: bool,
    pub notices: Vec<PlacementNotice>,
}

/// Run one generation pass.
///
/// Updates every particle's mask and center. An empty store yields an
/// all-background binary image.
pub fn generate(
    store: &mut ParticleStore,
    params: &GenerationParameters,
    rng: &mut dyn SynthRng,
) -> Result<GenerationReport, ParamsError> {
    params.validate()?;
    info!(
        particles = store.len(),
        width = params.width,
        height = params.height,
        hold = params.hold_shape,
        "generating images"
    );

    let mut binary = Mask::new(params.width, params.height);
    let mut engine = PlacementEngine::from_params(params);
    let placements: Vec<Placement> = store
        .iter_mut()
        .map(|particle| {
            if params.hold_shape {
                engine.place_held(particle, &mut binary, rng)
            } else {
                engine.place(particle, &mut binary, rng)
            }
        })
        .collect();

    let background = background_layer(
        params.width,
        params.height,
        params.background_intensity,
        params.background_variance,
        rng,
    );
    let shadow = shadow_layer(&binary, params.shadow_radius());
    let mut blended = blend(&background, &binary, &shadow, params.contrast);
    if params.blur_sigma > 0.0 {
        blended = gaussian_blur(&blended, params.blur_sigma);
    }

    info!(
        foreground = binary.count(),
        relaxed = engine.rules_relaxed(),
        "generation finished"
    );

    Ok(GenerationReport {
        images: GeneratedImages {
            binary,
            background,
            shadow,
            blended,
        },
        placements,
        rules: engine.rules(),
        rules_relaxed: engine.rules_relaxed(),
        notices: engine.notices().to_vec(),
    })
}

/// Gaussian noise around `intensity`, clipped to [0, 1].
///
/// All zero when `intensity` is 0.
pub fn background_layer(
    width: usize,
    height: usize,
    intensity: f64,
    variance: f64,
    rng: &mut dyn SynthRng,
) -> Canvas {
    let mut canvas = Canvas::new(width, height);
    if intensity <= 0.0 {
        return canvas;
    }
    let std_dev = variance.max(0.0).sqrt();
    for value in canvas.data.iter_mut() {
        *value = rng.next_gaussian(intensity, std_dev).clamp(0.0, 1.0) as f32;
    }
    canvas
}

/// Halo of width `radius` around the particles. Blank when `radius` is 0.
pub fn shadow_layer(binary: &Mask, radius: usize) -> Mask {
    if radius == 0 {
        return Mask::new(binary.width, binary.height);
    }
    dilate(binary, radius).difference(binary)
}

/// Blend particles and shadow into the background.
///
/// Particle pixels are divided by `1 - contrast`, then shadow pixels are
/// multiplied by `1 - contrast / 5`. A contrast of exactly 0 or 1 instead
/// sets particle pixels to full intensity and leaves the shadow out.
pub fn blend(background: &Canvas, binary: &Mask, shadow: &Mask, contrast: f64) -> Canvas {
    let mut out = background.clone();
    if contrast == 0.0 || contrast == 1.0 {
        out.fill_where(binary, 1.0);
    } else {
        out.scale_where(binary, (1.0 / (1.0 - contrast)) as f32);
        out.scale_where(shadow, (1.0 - contrast / 5.0) as f32);
    }
    out
}

fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let radius = (BLUR_TRUNCATE * sigma + 0.5) as i64;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / sigma).powi(2)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Separable gaussian blur, edges extended by their nearest pixel.
pub fn gaussian_blur(canvas: &Canvas, sigma: f64) -> Canvas {
    if sigma <= 0.0 || canvas.width == 0 || canvas.height == 0 {
        return canvas.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let r = (kernel.len() / 2) as i64;
    let (w, h) = (canvas.width, canvas.height);

    // Horizontal pass
    let mut h_buf = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &canvas.data[y * w..(y + 1) * w];
        for x in 0..w {
            h_buf[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sx = (x as i64 + k as i64 - r).clamp(0, w as i64 - 1) as usize;
                    row[sx] * weight
                })
                .sum();
        }
    }

    // Vertical pass
    let mut out = Canvas::new(w, h);
    for y in 0..h {
        for x in 0..w {
            out.data[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sy = (y as i64 + k as i64 - r).clamp(0, h as i64 - 1) as usize;
                    h_buf[sy * w + x] * weight
                })
                .sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::components;
    use crate::particle::ParticleDraft;
    use crate::rng::StdRandom;
    use crate::shape::{ShapeKind, SizeSpec};

    fn store_with(kind: ShapeKind, size: u32, amount: usize, rng: &mut StdRandom) -> ParticleStore {
        let mut store = ParticleStore::new();
        store
            .add(&ParticleDraft::new(kind, SizeSpec::Scalar(size)), amount, rng)
            .unwrap();
        store
    }

    #[test]
    fn test_end_to_end_single_octagon() {
        let mut rng = StdRandom::from_u64_seed(20);
        let mut store = store_with(ShapeKind::Octagon, 5, 1, &mut rng);
        let params = GenerationParameters::new(500, 500)
            .with_avoid_edges(true)
            .with_no_overlap(true);
        let report = generate(&mut store, &params, &mut rng).unwrap();

        let binary = &report.images.binary;
        assert_eq!(components(binary).len(), 1);
        assert!((25..=36).contains(&binary.count()));
        assert!(!report.rules_relaxed);
        assert_eq!(report.placements.len(), 1);
        assert!(store.get(0).unwrap().center.is_some());
    }

    #[test]
    fn test_empty_store_gives_blank_images() {
        let mut rng = StdRandom::from_u64_seed(21);
        let mut store = ParticleStore::new();
        let params = GenerationParameters::new(32, 16);
        let report = generate(&mut store, &params, &mut rng).unwrap();
        assert!(report.images.binary.is_blank());
        assert!(report.images.blended.is_zero());
        assert_eq!((report.images.width(), report.images.height()), (32, 16));
    }

    #[test]
    fn test_disabled_effects_leave_layers_blank() {
        let mut rng = StdRandom::from_u64_seed(22);
        let mut store = store_with(ShapeKind::Square, 6, 3, &mut rng);
        let params = GenerationParameters::new(64, 64);
        let report = generate(&mut store, &params, &mut rng).unwrap();
        assert!(report.images.shadow.is_blank());
        assert!(report.images.background.is_zero());
    }

    #[test]
    fn test_zero_contrast_sets_particles_to_max() {
        let mut rng = StdRandom::from_u64_seed(23);
        let mut store = store_with(ShapeKind::Circle, 4, 2, &mut rng);
        let params = GenerationParameters::new(64, 64)
            .with_background(0.4)
            .with_shadow(0.2);
        let images = generate(&mut store, &params, &mut rng).unwrap().images;

        for (i, (&b, &v)) in images.background.data.iter().zip(&images.blended.data).enumerate() {
            if images.binary.data[i] {
                assert_eq!(v, 1.0);
            } else {
                assert_eq!(v, b);
            }
        }
    }

    #[test]
    fn test_blend_scales_particle_then_shadow() {
        let mut background = Canvas::new(3, 1);
        background.data.fill(0.4);
        let mut binary = Mask::new(3, 1);
        binary.set(0, 0, true);
        binary.set(1, 0, true);
        let mut shadow = Mask::new(3, 1);
        shadow.set(1, 0, true);
        shadow.set(2, 0, true);

        let out = blend(&background, &binary, &shadow, 0.5);
        assert!((out.get(0, 0) - 0.8).abs() < 1e-6);
        assert!((out.get(1, 0) - 0.8 * 0.9).abs() < 1e-6);
        assert!((out.get(2, 0) - 0.4 * 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_shadow_is_halo_only() {
        let mut binary = Mask::new(20, 20);
        binary.set(10, 10, true);
        let shadow = shadow_layer(&binary, 2);
        assert!(!shadow.get(10, 10));
        assert_eq!(shadow.count(), 12);
        assert!(shadow_layer(&binary, 0).is_blank());
    }

    #[test]
    fn test_background_statistics() {
        let mut rng = StdRandom::from_u64_seed(24);
        let bg = background_layer(100, 100, 0.5, 0.01, &mut rng);
        let mean = bg.data.iter().sum::<f32>() / bg.data.len() as f32;
        assert!((mean - 0.5).abs() < 0.01);
        assert!(bg.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_blur_preserves_mass_and_flat_regions() {
        let mut flat = Canvas::new(10, 10);
        flat.data.fill(0.3);
        let blurred = gaussian_blur(&flat, 1.5);
        assert!(blurred.data.iter().all(|&v| (v - 0.3).abs() < 1e-5));

        let mut spot = Canvas::new(21, 21);
        spot.set(10, 10, 1.0);
        let blurred = gaussian_blur(&spot, 1.0);
        let total: f32 = blurred.data.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(blurred.get(10, 10) < 1.0 && blurred.get(11, 10) > 0.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut rng = StdRandom::from_u64_seed(25);
        let mut store = ParticleStore::new();
        let params = GenerationParameters::new(0, 10);
        assert!(generate(&mut store, &params, &mut rng).is_err());
    }

    #[test]
    fn test_relaxation_reported() {
        let mut rng = StdRandom::from_u64_seed(26);
        let mut store = store_with(ShapeKind::Square, 12, 1, &mut rng);
        let params = GenerationParameters::new(10, 10)
            .with_avoid_edges(true)
            .with_no_overlap(true);
        let report = generate(&mut store, &params, &mut rng).unwrap();
        assert!(report.rules_relaxed);
        assert_eq!(report.rules, PlacementRules::default());
        assert_eq!(report.notices.len(), 1);
    }
}
