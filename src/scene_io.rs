//! Scene files and image output for the studio shell.
//!
//! A scene is a JSON document holding the generation parameters and the
//! particle batches to add:
//!
//! ```ignore
//! {
//!     "params": { "width": 256, "height": 256, "no_overlap": true, "contrast": 0.4 },
//!     "particles": [
//!         { "shape": "Oct-Rand", "size": 12, "noise": 0.2, "rotation": 30, "amount": 10 },
//!         { "shape": "Ellipse", "size": "9;4", "amount": 5 }
//!     ],
//!     "duplicates": 3,
//!     "output_dir": "out"
//! }
//! ```

use chrono::{DateTime, Local};
use particle_core::{
    GeneratedImages, GenerationParameters, ImageKind, ParamsError, ParticleDraft, Session,
    StoreError,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors that can occur while loading scenes or writing images.
#[derive(Debug)]
pub enum SceneIoError {
    /// File system error
    Io(std::io::Error),
    /// Malformed scene document
    Json(serde_json::Error),
    /// Image encode or decode failure
    Image(image::ImageError),
    /// Parameters out of range
    Params(ParamsError),
    /// Particle batch rejected by the store
    Store(StoreError),
}

impl std::fmt::Display for SceneIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneIoError::Io(e) => write!(f, "IO error: {}", e),
            SceneIoError::Json(e) => write!(f, "JSON error: {}", e),
            SceneIoError::Image(e) => write!(f, "Image error: {}", e),
            SceneIoError::Params(e) => write!(f, "Invalid parameters: {}", e),
            SceneIoError::Store(e) => write!(f, "Invalid particle: {}", e),
        }
    }
}

impl std::error::Error for SceneIoError {}

impl From<std::io::Error> for SceneIoError {
    fn from(e: std::io::Error) -> Self {
        SceneIoError::Io(e)
    }
}

impl From<serde_json::Error> for SceneIoError {
    fn from(e: serde_json::Error) -> Self {
        SceneIoError::Json(e)
    }
}

impl From<image::ImageError> for SceneIoError {
    fn from(e: image::ImageError) -> Self {
        SceneIoError::Image(e)
    }
}

impl From<ParamsError> for SceneIoError {
    fn from(e: ParamsError) -> Self {
        SceneIoError::Params(e)
    }
}

impl From<StoreError> for SceneIoError {
    fn from(e: StoreError) -> Self {
        SceneIoError::Store(e)
    }
}

/// Result type for scene I/O operations.
pub type SceneIoResult<T> = Result<T, SceneIoError>;

/// A group of identical particle settings added in one go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleBatch {
    #[serde(flatten)]
    pub draft: ParticleDraft,
    #[serde(default = "default_amount")]
    pub amount: usize,
}

fn default_amount() -> usize {
    1
}

/// A scene document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub params: GenerationParameters,
    pub particles: Vec<ParticleBatch>,
    /// Images written by a plain save.
    pub images: Vec<ImageKind>,
    /// Number of independently regenerated copies to write, 0 for none.
    pub duplicates: usize,
    /// Image kind written for each duplicate.
    pub duplicate_kind: ImageKind,
    pub output_dir: PathBuf,
    /// Seed for reproducible output; entropy when absent.
    pub seed: Option<u64>,
    /// Take the canvas size from this image instead of `params`.
    pub size_from: Option<PathBuf>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            params: GenerationParameters::default(),
            particles: Vec::new(),
            images: ImageKind::ALL.to_vec(),
            duplicates: 0,
            duplicate_kind: ImageKind::Blended,
            output_dir: PathBuf::from("."),
            seed: None,
            size_from: None,
        }
    }
}

/// Load a scene from a JSON file.
pub fn load_scene<P: AsRef<Path>>(path: P) -> SceneIoResult<SceneConfig> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Save a scene as pretty-printed JSON.
pub fn save_scene<P: AsRef<Path>>(scene: &SceneConfig, path: P) -> SceneIoResult<()> {
    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, scene)?;
    Ok(())
}

/// Width and height of an image file, read from its header.
pub fn image_size<P: AsRef<Path>>(path: P) -> SceneIoResult<(usize, usize)> {
    let (w, h) = image::image_dimensions(path.as_ref())?;
    Ok((w as usize, h as usize))
}

/// Resolve the canvas size and particle batches of `scene` into a session.
///
/// `base_dir` anchors a relative `size_from` path.
pub fn build_session(
    scene: &SceneConfig,
    base_dir: &Path,
    rng: Box<dyn particle_core::SynthRng>,
) -> SceneIoResult<Session> {
    let mut params = scene.params.clone();
    if let Some(source) = &scene.size_from {
        let (width, height) = image_size(base_dir.join(source))?;
        info!(width, height, source = %source.display(), "canvas size taken from image");
        params = params.with_size(width, height);
    }
    params.validate()?;

    let mut session = Session::new(params, rng);
    for batch in &scene.particles {
        session.add(&batch.draft, batch.amount)?;
    }
    Ok(session)
}

/// Write one image as an 8-bit grayscale PNG.
pub fn save_image<P: AsRef<Path>>(
    images: &GeneratedImages,
    kind: ImageKind,
    path: P,
) -> SceneIoResult<()> {
    images.gray_image(kind).save(path.as_ref())?;
    Ok(())
}

/// Write each of `kinds` to `<dir>/<stem>.png`.
pub fn save_images(
    images: &GeneratedImages,
    kinds: &[ImageKind],
    dir: &Path,
) -> SceneIoResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    kinds
        .iter()
        .map(|&kind| {
            let path = dir.join(format!("{}.png", kind.file_stem()));
            save_image(images, kind, &path)?;
            Ok(path)
        })
        .collect()
}

/// File name of the `index`-th duplicate (1-based) saved at `clock`.
pub fn duplicate_name(clock: &DateTime<Local>, index: usize) -> String {
    format!("{}_{}.png", clock.format("%y%m%d_%H%M%S"), index)
}

/// Write `count` freshly regenerated copies of one image kind.
///
/// Every copy runs its own generation pass, so each shows a new layout.
pub fn save_duplicates(
    session: &mut Session,
    kind: ImageKind,
    count: usize,
    dir: &Path,
    clock: &DateTime<Local>,
) -> SceneIoResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(count);
    for index in 1..=count {
        let path = dir.join(duplicate_name(clock, index));
        let images = session.regenerate()?;
        save_image(images, kind, &path)?;
        written.push(path);
    }
    info!(count, kind = %kind, dir = %dir.display(), "duplicates saved");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use particle_core::{ShapeKind, SizeSpec};

    #[test]
    fn test_parse_scene_document() {
        let json = r#"{
            "params": { "width": 64, "height": 48, "avoid_edges": true },
            "particles": [
                { "shape": "Oct-Rand", "size": 12, "noise": 0.2, "rotation": 30, "amount": 4 },
                { "shape": "Ellipse", "size": "9;4" }
            ],
            "duplicates": 2
        }"#;
        let scene: SceneConfig = serde_json::from_str(json).unwrap();
        assert_eq!((scene.params.width, scene.params.height), (64, 48));
        assert!(scene.params.rules.avoid_edges);
        assert_eq!(scene.particles.len(), 2);
        assert_eq!(scene.particles[0].draft.shape, ShapeKind::OctRand);
        assert_eq!(scene.particles[0].amount, 4);
        assert_eq!(
            scene.particles[1].draft.size,
            SizeSpec::Axes { major: 9, minor: 4 }
        );
        assert_eq!(scene.particles[1].amount, 1);
        assert_eq!(scene.images, ImageKind::ALL.to_vec());
        assert_eq!(scene.duplicate_kind, ImageKind::Blended);
    }

    #[test]
    fn test_malformed_size_rejected() {
        let json = r#"{ "particles": [ { "shape": "Square", "size": "3;x" } ] }"#;
        assert!(serde_json::from_str::<SceneConfig>(json).is_err());
    }

    #[test]
    fn test_duplicate_name_format() {
        let clock = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(duplicate_name(&clock, 1), "240309_140507_1.png");
        assert_eq!(duplicate_name(&clock, 12), "240309_140507_12.png");
    }
}
