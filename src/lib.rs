//! Command-line shell around the particle synthesis engine.
//!
//! The engine in `particle_core` never touches the file system; this crate
//! loads scene documents and writes the generated images.

pub mod scene_io;

pub use scene_io::{
    build_session, duplicate_name, image_size, load_scene, save_duplicates, save_image,
    save_images, save_scene, ParticleBatch, SceneConfig, SceneIoError, SceneIoResult,
};
