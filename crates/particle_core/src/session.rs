//! Editing session with a cached generation result.
//!
//! The session owns the particle store, the parameters and the last
//! generated images. Every mutation marks the cache dirty; `images`
//! regenerates only when needed.

use crate::compositor::{self, GeneratedImages, GenerationReport};
use crate::params::{GenerationParameters, ParamsError};
use crate::particle::{ParticleDraft, ParticleStore, StoreError};
use crate::placement::PlacementNotice;
use crate::rng::SynthRng;
use std::ops::Range;

pub struct Session {
    store: ParticleStore,
    params: GenerationParameters,
    rng: Box<dyn SynthRng>,
    cache: Option<GeneratedImages>,
    dirty: bool,
    notices: Vec<PlacementNotice>,
}

impl Session {
    pub fn new(params: GenerationParameters, rng: Box<dyn SynthRng>) -> Self {
        Self {
            store: ParticleStore::new(),
            params,
            rng,
            cache: None,
            dirty: true,
            notices: Vec::new(),
        }
    }

    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Notices raised by the most recent pass.
    pub fn notices(&self) -> &[PlacementNotice] {
        &self.notices
    }

    /// Replace the parameters. Rejected parameters leave the session untouched.
    pub fn set_params(&mut self, params: GenerationParameters) -> Result<(), ParamsError> {
        params.validate()?;
        if params != self.params {
            self.params = params;
            self.dirty = true;
        }
        Ok(())
    }

    /// Edit the parameters in place.
    pub fn update_params(
        &mut self,
        edit: impl FnOnce(&mut GenerationParameters),
    ) -> Result<(), ParamsError> {
        let mut params = self.params.clone();
        edit(&mut params);
        self.set_params(params)
    }

    pub fn add(&mut self, draft: &ParticleDraft, amount: usize) -> Result<Range<usize>, StoreError> {
        let range = self.store.add(draft, amount, self.rng.as_mut())?;
        self.dirty |= !range.is_empty();
        Ok(range)
    }

    pub fn replace(&mut self, indices: &[usize], draft: &ParticleDraft) -> Result<(), StoreError> {
        self.store.replace(indices, draft, self.rng.as_mut())?;
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, indices: &[usize]) -> Result<usize, StoreError> {
        let removed = self.store.remove(indices)?;
        self.dirty |= removed > 0;
        Ok(removed)
    }

    /// Drop every particle and the cached images.
    pub fn reset(&mut self) {
        self.store.clear();
        self.cache = None;
        self.notices.clear();
        self.dirty = true;
    }

    /// Current images, generating them first if the cache is stale.
    pub fn images(&mut self) -> Result<&GeneratedImages, ParamsError> {
        let images = match self.cache.take() {
            Some(images) if !self.dirty => images,
            _ => self.run()?,
        };
        Ok(self.cache.insert(images))
    }

    /// Generate a fresh pass regardless of the cache.
    pub fn regenerate(&mut self) -> Result<&GeneratedImages, ParamsError> {
        self.dirty = true;
        self.images()
    }

    fn run(&mut self) -> Result<GeneratedImages, ParamsError> {
        let GenerationReport {
            images,
            rules,
            rules_relaxed,
            notices,
            ..
        } = compositor::generate(&mut self.store, &self.params, self.rng.as_mut())?;
        if rules_relaxed {
            self.params.rules = rules;
        }
        self.notices = notices;
        self.dirty = false;
        Ok(images)
    }
}
