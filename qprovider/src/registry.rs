//! Name-keyed registries that construct provider instances on first lookup.
//!
//! ```rust
//! use qprovider::{Providers, RegistryErrorKind};
//!
//! let providers = Providers::new();
//! let err = providers.get_llm_provider("bedrock").err().expect("nothing registered");
//! assert_eq!(err.kind, RegistryErrorKind::NotFound);
//! assert_eq!(err.to_string(), "Provider \"bedrock\" not found.");
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

use qcommon::Registry;

use crate::{EmbeddingProvider, LlmProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryErrorKind {
    NotFound,
    Construction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryError {
    pub kind: RegistryErrorKind,
    pub name: String,
    pub source: Option<ProviderError>,
}

impl RegistryError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self {
            kind: RegistryErrorKind::NotFound,
            name: name.into(),
            source: None,
        }
    }

    pub fn construction(name: impl Into<String>, source: ProviderError) -> Self {
        Self {
            kind: RegistryErrorKind::Construction,
            name: name.into(),
            source: Some(source),
        }
    }

    /// The provider failure behind a construction error.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        self.source.as_ref()
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (RegistryErrorKind::Construction, Some(source)) => {
                write!(f, "Provider \"{}\" could not be constructed: {source}", self.name)
            }
            (RegistryErrorKind::Construction, None) => {
                write!(f, "Provider \"{}\" could not be constructed.", self.name)
            }
            (RegistryErrorKind::NotFound, _) => write!(f, "Provider \"{}\" not found.", self.name),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|source| source as &(dyn Error + 'static))
    }
}

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>, ProviderError> + Send + Sync>;

struct Slot<T: ?Sized> {
    factory: Option<Factory<T>>,
    instance: Mutex<Option<Arc<T>>>,
}

/// Case-sensitive name to factory mapping with per-name instance caching.
///
/// A factory runs while its slot is locked, so concurrent lookups of the same name
/// construct at most one instance. Failed constructions are not cached.
pub struct LazyRegistry<T: ?Sized> {
    slots: Registry<String, Slot<T>>,
}

impl<T: ?Sized> Default for LazyRegistry<T> {
    fn default() -> Self {
        Self {
            slots: Registry::new(),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for LazyRegistry<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRegistry")
            .field("names", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> LazyRegistry<T>
where
    T: ?Sized + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any previous entry under `name`.
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Arc<T>, ProviderError> + Send + Sync + 'static,
    {
        self.slots.insert(
            name.into(),
            Slot {
                factory: Some(Box::new(factory)),
                instance: Mutex::new(None),
            },
        );
    }

    pub fn register_instance(&mut self, name: impl Into<String>, instance: Arc<T>) {
        self.slots.insert(
            name.into(),
            Slot {
                factory: None,
                instance: Mutex::new(Some(instance)),
            },
        );
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| RegistryError::not_found(name))?;

        let mut instance = slot.instance.lock().map_err(|_| {
            RegistryError::construction(
                name,
                ProviderError::invalid_request(name, "provider slot lock poisoned"),
            )
        })?;

        if let Some(existing) = instance.as_ref() {
            return Ok(Arc::clone(existing));
        }

        let Some(factory) = slot.factory.as_ref() else {
            return Err(RegistryError::not_found(name));
        };

        match factory() {
            Ok(created) => {
                tracing::debug!(phase = "registry", event = "constructed", provider = %name);
                *instance = Some(Arc::clone(&created));
                Ok(created)
            }
            Err(error) => {
                tracing::warn!(
                    phase = "registry",
                    event = "construction_failed",
                    provider = %name,
                    error = %error,
                );
                Err(RegistryError::construction(name, error))
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.slots.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub type ProviderRegistry = LazyRegistry<dyn LlmProvider>;
pub type EmbeddingRegistry = LazyRegistry<dyn EmbeddingProvider>;

impl LazyRegistry<dyn LlmProvider> {
    pub fn register<P, F>(&mut self, name: impl Into<String>, factory: F)
    where
        P: LlmProvider + 'static,
        F: Fn() -> Result<P, ProviderError> + Send + Sync + 'static,
    {
        self.register_factory(name, move || {
            factory().map(|provider| Arc::new(provider) as Arc<dyn LlmProvider>)
        });
    }
}

impl LazyRegistry<dyn EmbeddingProvider> {
    pub fn register<P, F>(&mut self, name: impl Into<String>, factory: F)
    where
        P: EmbeddingProvider + 'static,
        F: Fn() -> Result<P, ProviderError> + Send + Sync + 'static,
    {
        self.register_factory(name, move || {
            factory().map(|provider| Arc::new(provider) as Arc<dyn EmbeddingProvider>)
        });
    }
}

/// The chat and embedding registries handed to callers.
#[derive(Debug, Default)]
pub struct Providers {
    llm: ProviderRegistry,
    embedding: EmbeddingRegistry,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registries(llm: ProviderRegistry, embedding: EmbeddingRegistry) -> Self {
        Self { llm, embedding }
    }

    pub fn get_llm_provider(&self, name: &str) -> Result<Arc<dyn LlmProvider>, RegistryError> {
        self.llm.get(name)
    }

    pub fn get_embedding_provider(
        &self,
        name: &str,
    ) -> Result<Arc<dyn EmbeddingProvider>, RegistryError> {
        self.embedding.get(name)
    }

    pub fn llm(&self) -> &ProviderRegistry {
        &self.llm
    }

    pub fn llm_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.llm
    }

    pub fn embedding(&self) -> &EmbeddingRegistry {
        &self.embedding
    }

    pub fn embedding_mut(&mut self) -> &mut EmbeddingRegistry {
        &mut self.embedding
    }
}
