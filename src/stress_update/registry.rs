use crate::stress_update::{ConfigurationError, StressUpdateModel};
use crate::Real;
use rustc_hash::FxHashMap;

type ModelFactory<T> = Box<dyn Fn() -> Result<Box<dyn StressUpdateModel<T>>, ConfigurationError> + Send + Sync>;

/// Creates stress update models by name.
///
/// Each name is associated with a factory, so that every configuration referencing the name
/// receives its own model instance.
pub struct ModelRegistry<T: Real> {
    factories: FxHashMap<String, ModelFactory<T>>,
}

impl<T: Real> Default for ModelRegistry<T> {
    fn default() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }
}

impl<T: Real> ModelRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under the given name, replacing any previous factory with that name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn StressUpdateModel<T>>, ConfigurationError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn StressUpdateModel<T>>, ConfigurationError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownModel {
                name: name.to_string(),
                available: self.names(),
            })?;
        factory()
    }

    /// Creates the models with the given names, in order.
    pub fn create_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Box<dyn StressUpdateModel<T>>>, ConfigurationError> {
        names.iter().map(|name| self.create(name.as_ref())).collect()
    }
}
