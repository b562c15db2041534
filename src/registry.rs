use crate::{
    config::LoaderConfig,
    error::LoadError,
    key::ModuleKey,
    loader::{IntoLoader, Loader, LoaderObj, Resolver, UnitReqs},
};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Maps module keys to their loaders.
///
/// Built once at startup and handed to whatever renders. Each key has exactly one
/// loader, so each unit is resolved and cached once per registry.
pub struct Registry {
    config: LoaderConfig,
    pub(crate) loaders: RwLock<HashMap<u64, Arc<dyn LoaderObj>>>,
}

impl Registry {
    pub fn create() -> Arc<Registry> {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Arc<Registry> {
        Arc::new(Self {
            config,
            loaders: Default::default(),
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Returns the loader for `key`, creating it from `resolver` if the key is new.
    ///
    /// A key keeps its first resolver; later registrations get the existing loader back.
    pub fn register<R: Resolver>(
        &self,
        key: impl Into<ModuleKey>,
        resolver: R,
    ) -> Result<Arc<Loader<R::Output>>, LoadError> {
        let key = key.into();
        self.register_at(key.identity(), key, resolver)
    }

    fn register_at<R: Resolver>(
        &self,
        identity: u64,
        key: ModuleKey,
        resolver: R,
    ) -> Result<Arc<Loader<R::Output>>, LoadError> {
        {
            let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = loaders.get(&identity) {
                return existing_loader(existing, &key);
            }
        }

        // Lock mutably instead.
        let mut loaders = self.loaders.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = loaders.get(&identity) {
            // Registered by someone else in the meantime
            return existing_loader(existing, &key);
        }

        log::debug!("Registering {}", key);

        let loader = Arc::new(Loader::with_config(key, resolver, self.config.clone()));
        loaders.insert(identity, loader.clone());

        Ok(loader)
    }

    /// Registers a resolver under the key it names for itself.
    pub fn register_module<R: IntoLoader>(
        &self,
        resolver: R,
    ) -> Result<Arc<Loader<<R as Resolver>::Output>>, LoadError> {
        let key = resolver.module_key();
        self.register(key, resolver)
    }

    pub fn get<T: UnitReqs>(&self, key: &ModuleKey) -> Result<Arc<Loader<T>>, LoadError> {
        let existing = self.get_obj(key)?;
        downcast_loader(existing)
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.get_obj(key).is_ok()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<ModuleKey> {
        let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<ModuleKey> = loaders.values().map(|l| l.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.loaders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves every listed unit concurrently and returns once all are cached.
    ///
    /// All keys are checked up front; nothing is started if one is unknown.
    pub async fn preload<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a ModuleKey>,
    ) -> Result<(), LoadError> {
        let pending = keys
            .into_iter()
            .map(|key| self.get_obj(key))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("Preloading {} module(s)", pending.len());

        let handles: Vec<_> = pending
            .into_iter()
            .map(|loader| tokio::task::spawn(loader.preload_boxed()))
            .collect();

        for handle in handles {
            handle.await?;
        }

        Ok(())
    }

    fn get_obj(&self, key: &ModuleKey) -> Result<Arc<dyn LoaderObj>, LoadError> {
        let loaders = self.loaders.read().unwrap_or_else(PoisonError::into_inner);

        loaders
            .get(&key.identity())
            .filter(|existing| existing.key() == key)
            .cloned()
            .ok_or_else(|| LoadError::UnknownModule(key.clone()))
    }
}

fn existing_loader<T: UnitReqs>(
    existing: &Arc<dyn LoaderObj>,
    key: &ModuleKey,
) -> Result<Arc<Loader<T>>, LoadError> {
    if existing.key() != key {
        return Err(LoadError::KeyCollision {
            key: key.clone(),
            registered: existing.key().clone(),
        });
    }
    downcast_loader(existing.clone())
}

fn downcast_loader<T: UnitReqs>(existing: Arc<dyn LoaderObj>) -> Result<Arc<Loader<T>>, LoadError> {
    let key = existing.key().clone();
    let registered = existing.unit_type_name();

    existing
        .into_any()
        .downcast::<Loader<T>>()
        .map_err(|_| LoadError::TypeMismatch {
            key,
            registered,
            requested: std::any::type_name::<T>(),
        })
}
