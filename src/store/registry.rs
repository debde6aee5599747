use super::StoreHandle;
use std::collections::HashMap;
use tracing::info;

pub const DEFAULT_STORE_NAME: &str = "mysql";

/// Named session store backends available to the host application.
///
/// Owned by the application's composition root and passed by reference to
/// whatever needs to select a store by name.
#[derive(Default, Clone)]
pub struct StoreRegistry {
    stores: HashMap<String, StoreHandle>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `store` under `name`, returning the handle it replaced.
    pub fn register(&mut self, name: impl Into<String>, store: StoreHandle) -> Option<StoreHandle> {
        let name = name.into();
        info!(name = %name, backend = store.backend(), "session store registered");
        self.stores.insert(name, store)
    }

    pub fn get(&self, name: &str) -> Option<StoreHandle> {
        self.stores.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Register under `name`, or [`DEFAULT_STORE_NAME`] when none is given.
pub fn register(registry: &mut StoreRegistry, store: StoreHandle, name: Option<&str>) {
    registry.register(name.unwrap_or(DEFAULT_STORE_NAME), store);
}
