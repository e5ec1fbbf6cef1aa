use crate::store::{KeyValueStore, StoreError};

#[cfg(target_arch = "wasm32")]
mod wasm_storage {
    use super::{KeyValueStore, StoreError};

    /// Browser `localStorage`, optionally namespaced by a key prefix.
    ///
    /// The storage handle is looked up on every call rather than cached: the
    /// web-sys handle is not `Send`, and the lookup is cheap.
    #[derive(Debug, Default)]
    pub struct LocalStorageStore {
        prefix: String,
    }

    impl LocalStorageStore {
        pub fn new(prefix: impl Into<String>) -> Result<Self, StoreError> {
            // Fail early if the page has no storage (e.g. disabled cookies).
            window_local_storage()?;
            Ok(Self {
                prefix: prefix.into(),
            })
        }

        fn full_key(&self, key: &str) -> String {
            if self.prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", self.prefix, key)
            }
        }
    }

    impl KeyValueStore for LocalStorageStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            window_local_storage()?
                .get_item(&self.full_key(key))
                .map_err(|e| StoreError::Io(format!("get_item failed: {e:?}")))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            window_local_storage()?
                .set_item(&self.full_key(key), value)
                .map_err(|e| StoreError::Io(format!("set_item failed: {e:?}")))
        }

        fn remove(&self, key: &str) -> Result<bool, StoreError> {
            let storage = window_local_storage()?;
            let full = self.full_key(key);
            let existed = storage
                .get_item(&full)
                .map_err(|e| StoreError::Io(format!("get_item failed: {e:?}")))?
                .is_some();
            storage
                .remove_item(&full)
                .map_err(|e| StoreError::Io(format!("remove_item failed: {e:?}")))?;
            Ok(existed)
        }
    }

    fn window_local_storage() -> Result<web_sys::Storage, StoreError> {
        let win = web_sys::window().ok_or(StoreError::StorageUnavailable)?;
        win.local_storage()
            .map_err(|e| StoreError::Io(format!("localStorage error: {e:?}")))?
            .ok_or(StoreError::StorageUnavailable)
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_storage::LocalStorageStore;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct LocalStorageStore;

#[cfg(not(target_arch = "wasm32"))]
impl LocalStorageStore {
    pub fn new(_prefix: impl Into<String>) -> Result<Self, StoreError> {
        Err(StoreError::StorageUnavailable)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStore for LocalStorageStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::StorageUnavailable)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::StorageUnavailable)
    }

    fn remove(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::StorageUnavailable)
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::LocalStorageStore;
    use crate::store::StoreError;

    #[test]
    fn native_build_has_no_local_storage() {
        assert!(matches!(
            LocalStorageStore::new("poi"),
            Err(StoreError::StorageUnavailable)
        ));
    }
}
