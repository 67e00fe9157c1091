//! Key/value document store.
//!
//! Documents are JSON blobs under string keys. A single `set` replaces the
//! whole document, so each document write is atomic; nothing spans keys.
//! Index documents shared by every request (`users_list`, `feed`) go through
//! [`KvStore::update`], which serializes read-modify-write on one key.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// Read-modify-write of one key. `apply` gets the current bytes and
    /// returns the replacement, or `None` to leave the key untouched. No other
    /// write to `key` may interleave. `apply` must not call back into the store.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> anyhow::Result<()>;
}

pub type UpdateFn<'a> = dyn FnMut(Option<&[u8]>) -> anyhow::Result<Option<Vec<u8>>> + 'a;

/// JSON helpers shaped like the Spin SDK's `get_json`/`set_json`.
pub trait KvStoreExt {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>>;
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()>;

    /// Atomic JSON read-modify-write. A missing document starts as
    /// `T::default()`. When `f` fails nothing is written and its error is
    /// returned as is.
    fn update_json<T, R, E>(&self, key: &str, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        T: DeserializeOwned + Serialize + Default,
        E: From<anyhow::Error>;
}

impl<S: KvStore + ?Sized> KvStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get(key)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .with_context(|| format!("corrupt document at {}", key)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, &bytes)
    }

    fn update_json<T, R, E>(&self, key: &str, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        T: DeserializeOwned + Serialize + Default,
        E: From<anyhow::Error>,
    {
        let mut f = Some(f);
        let mut outcome: Option<Result<R, E>> = None;

        self.update(key, &mut |current: Option<&[u8]>| {
            let mut doc: T = match current {
                Some(bytes) => serde_json::from_slice(bytes)
                    .with_context(|| format!("corrupt document at {}", key))?,
                None => T::default(),
            };
            let f = f.take().ok_or_else(|| anyhow!("update of {} applied twice", key))?;
            match f(&mut doc) {
                Ok(value) => {
                    outcome = Some(Ok(value));
                    Ok(Some(serde_json::to_vec(&doc)?))
                }
                Err(err) => {
                    outcome = Some(Err(err));
                    Ok(None)
                }
            }
        })?;

        outcome.unwrap_or_else(|| Err(anyhow!("update of {} was never applied", key).into()))
    }
}

/// In-process store used by the native server and tests.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let docs = self.docs.read().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(docs.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        docs.remove(key);
        Ok(())
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> anyhow::Result<()> {
        let mut docs = self.docs.write().map_err(|_| anyhow!("memory store lock poisoned"))?;
        let next = apply(docs.get(key).map(Vec::as_slice))?;
        if let Some(next) = next {
            docs.insert(key.to_string(), next);
        }
        Ok(())
    }
}

/// Spin key-value store (default label). The handle is opened per call, so
/// this only works inside a Spin component.
///
/// Spin's store has no compare-and-swap, so `update` is a plain get then set:
/// a component instance handles one request, and instances racing on the
/// same index document are last-writer-wins.
pub struct SpinStore;

impl SpinStore {
    pub fn open_default() -> Self {
        SpinStore
    }

    fn handle(&self) -> anyhow::Result<spin_sdk::key_value::Store> {
        spin_sdk::key_value::Store::open_default()
            .map_err(|e| anyhow!("failed to open key-value store: {}", e))
    }
}

impl KvStore for SpinStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.handle()?
            .get(key)
            .map_err(|e| anyhow!("kv get {} failed: {}", key, e))
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.handle()?
            .set(key, value)
            .map_err(|e| anyhow!("kv set {} failed: {}", key, e))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.handle()?
            .delete(key)
            .map_err(|e| anyhow!("kv delete {} failed: {}", key, e))
    }

    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> anyhow::Result<()> {
        let store = self.handle()?;
        let current = store
            .get(key)
            .map_err(|e| anyhow!("kv get {} failed: {}", key, e))?;
        if let Some(next) = apply(current.as_deref())? {
            store
                .set(key, &next)
                .map_err(|e| anyhow!("kv set {} failed: {}", key, e))?;
        }
        Ok(())
    }
}
