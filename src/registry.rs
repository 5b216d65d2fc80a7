//! Context registry: request identity to store.
//!
//! The identity is the community string for v1/v2c and the context name for
//! v3. Keys come from the data directory layout, so `public.snmprec` serves
//! community `public` and `lab/router1.snmprec` serves `lab/router1`.
//!
//! ```
//! use std::sync::Arc;
//! use snmp_responder::{ContextRegistry, LoadMode, Store};
//!
//! let store = Store::load("public", "1.3.6.1.2.1.1.5.0|4|zeus", LoadMode::Strict).unwrap();
//! let registry = ContextRegistry::builder()
//!     .store("public", Arc::new(store))
//!     .build();
//!
//! assert!(registry.resolve(b"public").is_ok());
//! assert!(registry.resolve(b"private").is_err());
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::store::{LoadMode, Store};

/// File extension of recorded snapshots.
pub const RECORD_EXTENSION: &str = "snmprec";

/// Immutable map of identity keys to stores.
#[derive(Debug, Clone, Default)]
pub struct ContextRegistry {
    contexts: Vec<(Bytes, Arc<Store>)>,
    default_context: Bytes,
}

impl ContextRegistry {
    pub fn builder() -> ContextRegistryBuilder {
        ContextRegistryBuilder::default()
    }

    /// Load every `*.snmprec` file under `dir`.
    pub fn load(dir: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let dir = dir.as_ref();
        let mut files = Vec::new();
        collect_records(dir, &mut files)?;
        files.sort();

        let mut builder = Self::builder();
        for path in files {
            let key = context_key(dir, &path);
            let store = Store::load_file(&path, mode)?;
            tracing::info!(target: "snmp_responder::registry", { snmp.context = %key, entries = store.len(), skipped = store.skipped() }, "context loaded");
            builder = builder.store(key, Arc::new(store));
        }

        let registry = builder.build();
        if registry.is_empty() {
            tracing::warn!(target: "snmp_responder::registry", { dir = %dir.display() }, "no record files found");
        }
        Ok(registry)
    }

    /// Find the store for `identity`.
    ///
    /// Every registered key is compared in constant time, so response
    /// timing does not reveal how much of a guess matched.
    pub fn resolve(&self, identity: &[u8]) -> Result<&Arc<Store>> {
        let mut found = None;
        for (key, store) in &self.contexts {
            if key.len() == identity.len() && bool::from(key.as_ref().ct_eq(identity)) {
                found = Some(store);
            }
        }
        found.ok_or_else(|| {
            Error::Unauthorized {
                identity: String::from_utf8_lossy(identity).into(),
            }
            .boxed()
        })
    }

    /// Resolve a v3 context name. The empty name means the default context.
    pub fn resolve_v3_context(&self, context_name: &[u8]) -> Result<&Arc<Store>> {
        if context_name.is_empty() {
            self.resolve(&self.default_context)
        } else {
            self.resolve(context_name)
        }
    }

    /// Same registry with a different default v3 context.
    pub fn with_default_context(mut self, key: impl AsRef<[u8]>) -> Self {
        self.default_context = Bytes::copy_from_slice(key.as_ref());
        self
    }

    /// Key the empty v3 context name maps to.
    pub fn default_context(&self) -> &[u8] {
        &self.default_context
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.contexts.iter().map(|(key, _)| key.as_ref())
    }

    pub fn stores(&self) -> impl Iterator<Item = &Arc<Store>> {
        self.contexts.iter().map(|(_, store)| store)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Clear the overlay of every store.
    pub fn delete_overlays(&self) {
        for store in self.stores() {
            store.delete_overlay();
        }
    }
}

/// Builder for in-memory registries.
#[derive(Debug, Default)]
pub struct ContextRegistryBuilder {
    contexts: Vec<(Bytes, Arc<Store>)>,
    default_context: Option<Bytes>,
}

impl ContextRegistryBuilder {
    /// Register `store` under `key`, replacing an earlier store with the
    /// same key.
    pub fn store(mut self, key: impl AsRef<[u8]>, store: Arc<Store>) -> Self {
        let key = Bytes::copy_from_slice(key.as_ref());
        self.contexts.retain(|(k, _)| *k != key);
        self.contexts.push((key, store));
        self
    }

    /// Key served for the empty v3 context name. Defaults to `public`.
    pub fn default_context(mut self, key: impl AsRef<[u8]>) -> Self {
        self.default_context = Some(Bytes::copy_from_slice(key.as_ref()));
        self
    }

    pub fn build(self) -> ContextRegistry {
        ContextRegistry {
            contexts: self.contexts,
            default_context: self
                .default_context
                .unwrap_or_else(|| Bytes::from_static(b"public")),
        }
    }
}

fn collect_records(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let io_error = |source| {
        Error::Io {
            path: dir.display().to_string().into(),
            source,
        }
        .boxed()
    };
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_records(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
            files.push(path);
        }
    }
    Ok(())
}

/// Relative path without extension, `/`-separated.
fn context_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
