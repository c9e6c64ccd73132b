pub mod postgres;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use thiserror::Error;

pub use postgres::PgIdentityResolver;

/// Outcome of a single lookup. Created per call and never cached across files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub display_name: Option<String>,
}

impl ResolvedIdentity {
    pub fn found(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
        }
    }

    pub fn not_found() -> Self {
        Self { display_name: None }
    }

    pub fn is_found(&self) -> bool {
        self.display_name.is_some()
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("identity store unreachable: {0}")]
    Unreachable(String),

    #[error("identity lookup exceeded {0:?}")]
    Timeout(Duration),

    #[error("identity connection pool exhausted ({max_size} connections in use)")]
    PoolExhausted { max_size: u32 },

    #[error("identity query failed: {0}")]
    Query(String),

    #[error("invalid identity query configuration: {0}")]
    InvalidQuery(String),
}

/// Identifier → display name lookup against an external store.
///
/// Identifiers are upper-cased before the lookup. A syntactically valid but
/// unknown identifier is `Ok(not_found)`, never an error.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, identifier: &str) -> Result<ResolvedIdentity, ResolveError>;

    /// Verifies the store is reachable. Called once before a batch touches any file.
    fn health_check(&self) -> Result<(), ResolveError> {
        Ok(())
    }

    /// Releases idle held resources. Called periodically during large batches.
    fn reclaim(&self) {}
}

pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_uppercase()
}

/// In-memory resolver keyed by normalized identifier.
///
/// Entries may be replaced mid-batch; lookups always see the latest value.
#[derive(Debug, Default)]
pub struct StaticResolver {
    names: RwLock<HashMap<String, String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, identifier: &str, display_name: &str) -> Self {
        self.insert(identifier, display_name);
        self
    }

    pub fn insert(&self, identifier: &str, display_name: &str) {
        if let Ok(mut names) = self.names.write() {
            names.insert(normalize_identifier(identifier), display_name.to_string());
        }
    }

    pub fn remove(&self, identifier: &str) {
        if let Ok(mut names) = self.names.write() {
            names.remove(&normalize_identifier(identifier));
        }
    }
}

impl FromIterator<(String, String)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|(id, name)| (normalize_identifier(&id), name))
            .collect();
        Self {
            names: RwLock::new(names),
        }
    }
}

impl IdentityResolver for StaticResolver {
    fn resolve(&self, identifier: &str) -> Result<ResolvedIdentity, ResolveError> {
        let names = self
            .names
            .read()
            .map_err(|e| ResolveError::Unreachable(format!("lock poisoned: {}", e)))?;
        Ok(names
            .get(&normalize_identifier(identifier))
            .map(ResolvedIdentity::found)
            .unwrap_or_default())
    }
}
