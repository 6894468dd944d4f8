use newsai_core::{Error, Result, Storage};
use std::str::FromStr;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

/// Backends selectable through `STORAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!(
                "Unsupported storage backend {:?}; available: {}",
                other,
                available_backends().join(", ")
            ))),
        }
    }
}

pub fn available_backends() -> Vec<&'static str> {
    let mut backends = vec!["memory"];
    if cfg!(feature = "sqlite") {
        backends.push("sqlite");
    }
    backends
}

/// Open the configured backend. `database_url` is ignored by the memory backend.
#[cfg_attr(not(feature = "sqlite"), allow(unused_variables))]
pub async fn create_storage(kind: &str, database_url: &str) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match kind.parse::<StorageKind>()? {
        StorageKind::Memory => Arc::new(InMemoryStorage::new()),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Arc::new(SQLiteStorage::connect(database_url).await?),
    };
    tracing::info!(backend = storage.backend_name(), "Storage ready");
    Ok(storage)
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageKind};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_storage() {
        let storage = create_storage("Memory", "").await.unwrap();
        assert_eq!(storage.backend_name(), "memory");
        storage.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_backend_is_config_error() {
        let err = create_storage("qdrant", "").await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_create_sqlite_storage_in_memory() {
        let storage = create_storage("sqlite", "sqlite::memory:").await.unwrap();
        assert_eq!(storage.backend_name(), "sqlite");
        storage.ping().await.unwrap();
    }
}
