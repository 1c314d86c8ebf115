use crate::feed::FeedSnapshot;
use crate::taxonomy::TaxonomyConfig;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::{error, warn};

pub async fn load_feeds(path: &Path) -> FeedSnapshot {
    load_json(path, "feed snapshot").await
}

pub async fn load_taxonomy(path: &Path) -> TaxonomyConfig {
    load_json(path, "taxonomy").await
}

async fn load_json<T: DeserializeOwned + Default>(path: &Path, what: &str) -> T {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to parse {what} file {}: {err}", path.display());
                T::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!("{what} file {} not found, starting empty", path.display());
            T::default()
        }
        Err(err) => {
            error!("failed to read {what} file {}: {err}", path.display());
            T::default()
        }
    }
}
