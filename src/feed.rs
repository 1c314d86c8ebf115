use crate::errors::FeedError;
use crate::models::{DateRange, RawCountRecord, parse_date_key};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The two independent upstream counters. `Analytics` is source A: its label
/// spelling wins when both report an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Analytics,
    Chatbot,
}

impl SourceId {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analytics => "analytics",
            Self::Chatbot => "chatbot",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch collaborator for one upstream source. Retries, timeouts and
/// transport live behind this trait.
#[async_trait]
pub trait CountFeed: Send + Sync {
    fn source(&self) -> SourceId;

    /// All per-day per-path rows inside `window`, fetched as one query.
    async fn fetch(&self, window: DateRange) -> Result<Vec<RawCountRecord>, FeedError>;
}

/// Serves rows from a snapshot held in memory.
#[derive(Debug, Clone)]
pub struct StoredFeed {
    source: SourceId,
    records: Arc<Vec<RawCountRecord>>,
}

impl StoredFeed {
    pub fn new(source: SourceId, records: Vec<RawCountRecord>) -> Self {
        Self {
            source,
            records: Arc::new(records),
        }
    }
}

#[async_trait]
impl CountFeed for StoredFeed {
    fn source(&self) -> SourceId {
        self.source
    }

    async fn fetch(&self, window: DateRange) -> Result<Vec<RawCountRecord>, FeedError> {
        // rows with unreadable dates are passed through so they get counted as malformed
        Ok(self
            .records
            .iter()
            .filter(|record| parse_date_key(&record.date_key).is_none_or(|date| window.contains(date)))
            .cloned()
            .collect())
    }
}

/// On-disk snapshot of both sources' rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedSnapshot {
    #[serde(default)]
    pub sources: BTreeMap<SourceId, Vec<RawCountRecord>>,
}

#[derive(Clone)]
pub struct FeedSet {
    pub analytics: Arc<dyn CountFeed>,
    pub chatbot: Arc<dyn CountFeed>,
}

impl FeedSet {
    pub fn new(analytics: Arc<dyn CountFeed>, chatbot: Arc<dyn CountFeed>) -> Self {
        Self { analytics, chatbot }
    }

    pub fn from_snapshot(mut snapshot: FeedSnapshot) -> Self {
        let mut take = |source: SourceId| -> Arc<dyn CountFeed> {
            let records = snapshot.sources.remove(&source).unwrap_or_default();
            Arc::new(StoredFeed::new(source, records))
        };
        let analytics = take(SourceId::Analytics);
        let chatbot = take(SourceId::Chatbot);
        Self { analytics, chatbot }
    }
}
