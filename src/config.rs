use crate::engine::EngineConfig;
use crate::errors::EngineError;
use crate::models::parse_date_key;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub taxonomy_path: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);
        let data_path = lookup("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/feeds.json"));
        let taxonomy_path = lookup("APP_TAXONOMY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/taxonomy.json"));

        let horizon = match lookup("APP_DATA_HORIZON").filter(|value| !value.trim().is_empty()) {
            Some(value) => Some(parse_date_key(&value).ok_or(EngineError::InvalidDate(value))?),
            None => None,
        };
        let mut engine = EngineConfig {
            horizon,
            ..EngineConfig::default()
        };
        if let Some(top_n) = lookup("APP_TOP_N").and_then(|value| value.parse::<usize>().ok()) {
            engine.default_top_n = top_n;
        }

        Ok(Self {
            port,
            data_path,
            taxonomy_path,
            engine,
        })
    }
}
