use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::catalog::{RegionCatalog, RegionTypeConfig};

/// Pre-generated identifier list for one layer attribute, in ascending
/// feature-id order. The `layer` and `property` fields travel with the
/// file but are not needed for matching.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionIdsFile {
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    pub values: Vec<Option<IdValue>>,
}

/// Identifier lists mix numeric and text codes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Text(String),
    Number(i64),
}

impl RegionIdsFile {
    fn into_raw_ids(self) -> Vec<Option<String>> {
        self.values
            .into_iter()
            .map(|value| {
                value.map(|v| match v {
                    IdValue::Text(s) => s,
                    IdValue::Number(n) => n.to_string(),
                })
            })
            .collect()
    }
}

/// Fetches identifier-list documents. The network layer is owned by the
/// host; the engine only sees the document text.
pub trait RegionIdsSource {
    fn fetch(&self, url: &str) -> Result<String, IdsSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdsSourceError {
    pub message: String,
}

impl IdsSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IdsSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for IdsSourceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionCatalogError {
    /// The identifier list failed to load or parse. Distinct from a
    /// successfully loaded catalog that happens to contain zero regions.
    Unavailable { region_type: String, reason: String },
}

impl std::fmt::Display for RegionCatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionCatalogError::Unavailable {
                region_type,
                reason,
            } => {
                write!(f, "region list for {region_type} unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for RegionCatalogError {}

/// Process-wide catalog cache, keyed by region type.
///
/// Each region type is loaded at most once for the cache's lifetime and the
/// outcome is cached, successes and failures alike: a failed load is not
/// retried automatically (the host builds a fresh cache to retry). Entries
/// are never evicted.
#[derive(Debug, Default)]
pub struct CatalogCache {
    entries: BTreeMap<String, Result<Arc<RegionCatalog>, RegionCatalogError>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads (or returns the cached) catalog for `config.region_type`.
    ///
    /// The source is consulted exactly once per region type; every later
    /// call observes the same outcome.
    pub fn load(
        &mut self,
        config: &RegionTypeConfig,
        source: &dyn RegionIdsSource,
    ) -> Result<Arc<RegionCatalog>, RegionCatalogError> {
        if let Some(cached) = self.entries.get(&config.region_type) {
            return cached.clone();
        }
        let outcome = load_uncached(config, source);
        self.entries
            .insert(config.region_type.clone(), outcome.clone());
        outcome
    }

    pub fn is_loaded(&self, region_type: &str) -> bool {
        matches!(self.entries.get(region_type), Some(Ok(_)))
    }
}

fn load_uncached(
    config: &RegionTypeConfig,
    source: &dyn RegionIdsSource,
) -> Result<Arc<RegionCatalog>, RegionCatalogError> {
    let unavailable = |reason: String| RegionCatalogError::Unavailable {
        region_type: config.region_type.clone(),
        reason,
    };

    let ids_text = source
        .fetch(&config.region_ids_url)
        .map_err(|e| unavailable(e.message))?;
    let ids_file: RegionIdsFile =
        serde_json::from_str(&ids_text).map_err(|e| unavailable(e.to_string()))?;

    let disambig_ids = match &config.disambig_ids_url {
        Some(url) => {
            let text = source.fetch(url).map_err(|e| unavailable(e.message))?;
            let file: RegionIdsFile =
                serde_json::from_str(&text).map_err(|e| unavailable(e.to_string()))?;
            Some(file.into_raw_ids())
        }
        None => None,
    };

    Ok(Arc::new(RegionCatalog::from_ids(
        config,
        ids_file.into_raw_ids(),
        disambig_ids,
    )))
}
