use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::normalize::Normalization;

pub type RegionIndex = usize;

/// One entry in the host's region-mapping configuration: where a region
/// type's identifier list lives and how to match column names against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionTypeConfig {
    /// Coding scheme name, e.g. "POA" or "SA4".
    pub region_type: String,
    /// Tile server endpoint for this region type's boundary tiles.
    pub server: String,
    /// URL of the pre-generated identifier list (`RegionIdsFile`).
    pub region_ids_url: String,
    /// Optional identifier list for the disambiguation attribute.
    #[serde(default)]
    pub disambig_ids_url: Option<String>,
    /// Column-name aliases recognized as this region type.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Column-name aliases recognized as the disambiguation column.
    #[serde(default)]
    pub disambig_aliases: Vec<String>,
    #[serde(default)]
    pub normalization: Normalization,
}

/// Primary-identifier lookup slot. Several regions can share a primary
/// identifier (e.g. the same suburb name in two states); those need the
/// disambiguation attribute to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
enum IdSlot {
    Unique(RegionIndex),
    Shared(Vec<RegionIndex>),
}

/// Immutable enumeration of the known regions of one region type.
///
/// Identifiers are stored canonicalized, in feature-id order (index `i`
/// here is the region's stable feature id on the tile server). Built once
/// by `CatalogCache` and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCatalog {
    region_type: String,
    server: String,
    normalization: Normalization,
    aliases: Vec<String>,
    disambig_aliases: Vec<String>,
    ids: Vec<Option<String>>,
    disambig_ids: Option<Vec<Option<String>>>,
    index: BTreeMap<String, IdSlot>,
}

impl RegionCatalog {
    /// Builds a catalog from raw identifier lists in feature-id order.
    ///
    /// `None` entries keep their position (the feature exists but has no
    /// usable identifier) and are simply never matched.
    pub fn from_ids(
        config: &RegionTypeConfig,
        raw_ids: Vec<Option<String>>,
        raw_disambig_ids: Option<Vec<Option<String>>>,
    ) -> Self {
        let normalization = config.normalization.clone();

        let ids: Vec<Option<String>> = raw_ids
            .into_iter()
            .map(|raw| raw.and_then(|v| normalization.apply(&v)))
            .collect();

        let disambig_ids = raw_disambig_ids.map(|raw| {
            let mut values: Vec<Option<String>> = raw
                .into_iter()
                .map(|v| v.and_then(|v| normalization.apply(&v)))
                .collect();
            values.resize(ids.len(), None);
            values
        });

        let mut index: BTreeMap<String, IdSlot> = BTreeMap::new();
        for (i, id) in ids.iter().enumerate() {
            let Some(id) = id else { continue };
            match index.entry(id.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(IdSlot::Unique(i));
                }
                Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut();
                    match *slot {
                        IdSlot::Unique(first) => *slot = IdSlot::Shared(vec![first, i]),
                        IdSlot::Shared(ref mut all) => all.push(i),
                    }
                }
            }
        }

        Self {
            region_type: config.region_type.clone(),
            server: config.server.clone(),
            normalization,
            aliases: config.aliases.clone(),
            disambig_aliases: config.disambig_aliases.clone(),
            ids,
            disambig_ids,
            index,
        }
    }

    pub fn region_type(&self) -> &str {
        &self.region_type
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Number of known regions (including ones without an identifier).
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Canonicalized identifier of region `i`, if it has one.
    pub fn id_at(&self, i: RegionIndex) -> Option<&str> {
        self.ids.get(i).and_then(|id| id.as_deref())
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        self.normalization.apply(raw)
    }

    /// O(1) lookup of an already-normalized identifier.
    ///
    /// When several regions share the primary identifier, the
    /// disambiguation value picks among them; with no disambiguation value
    /// the first matching region wins.
    pub fn index_of(&self, normalized: &str, disambig: Option<&str>) -> Option<RegionIndex> {
        match self.index.get(normalized)? {
            IdSlot::Unique(i) => Some(*i),
            IdSlot::Shared(candidates) => {
                let Some(disambig) = disambig else {
                    return candidates.first().copied();
                };
                let wanted = self.normalization.apply(disambig)?;
                let disambig_ids = self.disambig_ids.as_ref()?;
                candidates
                    .iter()
                    .copied()
                    .find(|&i| disambig_ids[i].as_deref() == Some(wanted.as_str()))
            }
        }
    }

    /// First column name recognized as this region type, matching the
    /// type name or any alias, case-insensitively, whole-name only.
    pub fn find_region_column<'a>(&self, column_names: &'a [String]) -> Option<&'a str> {
        let mut candidates: Vec<&str> = vec![self.region_type.as_str()];
        candidates.extend(self.aliases.iter().map(String::as_str));
        find_column_for_aliases(column_names, &candidates)
    }

    /// First column name recognized as the disambiguation attribute.
    pub fn find_disambig_column<'a>(&self, column_names: &'a [String]) -> Option<&'a str> {
        if self.disambig_aliases.is_empty() {
            return None;
        }
        let candidates: Vec<&str> = self.disambig_aliases.iter().map(String::as_str).collect();
        find_column_for_aliases(column_names, &candidates)
    }
}

fn find_column_for_aliases<'a>(column_names: &'a [String], aliases: &[&str]) -> Option<&'a str> {
    for alias in aliases {
        for name in column_names {
            if name.eq_ignore_ascii_case(alias) {
                return Some(name.as_str());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{RegionCatalog, RegionTypeConfig};
    use crate::normalize::Normalization;

    pub(crate) fn poa_config() -> RegionTypeConfig {
        RegionTypeConfig {
            region_type: "POA".to_string(),
            server: "https://tiles.example/poa".to_string(),
            region_ids_url: "https://data.example/poa_ids.json".to_string(),
            disambig_ids_url: None,
            aliases: vec!["postcode".to_string(), "poa_code".to_string()],
            disambig_aliases: vec!["state".to_string()],
            normalization: Normalization::default(),
        }
    }

    fn ids(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn round_trips_every_identifier() {
        let catalog = RegionCatalog::from_ids(&poa_config(), ids(&["0800", "0810", "0812"]), None);
        for i in 0..catalog.len() {
            let id = catalog.id_at(i).expect("identifier");
            let normalized = catalog.normalize(id).expect("normalizes");
            assert_eq!(catalog.index_of(&normalized, None), Some(i));
        }
    }

    #[test]
    fn lookup_is_canonical_form_only() {
        let catalog = RegionCatalog::from_ids(&poa_config(), ids(&["0800", "0810"]), None);
        assert_eq!(catalog.index_of("800", None), Some(0));
        // Raw form must go through normalize() first.
        assert_eq!(catalog.index_of("0800", None), None);
    }

    #[test]
    fn shared_identifier_resolved_by_disambiguation() {
        let catalog = RegionCatalog::from_ids(
            &poa_config(),
            ids(&["richmond", "richmond", "hobart"]),
            Some(ids(&["vic", "nsw", "tas"])),
        );
        assert_eq!(catalog.index_of("richmond", Some("NSW")), Some(1));
        assert_eq!(catalog.index_of("richmond", Some("vic")), Some(0));
        // No disambiguation value: first matching region wins.
        assert_eq!(catalog.index_of("richmond", None), Some(0));
        assert_eq!(catalog.index_of("richmond", Some("qld")), None);
    }

    #[test]
    fn gap_entries_hold_their_position() {
        let catalog =
            RegionCatalog::from_ids(&poa_config(), vec![Some("0800".into()), None, Some("0812".into())], None);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.id_at(1), None);
        assert_eq!(catalog.index_of("812", None), Some(2));
    }

    #[test]
    fn finds_region_and_disambig_columns_by_alias() {
        let catalog = RegionCatalog::from_ids(&poa_config(), ids(&["0800"]), None);
        let names = vec![
            "Year".to_string(),
            "Postcode".to_string(),
            "State".to_string(),
            "Value".to_string(),
        ];
        assert_eq!(catalog.find_region_column(&names), Some("Postcode"));
        assert_eq!(catalog.find_disambig_column(&names), Some("State"));
        let unrelated = vec!["Year".to_string(), "Value".to_string()];
        assert_eq!(catalog.find_region_column(&unrelated), None);
    }
}
