use crate::catalog::{RegionCatalog, RegionIndex};

pub type RowIndex = usize;

/// What to do when two rows claim the same region.
///
/// `LastWins` matches the original behavior ("most recent row in file
/// order wins"); whether that was deliberate is unclear, so the policy is
/// configurable rather than baked in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    #[default]
    LastWins,
    FirstWins,
}

/// Outcome of matching a data column against a region catalog.
///
/// `region_to_row[i]` is the row whose value matched region `i`, or `None`
/// if no row did. Rows that could not be matched at all are listed in
/// `failed_rows`; rows that collided with an earlier match for the same
/// region are listed in `ambiguous_rows` (the retained row is decided by
/// the `AmbiguityPolicy`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionMatchResult {
    pub region_to_row: Vec<Option<RowIndex>>,
    pub failed_rows: Vec<RowIndex>,
    pub ambiguous_rows: Vec<RowIndex>,
}

impl RegionMatchResult {
    pub fn matched_count(&self) -> usize {
        self.region_to_row.iter().filter(|r| r.is_some()).count()
    }

    /// True when rows were considered but none matched any region. Data
    /// like this cannot be displayed as a region map at all.
    pub fn is_total_failure(&self) -> bool {
        self.matched_count() == 0 && !self.failed_rows.is_empty()
    }
}

/// Maps data rows to region indices.
///
/// Pure function of its inputs: the same arguments always produce a
/// structurally equal result, which is what makes caching by inputs sound.
///
/// `time_filter` masks out rows that do not apply at the current time step
/// (for time-varying tables where one region appears in several rows).
/// Rows with an empty cell are skipped silently; rows whose value cannot
/// be matched go to `failed_rows`.
pub fn match_rows(
    region_column: &[Option<String>],
    disambig_column: Option<&[Option<String>]>,
    catalog: &RegionCatalog,
    time_filter: Option<&dyn Fn(RowIndex) -> bool>,
    policy: AmbiguityPolicy,
) -> RegionMatchResult {
    let mut result = RegionMatchResult {
        region_to_row: vec![None; catalog.len()],
        failed_rows: Vec::new(),
        ambiguous_rows: Vec::new(),
    };

    for (row, cell) in region_column.iter().enumerate() {
        let Some(raw) = cell else { continue };

        if let Some(filter) = time_filter {
            if !filter(row) {
                continue;
            }
        }

        let disambig = disambig_column
            .and_then(|col| col.get(row))
            .and_then(|cell| cell.as_deref());

        let index: Option<RegionIndex> = catalog
            .normalize(raw)
            .and_then(|normalized| catalog.index_of(&normalized, disambig));

        let Some(index) = index else {
            result.failed_rows.push(row);
            continue;
        };

        match result.region_to_row[index] {
            None => result.region_to_row[index] = Some(row),
            Some(_) => {
                result.ambiguous_rows.push(row);
                if policy == AmbiguityPolicy::LastWins {
                    result.region_to_row[index] = Some(row);
                }
            }
        }
    }

    result
}
