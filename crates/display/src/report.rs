use regions::matcher::RegionMatchResult;

/// How many failed raw values a report quotes back to the user.
const SAMPLE_LIMIT: usize = 10;

/// User-facing summary of one matching pass, shown once when a dataset is
/// first displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchReport {
    pub total_rows: usize,
    pub matched_regions: usize,
    pub failed_rows: usize,
    pub ambiguous_rows: usize,
    /// Raw cell values that failed to match, capped at a handful.
    pub sample_failed_values: Vec<String>,
}

impl MatchReport {
    pub fn new(result: &RegionMatchResult, region_cells: &[Option<String>]) -> Self {
        let sample_failed_values = result
            .failed_rows
            .iter()
            .filter_map(|&row| region_cells.get(row).and_then(|cell| cell.clone()))
            .take(SAMPLE_LIMIT)
            .collect();
        Self {
            total_rows: region_cells.len(),
            matched_regions: result.matched_count(),
            failed_rows: result.failed_rows.len(),
            ambiguous_rows: result.ambiguous_rows.len(),
            sample_failed_values,
        }
    }

    pub fn summary(&self, region_type: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.failed_rows > 0 {
            let mut text = format!(
                "{} of {} rows could not be matched to a {} region",
                self.failed_rows, self.total_rows, region_type
            );
            if !self.sample_failed_values.is_empty() {
                text.push_str(&format!(
                    " (unmatched values include {})",
                    self.sample_failed_values.join(", ")
                ));
            }
            parts.push(text);
        }
        if self.ambiguous_rows > 0 {
            parts.push(format!(
                "{} rows mapped to a {} region already taken by another row",
                self.ambiguous_rows, region_type
            ));
        }
        parts.join("; ")
    }
}
