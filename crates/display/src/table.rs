use foundation::intervals::{IntervalCollection, IntervalError};
use foundation::time::TimeSpan;
use layers::symbology::ColumnValue;

/// One column of an already-parsed data table. Parsing and type inference
/// happen upstream; by the time a table reaches the engine every cell is
/// either a value or explicitly empty.
#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<ColumnValue>>,
}

/// The tabular input to a region display: named columns plus, for
/// time-varying tables, the time span each row applies to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    pub columns: Vec<TableColumn>,
    /// `row_spans[r]` is the span row `r` is valid for, `None` when the
    /// row has no usable time. Absent entirely for static tables.
    pub row_spans: Option<Vec<Option<TimeSpan>>>,
}

impl TableData {
    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.columns.iter().map(|c| c.values.len()).max().unwrap_or(0)
    }

    /// The named column's cells as raw identifier text, ready for region
    /// matching. A missing column yields no cells.
    pub fn region_texts(&self, name: &str) -> Vec<Option<String>> {
        match self.column(name) {
            Some(column) => column
                .values
                .iter()
                .map(|v| v.as_ref().map(ColumnValue::as_region_text))
                .collect(),
            None => Vec::new(),
        }
    }

    /// The distinct row spans as an interval collection, in first-seen
    /// row order before sorting. Static tables yield an empty collection.
    pub fn intervals(&self) -> Result<IntervalCollection, IntervalError> {
        let Some(spans) = &self.row_spans else {
            return Ok(IntervalCollection::empty());
        };
        let mut distinct: Vec<TimeSpan> = Vec::new();
        for span in spans.iter().flatten() {
            if !distinct.contains(span) {
                distinct.push(*span);
            }
        }
        IntervalCollection::new(distinct)
    }
}

#[cfg(test)]
mod tests {
    use foundation::time::{Time, TimeSpan};
    use layers::symbology::ColumnValue;
    use pretty_assertions::assert_eq;

    use super::{TableColumn, TableData};

    fn text(s: &str) -> Option<ColumnValue> {
        Some(ColumnValue::Text(s.to_string()))
    }

    #[test]
    fn region_texts_renders_numbers_as_identifiers() {
        let table = TableData {
            columns: vec![TableColumn {
                name: "postcode".to_string(),
                values: vec![Some(ColumnValue::Number(3121.0)), None, text("3122")],
            }],
            row_spans: None,
        };
        assert_eq!(
            table.region_texts("postcode"),
            vec![Some("3121".to_string()), None, Some("3122".to_string())]
        );
        assert_eq!(table.region_texts("no such column"), Vec::<Option<String>>::new());
    }

    #[test]
    fn intervals_deduplicates_repeated_row_spans() {
        let a = TimeSpan::new(Time(0.0), Time(10.0));
        let b = TimeSpan::new(Time(10.0), Time(20.0));
        let table = TableData {
            columns: vec![TableColumn {
                name: "postcode".to_string(),
                values: vec![text("3121"), text("3122"), text("3121"), text("3122")],
            }],
            row_spans: Some(vec![Some(a), Some(a), Some(b), Some(b)]),
        };
        let intervals = table.intervals().expect("disjoint spans");
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals.get(0), Some(a));
        assert_eq!(intervals.get(1), Some(b));
    }

    #[test]
    fn static_table_has_no_intervals() {
        let table = TableData::default();
        assert!(table.intervals().expect("empty").is_empty());
    }
}
