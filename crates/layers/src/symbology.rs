use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A cell value from the active data column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Number(f64),
    Text(String),
}

impl ColumnValue {
    /// Text form used for region-identifier matching. Integral numbers
    /// print without a fractional part so `800.0` matches "800".
    pub fn as_region_text(&self) -> String {
        match self {
            ColumnValue::Text(s) => s.clone(),
            ColumnValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
}

/// One numeric legend bin: values up to and including `up_to` take `color`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendBin {
    pub up_to: f64,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LegendKind {
    /// Ordered numeric bins, ascending by `up_to`. Values above the last
    /// bin clamp to it.
    Bins(Vec<LegendBin>),
    /// Category name to color.
    Categories(BTreeMap<String, Rgba>),
}

/// A value-to-color mapping plus the color used where a region has no
/// matched data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legend {
    pub kind: LegendKind,
    pub no_data: Rgba,
}

impl Legend {
    /// Total, stable value-to-color mapping. Identical `(value, legend)`
    /// pairs always yield the identical color; values the legend cannot
    /// interpret map to the no-data color.
    pub fn color_for(&self, value: Option<&ColumnValue>) -> Rgba {
        let Some(value) = value else {
            return self.no_data;
        };
        match (&self.kind, value) {
            (LegendKind::Bins(bins), ColumnValue::Number(n)) => {
                if !n.is_finite() {
                    return self.no_data;
                }
                for bin in bins {
                    if *n <= bin.up_to {
                        return bin.color;
                    }
                }
                bins.last().map(|b| b.color).unwrap_or(self.no_data)
            }
            (LegendKind::Categories(table), ColumnValue::Text(s)) => {
                table.get(s).copied().unwrap_or(self.no_data)
            }
            // Type mismatch between column and legend: no data.
            _ => self.no_data,
        }
    }
}

/// Builds the per-region color array driving tile recoloring.
///
/// `colors[i]` is the color of region `i`: the legend color of the matched
/// row's value, or the no-data color when no row matched.
pub fn build_region_color_array(
    region_to_row: &[Option<usize>],
    values: &[Option<ColumnValue>],
    legend: &Legend,
) -> Vec<Rgba> {
    region_to_row
        .iter()
        .map(|row| {
            let value = row.and_then(|r| values.get(r)).and_then(|v| v.as_ref());
            legend.color_for(value)
        })
        .collect()
}
