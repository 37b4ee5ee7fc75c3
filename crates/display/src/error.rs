use foundation::intervals::IntervalError;
use regions::cache::RegionCatalogError;

/// Fatal conditions of a region display. Partial match failures and tile
/// fetch troubles are not in here; those surface as warnings on the event
/// bus and leave the display running.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayError {
    /// The region catalog could not be loaded.
    Catalog(RegionCatalogError),
    /// `enable` (or a rebuild) was attempted before a catalog load
    /// completed.
    CatalogNotLoaded,
    /// No column of the table names this region type or any of its
    /// aliases.
    NoRegionColumnFound { region_type: String },
    /// Every candidate row failed to match: the data is almost certainly
    /// keyed on a different coding scheme.
    AllRowsUnmatched {
        region_type: String,
        failed_rows: usize,
    },
    /// A newer rebuild was requested while this one was in flight; its
    /// result must be thrown away.
    StaleBuildDiscarded,
    /// The table's row spans do not form disjoint intervals.
    InvalidTimeSpans(IntervalError),
}

impl std::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayError::Catalog(err) => write!(f, "{err}"),
            DisplayError::CatalogNotLoaded => {
                write!(f, "region catalog has not been loaded yet")
            }
            DisplayError::NoRegionColumnFound { region_type } => {
                write!(f, "no column matches region type {region_type:?} or its aliases")
            }
            DisplayError::AllRowsUnmatched {
                region_type,
                failed_rows,
            } => write!(
                f,
                "none of the {failed_rows} candidate rows matched a {region_type} region"
            ),
            DisplayError::StaleBuildDiscarded => {
                write!(f, "rebuild superseded by a newer one; result discarded")
            }
            DisplayError::InvalidTimeSpans(err) => write!(f, "invalid row time spans: {err}"),
        }
    }
}

impl std::error::Error for DisplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DisplayError::Catalog(err) => Some(err),
            DisplayError::InvalidTimeSpans(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegionCatalogError> for DisplayError {
    fn from(err: RegionCatalogError) -> Self {
        DisplayError::Catalog(err)
    }
}

impl From<IntervalError> for DisplayError {
    fn from(err: IntervalError) -> Self {
        DisplayError::InvalidTimeSpans(err)
    }
}
