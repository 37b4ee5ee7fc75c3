use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::clock::Clock;
use foundation::intervals::IntervalCollection;
use layers::backend::{RendererBackend, TileSource};
use layers::retry::{TileDisposition, TileRetryPolicy};
use layers::scheduler::{DEFAULT_OPACITY, LayerScheduler, TileSourceProvider};
use layers::symbology::{Legend, build_region_color_array};
use regions::cache::{CatalogCache, RegionCatalogError, RegionIdsSource};
use regions::catalog::{RegionCatalog, RegionTypeConfig};
use regions::matcher::{AmbiguityPolicy, RegionMatchResult, match_rows};
use runtime::event_bus::{EventBus, LAYER_CHANGED, WARNING};
use runtime::generation::{Generation, GenerationCounter};

use crate::error::DisplayError;
use crate::report::MatchReport;
use crate::table::TableData;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub opacity: f32,
    /// Emit the first-display match report as a warning.
    pub show_warnings: bool,
    pub ambiguity: AmbiguityPolicy,
    pub retry: TileRetryPolicy,
    pub clip_to_bounds: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            opacity: DEFAULT_OPACITY,
            show_warnings: true,
            ambiguity: AmbiguityPolicy::default(),
            retry: TileRetryPolicy::default(),
            clip_to_bounds: false,
        }
    }
}

type MatchCache = BTreeMap<Option<usize>, Arc<RegionMatchResult>>;

/// Orchestrates one region-mapped dataset: resolves the region column,
/// matches rows, bakes color arrays and drives a `LayerScheduler` against
/// whatever renderer backend the host supplies.
///
/// The controller never fetches anything itself. Catalog loads go through
/// `begin_rebuild`/`complete_rebuild` so a host doing its own I/O can
/// deliver results whenever they arrive; `load` is the synchronous
/// convenience wrapper over a `CatalogCache`.
pub struct RegionDisplayController {
    config: RegionTypeConfig,
    options: DisplayOptions,
    legend: Legend,
    table: TableData,
    active_column: String,
    catalog: Option<Arc<RegionCatalog>>,
    region_column: Option<String>,
    disambig_column: Option<String>,
    intervals: IntervalCollection,
    scheduler: Option<LayerScheduler>,
    builds: GenerationCounter,
    reported: bool,
    /// Match results per interval, invalidated when data or catalog
    /// change. Interior mutability because baking happens behind the
    /// `TileSourceProvider` seam, which is read-only.
    match_cache: RefCell<MatchCache>,
}

impl RegionDisplayController {
    pub fn new(
        config: RegionTypeConfig,
        legend: Legend,
        table: TableData,
        active_column: impl Into<String>,
        options: DisplayOptions,
    ) -> Result<Self, DisplayError> {
        let intervals = table.intervals()?;
        Ok(Self {
            config,
            options,
            legend,
            table,
            active_column: active_column.into(),
            catalog: None,
            region_column: None,
            disambig_column: None,
            intervals,
            scheduler: None,
            builds: GenerationCounter::new(),
            reported: false,
            match_cache: RefCell::new(MatchCache::new()),
        })
    }

    pub fn region_column(&self) -> Option<&str> {
        self.region_column.as_deref()
    }

    pub fn active_column(&self) -> &str {
        &self.active_column
    }

    pub fn is_enabled(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn is_shown(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|s| s.is_shown())
    }

    /// Starts a rebuild, superseding any still in flight.
    pub fn begin_rebuild(&mut self) -> Generation {
        self.builds.advance()
    }

    /// Delivers the catalog for a rebuild started with `begin_rebuild`.
    /// Results for superseded rebuilds are rejected.
    pub fn complete_rebuild(
        &mut self,
        generation: Generation,
        outcome: Result<Arc<RegionCatalog>, RegionCatalogError>,
    ) -> Result<(), DisplayError> {
        if !self.builds.is_current(generation) {
            return Err(DisplayError::StaleBuildDiscarded);
        }
        let catalog = outcome?;
        let names = self.table.column_names();
        let region_column = catalog
            .find_region_column(&names)
            .ok_or_else(|| DisplayError::NoRegionColumnFound {
                region_type: self.config.region_type.clone(),
            })?
            .to_string();
        self.disambig_column = catalog.find_disambig_column(&names).map(str::to_string);
        self.region_column = Some(region_column);
        self.catalog = Some(catalog);
        self.match_cache.borrow_mut().clear();
        self.reported = false;
        Ok(())
    }

    /// Loads the region catalog through the shared cache and resolves the
    /// table's region column against it.
    pub fn load(
        &mut self,
        cache: &mut CatalogCache,
        source: &dyn RegionIdsSource,
    ) -> Result<(), DisplayError> {
        let generation = self.begin_rebuild();
        let outcome = cache.load(&self.config, source);
        self.complete_rebuild(generation, outcome)
    }

    /// Binds renderer layers for the dataset. Idempotent. Fails without
    /// touching the backend when no row at all matches; partial failures
    /// only warn, once per data load.
    pub fn enable(
        &mut self,
        clock: &Clock,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) -> Result<(), DisplayError> {
        if self.scheduler.is_some() {
            return Ok(());
        }

        // Validate against the interval the clock is in; for static
        // tables against the whole table. A clock outside every interval
        // is snapped to the nearest one, the same step a host snapping
        // its clock before playback would land on.
        let interval = if self.intervals.is_empty() {
            None
        } else {
            Some(self.intervals.index_of(clock.current_time).unwrap_or_else(|_| {
                self.intervals
                    .snap_nearest(clock.current_time)
                    .and_then(|snapped| self.intervals.index_of(snapped).ok())
                    .unwrap_or(self.intervals.len() - 1)
            }))
        };

        let report = {
            let provider = self.provider()?;
            let result = provider.match_for(interval);
            if result.is_total_failure() {
                return Err(DisplayError::AllRowsUnmatched {
                    region_type: self.config.region_type.clone(),
                    failed_rows: result.failed_rows.len(),
                });
            }
            let cells = self.table.region_texts(provider.region_column);
            MatchReport::new(&result, &cells)
        };

        if self.options.show_warnings
            && !self.reported
            && (report.failed_rows > 0 || report.ambiguous_rows > 0)
        {
            self.reported = true;
            let summary = report.summary(&self.config.region_type);
            tracing::warn!(
                region_type = %self.config.region_type,
                failed_rows = report.failed_rows,
                ambiguous_rows = report.ambiguous_rows,
                "{summary}"
            );
            bus.emit(WARNING, summary);
        }

        let mut scheduler =
            LayerScheduler::new(self.intervals.clone(), self.options.retry);
        scheduler.set_clip_to_bounds(self.options.clip_to_bounds);
        scheduler.set_opacity(self.options.opacity, backend);
        let provider = self.provider()?;
        scheduler.enable(clock, &provider, backend);
        self.scheduler = Some(scheduler);
        bus.emit(LAYER_CHANGED, "enabled");
        Ok(())
    }

    /// Releases all renderer resources. Safe when never enabled.
    pub fn disable(&mut self, backend: &mut dyn RendererBackend, bus: &mut EventBus) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.disable(backend);
            bus.emit(LAYER_CHANGED, "disabled");
        }
    }

    pub fn show(
        &mut self,
        clock: &Clock,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };
        if let Ok(provider) = self.provider() {
            scheduler.show(clock, &provider, backend, bus);
        }
        self.scheduler = Some(scheduler);
    }

    pub fn hide(&mut self, backend: &mut dyn RendererBackend, bus: &mut EventBus) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.hide(backend, bus);
        }
    }

    pub fn set_opacity(&mut self, opacity: f32, backend: &mut dyn RendererBackend) {
        self.options.opacity = opacity;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.set_opacity(opacity, backend);
        }
    }

    /// Forwards a clock movement, first pumping any tile failures the
    /// renderer has accumulated.
    pub fn on_clock_tick(
        &mut self,
        clock: &Clock,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };
        for error in backend.drain_tile_errors() {
            let disposition = scheduler.on_tile_error(error, backend, bus);
            if disposition == TileDisposition::FailLayer {
                tracing::warn!(
                    region_type = %self.config.region_type,
                    status = ?error.status,
                    "layer hidden after repeated tile failures"
                );
            }
        }
        if let Ok(provider) = self.provider() {
            scheduler.on_clock_tick(clock, &provider, backend, bus);
        }
        self.scheduler = Some(scheduler);
    }

    /// Switches which value column drives the coloring. The region column
    /// is a property of catalog and table, not of the value column, so
    /// match results stay valid; only colors are rebaked.
    pub fn set_active_column(
        &mut self,
        name: impl Into<String>,
        clock: &Clock,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        let name = name.into();
        if self.active_column == name {
            return;
        }
        self.active_column = name;
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };
        if let Ok(provider) = self.provider() {
            scheduler.refresh(clock, &provider, backend, bus);
        }
        self.scheduler = Some(scheduler);
    }

    /// Replaces the table wholesale: everything derived from it (match
    /// results, intervals, resolved columns, the first-display report
    /// gate) is rebuilt, and live layers are torn down and re-created.
    pub fn on_data_changed(
        &mut self,
        table: TableData,
        clock: &Clock,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) -> Result<(), DisplayError> {
        let was_enabled = self.scheduler.is_some();
        let was_shown = self.is_shown();
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.disable(backend);
        }

        self.table = table;
        self.intervals = self.table.intervals()?;
        self.match_cache.borrow_mut().clear();
        self.reported = false;
        if let Some(catalog) = &self.catalog {
            let names = self.table.column_names();
            self.region_column = catalog.find_region_column(&names).map(str::to_string);
            self.disambig_column = catalog.find_disambig_column(&names).map(str::to_string);
            if self.region_column.is_none() {
                return Err(DisplayError::NoRegionColumnFound {
                    region_type: self.config.region_type.clone(),
                });
            }
        }

        if was_enabled {
            self.enable(clock, backend, bus)?;
            if was_shown {
                self.show(clock, backend, bus);
            }
        }
        Ok(())
    }

    fn provider(&self) -> Result<ColoredSourceProvider<'_>, DisplayError> {
        let catalog = self.catalog.as_ref().ok_or(DisplayError::CatalogNotLoaded)?;
        let region_column =
            self.region_column
                .as_deref()
                .ok_or_else(|| DisplayError::NoRegionColumnFound {
                    region_type: self.config.region_type.clone(),
                })?;
        Ok(ColoredSourceProvider {
            catalog,
            table: &self.table,
            region_column,
            disambig_column: self.disambig_column.as_deref(),
            active_column: &self.active_column,
            legend: &self.legend,
            ambiguity: self.options.ambiguity,
            intervals: &self.intervals,
            cache: &self.match_cache,
        })
    }
}

/// Bakes per-interval tile sources on demand for the scheduler. Holds
/// only borrows; built fresh for each call into the scheduler.
struct ColoredSourceProvider<'a> {
    catalog: &'a Arc<RegionCatalog>,
    table: &'a TableData,
    region_column: &'a str,
    disambig_column: Option<&'a str>,
    active_column: &'a str,
    legend: &'a Legend,
    ambiguity: AmbiguityPolicy,
    intervals: &'a IntervalCollection,
    cache: &'a RefCell<MatchCache>,
}

impl ColoredSourceProvider<'_> {
    fn match_for(&self, interval: Option<usize>) -> Arc<RegionMatchResult> {
        if let Some(hit) = self.cache.borrow().get(&interval) {
            return Arc::clone(hit);
        }
        let region_cells = self.table.region_texts(self.region_column);
        let disambig_cells = self
            .disambig_column
            .map(|name| self.table.region_texts(name));
        let span = interval.and_then(|k| self.intervals.get(k));

        let filter_fn;
        let filter: Option<&dyn Fn(usize) -> bool> =
            match (self.table.row_spans.as_ref(), span) {
                (Some(spans), Some(target)) => {
                    filter_fn =
                        move |row: usize| spans.get(row).copied().flatten() == Some(target);
                    Some(&filter_fn)
                }
                _ => None,
            };

        let result = Arc::new(match_rows(
            &region_cells,
            disambig_cells.as_deref(),
            self.catalog,
            filter,
            self.ambiguity,
        ));
        self.cache.borrow_mut().insert(interval, Arc::clone(&result));
        result
    }
}

impl TileSourceProvider for ColoredSourceProvider<'_> {
    fn tile_source(&self, interval: Option<usize>) -> TileSource {
        let result = self.match_for(interval);
        let empty = Vec::new();
        let values = self
            .table
            .column(self.active_column)
            .map(|c| c.values.as_slice())
            .unwrap_or(&empty);
        let region_colors =
            build_region_color_array(&result.region_to_row, values, self.legend);
        TileSource {
            server: self.catalog.server().to_string(),
            layer_name: self.catalog.region_type().to_string(),
            region_colors,
            interval,
        }
    }
}
