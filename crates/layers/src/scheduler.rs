use foundation::clock::{Clock, PlaybackDirection};
use foundation::intervals::IntervalCollection;
use runtime::event_bus::{EventBus, LAYER_CHANGED, WARNING};

use crate::backend::{LayerHandle, LayerOptions, RendererBackend, TileError, TileSource};
use crate::retry::{TileDisposition, TileRetryPolicy, TileRetryTracker};
use crate::slot::{LayerSlot, Slots};

/// Builds the tile source for a given interval. Implemented by whatever
/// knows how to color tiles (for region maps: the display controller,
/// which matches rows and bakes the color array for that time step).
pub trait TileSourceProvider {
    fn tile_source(&self, interval: Option<usize>) -> TileSource;
}

pub const DEFAULT_OPACITY: f32 = 0.8;

/// Schedules the raster layers of one dataset.
///
/// For time-varying data the scheduler double-buffers: the layer for the
/// clock's interval is visible at the item's opacity, while the layer for
/// the predicted next interval is already bound (and loading tiles) at
/// opacity zero. A normal sequential tick then only flips opacities, so
/// the swap is seamless; a scrub discards the prefetch and rebuilds.
pub struct LayerScheduler {
    intervals: IntervalCollection,
    slots: Slots,
    enabled: bool,
    shown: bool,
    opacity: f32,
    clip_to_bounds: bool,
    policy: TileRetryPolicy,
    retries: TileRetryTracker,
}

impl LayerScheduler {
    /// `intervals` is empty for non-time-varying datasets.
    pub fn new(intervals: IntervalCollection, policy: TileRetryPolicy) -> Self {
        Self {
            intervals,
            slots: Slots::Idle,
            enabled: false,
            shown: false,
            opacity: DEFAULT_OPACITY,
            clip_to_bounds: false,
            policy,
            retries: TileRetryTracker::new(),
        }
    }

    pub fn is_time_varying(&self) -> bool {
        !self.intervals.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn current_interval(&self) -> Option<usize> {
        self.slots.current().and_then(|slot| slot.interval)
    }

    pub fn set_clip_to_bounds(&mut self, clip: bool) {
        self.clip_to_bounds = clip;
    }

    /// Binds layers for the clock's position. Idempotent; layers start
    /// hidden until `show`.
    pub fn enable(
        &mut self,
        clock: &Clock,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
    ) {
        self.enable_at(None, clock, provider, backend);
    }

    /// `anchor` is a stack index to rebuild at; `None` binds on top.
    fn enable_at(
        &mut self,
        anchor: Option<usize>,
        clock: &Clock,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
    ) {
        if self.enabled {
            return;
        }
        self.enabled = true;

        if !self.is_time_varying() {
            let slot = self.create_slot(None, self.opacity, anchor, provider, backend);
            self.slots = Slots::Single(slot);
            return;
        }

        let direction = clock.direction();
        match self.intervals.index_of(clock.current_time) {
            Ok(k) => {
                let current = self.create_slot(Some(k), self.opacity, anchor, provider, backend);
                match self.intervals.next_index(k, direction) {
                    Some(n) => {
                        let next = self.create_slot(Some(n), 0.0, anchor, provider, backend);
                        place_below(backend, next.handle, current.handle);
                        self.slots = Slots::DoubleBuffered { current, next };
                    }
                    None => self.slots = Slots::Single(current),
                }
            }
            Err(insertion) => {
                // Clock is outside every interval: nothing to show yet,
                // but prefetch the interval playback will reach first.
                match self.intervals.nearest_index_from(insertion, direction) {
                    Some(n) => {
                        let next = self.create_slot(Some(n), 0.0, anchor, provider, backend);
                        self.slots = Slots::PrefetchOnly { next };
                    }
                    None => self.slots = Slots::Idle,
                }
            }
        }
    }

    /// Releases all renderer resources. Safe to call even if never
    /// enabled.
    pub fn disable(&mut self, backend: &mut dyn RendererBackend) {
        for handle in self.slots.take().handles() {
            backend.remove(handle);
        }
        self.enabled = false;
        self.shown = false;
        self.retries.clear();
    }

    /// Makes the bound layers visible and starts processing clock ticks.
    ///
    /// Re-showing after a tile-failure hide starts retrying from scratch.
    pub fn show(
        &mut self,
        clock: &Clock,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        if !self.enabled || self.shown {
            return;
        }
        self.shown = true;
        self.retries.clear();
        for handle in self.slots.handles() {
            backend.set_visible(handle, true);
        }
        // The clock may have moved while we were hidden.
        self.on_clock_tick(clock, provider, backend, bus);
        bus.emit(LAYER_CHANGED, "shown");
    }

    pub fn hide(&mut self, backend: &mut dyn RendererBackend, bus: &mut EventBus) {
        if !self.shown {
            return;
        }
        self.shown = false;
        for handle in self.slots.handles() {
            backend.set_visible(handle, false);
        }
        bus.emit(LAYER_CHANGED, "hidden");
    }

    pub fn set_opacity(&mut self, opacity: f32, backend: &mut dyn RendererBackend) {
        self.opacity = opacity;
        if let Some(current) = self.slots.current() {
            backend.set_opacity(current.handle, opacity);
        }
    }

    /// Reacts to the shared clock moving. No-op unless time-varying,
    /// enabled and shown.
    pub fn on_clock_tick(
        &mut self,
        clock: &Clock,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        if !self.enabled || !self.shown || !self.is_time_varying() {
            return;
        }
        let time = clock.current_time;
        let direction = clock.direction();

        // Still inside the current interval: the only thing that can need
        // attention is the prefetch target (direction may have flipped).
        if let Some(current) = self.slots.current() {
            if let Some(k) = current.interval {
                if self.intervals.get(k).is_some_and(|span| span.contains(time)) {
                    self.retarget_prefetch(k, direction, provider, backend);
                    return;
                }
            }
        }

        match self.intervals.index_of(time) {
            Err(_) => {
                // No imagery for this time. Drop the visible layer but keep
                // any prefetch already loading.
                match self.slots.take() {
                    Slots::Single(current) => {
                        backend.remove(current.handle);
                        self.slots = Slots::Idle;
                        bus.emit(LAYER_CHANGED, "left all intervals");
                    }
                    Slots::DoubleBuffered { current, next } => {
                        backend.remove(current.handle);
                        self.slots = Slots::PrefetchOnly { next };
                        bus.emit(LAYER_CHANGED, "left all intervals");
                    }
                    other => self.slots = other,
                }
            }
            Ok(k) => {
                let (old_current, prefetch) = match self.slots.take() {
                    Slots::Idle => (None, None),
                    Slots::Single(current) => (Some(current), None),
                    Slots::PrefetchOnly { next } => (None, Some(next)),
                    Slots::DoubleBuffered { current, next } => (Some(current), Some(next)),
                };

                let new_current = match prefetch {
                    Some(next) if next.interval == Some(k) => {
                        // Sequential tick: promote the prefetched layer.
                        backend.set_opacity(next.handle, self.opacity);
                        if let Some(old) = old_current {
                            promote_into_place(backend, next.handle, old.handle);
                        }
                        next
                    }
                    stale => {
                        // Scrub: the prefetch (if any) is for the wrong
                        // interval. Discard it and build a fresh current.
                        if let Some(stale) = stale {
                            backend.remove(stale.handle);
                        }
                        let stack_index = old_current
                            .and_then(|c| backend.stack_position(c.handle))
                            .map(|p| p + 1);
                        self.create_slot(Some(k), self.opacity, stack_index, provider, backend)
                    }
                };

                // Only now that the new layer is visible does the old one go.
                if let Some(old) = old_current {
                    backend.remove(old.handle);
                }

                self.slots = match self.intervals.next_index(k, direction) {
                    Some(n) => {
                        let next = self.create_slot(Some(n), 0.0, None, provider, backend);
                        place_below(backend, next.handle, new_current.handle);
                        Slots::DoubleBuffered {
                            current: new_current,
                            next,
                        }
                    }
                    None => Slots::Single(new_current),
                };
                bus.emit(LAYER_CHANGED, format!("interval {k}"));
            }
        }
    }

    /// Classifies a failed tile reported by the renderer and tells it what
    /// to do with the tile. On a fatal classification the whole layer is
    /// hidden, one warning is emitted, and the item stays enabled so a
    /// manual re-show can retry from scratch.
    pub fn on_tile_error(
        &mut self,
        error: TileError,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) -> TileDisposition {
        // Errors for hidden or already-released layers are of no interest.
        if !self.enabled || !self.shown || !self.slots.handles().contains(&error.layer) {
            return TileDisposition::GiveUp;
        }

        let disposition = self.retries.classify(&self.policy, &error);
        if disposition == TileDisposition::FailLayer {
            self.shown = false;
            for handle in self.slots.handles() {
                backend.set_visible(handle, false);
            }
            bus.emit(
                WARNING,
                format!(
                    "tile {}/{}/{} keeps failing{}; layer hidden, re-show to retry",
                    error.level,
                    error.x,
                    error.y,
                    match error.status {
                        Some(status) => format!(" (HTTP {status})"),
                        None => String::new(),
                    }
                ),
            );
            bus.emit(LAYER_CHANGED, "hidden after tile failures");
        }
        disposition
    }

    /// Tears the bound layers down and rebuilds them in place, keeping the
    /// dataset's stacking position. Used when the coloring inputs changed
    /// (new active column, new data).
    pub fn refresh(
        &mut self,
        clock: &Clock,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
        bus: &mut EventBus,
    ) {
        if !self.enabled {
            return;
        }
        // The lowest of our own layers marks the dataset's slot in the
        // overall stack; everything is rebuilt from that index up.
        let anchor = self
            .slots
            .next()
            .or(self.slots.current())
            .and_then(|slot| backend.stack_position(slot.handle));
        let was_shown = self.shown;

        for handle in self.slots.take().handles() {
            backend.remove(handle);
        }
        self.enabled = false;
        self.shown = false;
        self.retries.clear();

        self.enable_at(anchor, clock, provider, backend);
        if was_shown {
            self.show(clock, provider, backend, bus);
        }
    }

    fn retarget_prefetch(
        &mut self,
        k: usize,
        direction: PlaybackDirection,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
    ) {
        let desired = self.intervals.next_index(k, direction);
        if self.slots.next().map(|n| n.interval) == desired.map(Some) {
            return;
        }
        match self.slots.take() {
            Slots::DoubleBuffered { current, next } => {
                backend.remove(next.handle);
                self.slots = self.build_prefetch(current, desired, provider, backend);
            }
            Slots::Single(current) => {
                self.slots = self.build_prefetch(current, desired, provider, backend);
            }
            other => self.slots = other,
        }
    }

    fn build_prefetch(
        &mut self,
        current: LayerSlot,
        desired: Option<usize>,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
    ) -> Slots {
        match desired {
            Some(n) => {
                let next = self.create_slot(Some(n), 0.0, None, provider, backend);
                place_below(backend, next.handle, current.handle);
                Slots::DoubleBuffered { current, next }
            }
            None => Slots::Single(current),
        }
    }

    fn create_slot(
        &mut self,
        interval: Option<usize>,
        opacity: f32,
        stack_index: Option<usize>,
        provider: &dyn TileSourceProvider,
        backend: &mut dyn RendererBackend,
    ) -> LayerSlot {
        let source = provider.tile_source(interval);
        let handle = backend.create_tile_layer(
            source,
            LayerOptions {
                opacity,
                clip_to_bounds: self.clip_to_bounds,
                stack_index,
            },
        );
        if self.shown {
            backend.set_visible(handle, true);
        }
        LayerSlot { handle, interval }
    }
}

/// Walks `below` down the stack until it sits under `above`. Prefetched
/// layers must never render above the current layer.
fn place_below(backend: &mut dyn RendererBackend, below: LayerHandle, above: LayerHandle) {
    let mut guard = 0;
    while let (Some(b), Some(a)) = (backend.stack_position(below), backend.stack_position(above)) {
        if b < a || guard > 1024 {
            break;
        }
        backend.lower(below);
        guard += 1;
    }
}

/// Raises `new` until it sits directly above `old`, so that removing `old`
/// leaves `new` in exactly the stacking position `old` had.
fn promote_into_place(backend: &mut dyn RendererBackend, new: LayerHandle, old: LayerHandle) {
    let mut guard = 0;
    while let (Some(n), Some(o)) = (backend.stack_position(new), backend.stack_position(old)) {
        if n > o || guard > 1024 {
            break;
        }
        backend.raise(new);
        guard += 1;
    }
}
