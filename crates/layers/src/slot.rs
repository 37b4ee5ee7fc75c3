use crate::backend::LayerHandle;

/// One raster layer bound into the renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerSlot {
    pub handle: LayerHandle,
    /// Interval this layer's imagery is valid for; `None` for
    /// non-time-varying data.
    pub interval: Option<usize>,
}

/// The scheduler's slot state.
///
/// An explicit enum rather than two nullable fields: two `current` slots or
/// an orphaned `next` cannot be represented. `PrefetchOnly` is the state
/// where the clock sits outside every interval but the nearest upcoming
/// layer is already being fetched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Slots {
    #[default]
    Idle,
    Single(LayerSlot),
    PrefetchOnly {
        next: LayerSlot,
    },
    DoubleBuffered {
        current: LayerSlot,
        next: LayerSlot,
    },
}

impl Slots {
    pub fn current(&self) -> Option<&LayerSlot> {
        match self {
            Slots::Single(slot) => Some(slot),
            Slots::DoubleBuffered { current, .. } => Some(current),
            Slots::Idle | Slots::PrefetchOnly { .. } => None,
        }
    }

    pub fn next(&self) -> Option<&LayerSlot> {
        match self {
            Slots::PrefetchOnly { next } => Some(next),
            Slots::DoubleBuffered { next, .. } => Some(next),
            Slots::Idle | Slots::Single(_) => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Slots::Idle)
    }

    /// All bound handles, current first.
    pub fn handles(&self) -> Vec<LayerHandle> {
        let mut handles = Vec::with_capacity(2);
        if let Some(current) = self.current() {
            handles.push(current.handle);
        }
        if let Some(next) = self.next() {
            handles.push(next.handle);
        }
        handles
    }

    pub fn take(&mut self) -> Slots {
        std::mem::take(self)
    }
}
