use crate::symbology::Rgba;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerHandle(pub u64);

/// Recipe for a raster tile layer: which boundary tiles to fetch and the
/// per-region colors to paint them with.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSource {
    pub server: String,
    pub layer_name: String,
    /// `region_colors[i]` colors the region with feature id `i`.
    pub region_colors: Vec<Rgba>,
    /// Index into the dataset's interval collection, or `None` for
    /// non-time-varying data.
    pub interval: Option<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerOptions {
    pub opacity: f32,
    /// Clip tile rendering to the region type's bounding box.
    pub clip_to_bounds: bool,
    /// Insert at this stacking position instead of on top.
    pub stack_index: Option<usize>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            clip_to_bounds: false,
            stack_index: None,
        }
    }
}

/// A failed tile fetch reported by the renderer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TileError {
    pub layer: LayerHandle,
    pub x: u32,
    pub y: u32,
    pub level: u32,
    /// HTTP status, or `None` for transport-level failures.
    pub status: Option<u16>,
}

/// The rendering seam. Two interchangeable renderers (a 3D globe and a 2D
/// map) implement this outside the engine; the scheduler never knows which
/// one it is driving.
///
/// Layers are created invisible; `set_visible` reveals them. Stacking
/// position 0 is the bottom; `raise`/`lower` swap a layer with its upper
/// or lower neighbour.
pub trait RendererBackend {
    fn create_tile_layer(&mut self, source: TileSource, options: LayerOptions) -> LayerHandle;
    fn set_visible(&mut self, layer: LayerHandle, visible: bool);
    fn set_opacity(&mut self, layer: LayerHandle, opacity: f32);
    fn remove(&mut self, layer: LayerHandle);
    fn raise(&mut self, layer: LayerHandle);
    fn lower(&mut self, layer: LayerHandle);
    fn stack_position(&self, layer: LayerHandle) -> Option<usize>;
    fn is_visible(&self, layer: LayerHandle) -> bool;
    fn opacity(&self, layer: LayerHandle) -> Option<f32>;
    /// Tile fetch failures accumulated since the last drain.
    fn drain_tile_errors(&mut self) -> Vec<TileError>;
}

/// In-memory backend keeping a real layer stack: the reference
/// implementation for tests and headless runs (no tiles are fetched).
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_handle: u64,
    /// Bottom to top.
    stack: Vec<RecordedLayer>,
    pending_errors: Vec<TileError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLayer {
    pub handle: LayerHandle,
    pub source: TileSource,
    pub opacity: f32,
    pub visible: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer_count(&self) -> usize {
        self.stack.len()
    }

    pub fn layers(&self) -> &[RecordedLayer] {
        &self.stack
    }

    pub fn layer(&self, handle: LayerHandle) -> Option<&RecordedLayer> {
        self.stack.iter().find(|l| l.handle == handle)
    }

    /// Handles of layers a viewer would actually composite (visible and
    /// not fully transparent), bottom to top.
    pub fn rendered_layers(&self) -> Vec<LayerHandle> {
        self.stack
            .iter()
            .filter(|l| l.visible && l.opacity > 0.0)
            .map(|l| l.handle)
            .collect()
    }

    /// Queues a tile failure as if the renderer had reported one.
    pub fn inject_tile_error(&mut self, error: TileError) {
        self.pending_errors.push(error);
    }

    fn position(&self, layer: LayerHandle) -> Option<usize> {
        self.stack.iter().position(|l| l.handle == layer)
    }
}

impl RendererBackend for RecordingBackend {
    fn create_tile_layer(&mut self, source: TileSource, options: LayerOptions) -> LayerHandle {
        self.next_handle += 1;
        let handle = LayerHandle(self.next_handle);
        let layer = RecordedLayer {
            handle,
            source,
            opacity: options.opacity,
            visible: false,
        };
        match options.stack_index {
            Some(index) if index <= self.stack.len() => self.stack.insert(index, layer),
            _ => self.stack.push(layer),
        }
        handle
    }

    fn set_visible(&mut self, layer: LayerHandle, visible: bool) {
        if let Some(pos) = self.position(layer) {
            self.stack[pos].visible = visible;
        }
    }

    fn set_opacity(&mut self, layer: LayerHandle, opacity: f32) {
        if let Some(pos) = self.position(layer) {
            self.stack[pos].opacity = opacity;
        }
    }

    fn remove(&mut self, layer: LayerHandle) {
        if let Some(pos) = self.position(layer) {
            self.stack.remove(pos);
        }
    }

    fn raise(&mut self, layer: LayerHandle) {
        if let Some(pos) = self.position(layer) {
            if pos + 1 < self.stack.len() {
                self.stack.swap(pos, pos + 1);
            }
        }
    }

    fn lower(&mut self, layer: LayerHandle) {
        if let Some(pos) = self.position(layer) {
            if pos > 0 {
                self.stack.swap(pos, pos - 1);
            }
        }
    }

    fn stack_position(&self, layer: LayerHandle) -> Option<usize> {
        self.position(layer)
    }

    fn is_visible(&self, layer: LayerHandle) -> bool {
        self.position(layer)
            .map(|pos| self.stack[pos].visible)
            .unwrap_or(false)
    }

    fn opacity(&self, layer: LayerHandle) -> Option<f32> {
        self.position(layer).map(|pos| self.stack[pos].opacity)
    }

    fn drain_tile_errors(&mut self) -> Vec<TileError> {
        std::mem::take(&mut self.pending_errors)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{LayerOptions, RecordingBackend, RendererBackend, TileSource};

    fn source() -> TileSource {
        TileSource {
            server: "https://tiles.example/poa".to_string(),
            layer_name: "POA".to_string(),
            region_colors: Vec::new(),
            interval: None,
        }
    }

    #[test]
    fn stack_order_and_raise_lower() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_tile_layer(source(), LayerOptions::default());
        let b = backend.create_tile_layer(source(), LayerOptions::default());
        let c = backend.create_tile_layer(source(), LayerOptions::default());
        assert_eq!(backend.stack_position(a), Some(0));
        assert_eq!(backend.stack_position(c), Some(2));

        backend.raise(a);
        assert_eq!(backend.stack_position(a), Some(1));
        assert_eq!(backend.stack_position(b), Some(0));

        backend.lower(c);
        assert_eq!(backend.stack_position(c), Some(1));
        assert_eq!(backend.stack_position(a), Some(2));

        // Ends of the stack are no-ops.
        backend.raise(a);
        backend.raise(a);
        assert_eq!(backend.stack_position(a), Some(2));
    }

    #[test]
    fn create_at_stack_index() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_tile_layer(source(), LayerOptions::default());
        let _b = backend.create_tile_layer(source(), LayerOptions::default());
        let c = backend.create_tile_layer(
            source(),
            LayerOptions {
                stack_index: Some(0),
                ..LayerOptions::default()
            },
        );
        assert_eq!(backend.stack_position(c), Some(0));
        assert_eq!(backend.stack_position(a), Some(1));
    }

    #[test]
    fn layers_start_invisible() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_tile_layer(source(), LayerOptions::default());
        assert!(!backend.is_visible(a));
        assert!(backend.rendered_layers().is_empty());
        backend.set_visible(a, true);
        assert_eq!(backend.rendered_layers(), vec![a]);
    }

    #[test]
    fn remove_forgets_the_layer() {
        let mut backend = RecordingBackend::new();
        let a = backend.create_tile_layer(source(), LayerOptions::default());
        backend.remove(a);
        assert_eq!(backend.stack_position(a), None);
        assert_eq!(backend.opacity(a), None);
        assert!(!backend.is_visible(a));
    }
}
