//! Registry configuration

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames that may wait in one viewer's queue before new frames are
    /// dropped for that viewer. Control messages are never dropped. Zero is
    /// treated as one.
    pub viewer_queue_frames: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_queue_frames: 8,
        }
    }
}

impl RegistryConfig {
    /// Set the per-viewer frame queue depth (at least 1)
    pub fn viewer_queue_frames(mut self, frames: usize) -> Self {
        self.viewer_queue_frames = frames.max(1);
        self
    }
}
