use crate::Color;

/// Construction options for a [`Renderer`](crate::Renderer).
///
/// ```
/// use strata::{Color, RendererConfig};
///
/// let config = RendererConfig::default()
///     .with_bucket_chunk_size(32)
///     .with_clear_color(Color::BLACK);
/// assert_eq!(config.bucket_chunk_size, 32);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Number of bucket blocks added every time the bucket pool grows.
    pub bucket_chunk_size: usize,
    /// Chunks allocated up front.
    pub initial_bucket_chunks: usize,
    /// Vertex capacity reserved in a freshly created bucket block.
    pub bucket_vertex_capacity: usize,
    /// Color each scene target is cleared to before drawing.
    pub clear_color: Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            bucket_chunk_size: 16,
            initial_bucket_chunks: 1,
            bucket_vertex_capacity: 256,
            clear_color: Color::TRANSPARENT,
        }
    }
}

impl RendererConfig {
    pub fn with_bucket_chunk_size(mut self, chunk_size: usize) -> Self {
        self.bucket_chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_initial_bucket_chunks(mut self, chunks: usize) -> Self {
        self.initial_bucket_chunks = chunks;
        self
    }

    pub fn with_bucket_vertex_capacity(mut self, capacity: usize) -> Self {
        self.bucket_vertex_capacity = capacity;
        self
    }

    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }
}
