//! Display engine: images, collections, sequences and texture streaming
//!
//! Everything here is independent of the UI. The only GPU-facing module is
//! `gl_texture`; the rest talks to textures through `texture::TextureTarget`.

pub mod cache;
pub mod cache_man;
pub mod collection;
pub mod colormap;
pub mod decode;
pub mod gl_texture;
pub mod image;
pub mod player;
pub mod rect;
pub mod sequence;
pub mod session;
pub mod texture;
pub mod view;
pub mod watch;

// Re-exports for convenience
pub use cache::{CacheStats, ImageCache};
pub use cache_man::CacheManager;
pub use collection::ImageCollection;
pub use image::{Image, ImageError, ImageHandle};
pub use player::Player;
pub use sequence::{EditProgram, FrameState, Sequence};
pub use session::{Session, Window};
pub use texture::{TextureRegion, TextureTarget};
