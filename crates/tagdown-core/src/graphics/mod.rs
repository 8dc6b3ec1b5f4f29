//! Terminal graphics support for image rendering
//!
//! Capability detection, the on-disk image cache, deduplicated background
//! downloads, and the resolver that ties them together for the renderer.

mod cache;
mod downloads;
mod protocol;
mod resolver;

pub use cache::{cache_key, ImageCache};
pub use downloads::{DownloadRegistry, FetchError, HttpFetcher, ImageFetcher, InFlight};
pub use protocol::{kitty_display_file, GraphicsSupport};
pub use resolver::{ImageResolver, IMAGE_DOWNLOADING, IMAGE_ERROR};
