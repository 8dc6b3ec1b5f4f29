//! tagdown core library
//!
//! Renders chat-flavoured markdown into text carrying bracket style tags for a
//! terminal text widget. Images are shown inline through the kitty graphics
//! protocol when the terminal supports it, from a content-addressed disk cache
//! filled by deduplicated background downloads.
//!
//! ```no_run
//! use tagdown_core::{config::Config, markdown, Renderer};
//!
//! let config = Config::default();
//! let source = "**hello** <https://example.com>";
//! let doc = markdown::parse(source, &config.mentions);
//! let mut renderer = Renderer::from_config(&config);
//! let text = renderer.render_to_string(source, &doc).unwrap();
//! ```

pub mod config;
pub mod graphics;
pub mod markdown;

pub use config::{Config, StyleConfig, Theme};
pub use markdown::{RenderError, Renderer};
