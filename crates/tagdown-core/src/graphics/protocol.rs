//! Terminal graphics protocol detection
//!
//! Decided once, when the renderer is built, and never re-checked.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// Whether the terminal can display images inline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsSupport {
    /// Kitty graphics protocol
    Kitty,
    None,
}

impl GraphicsSupport {
    /// Detect from `$TERM`
    pub fn detect() -> Self {
        let term = std::env::var("TERM").ok();
        Self::from_term(term.as_deref())
    }

    /// Detect from an explicit terminal name
    pub fn from_term(term: Option<&str>) -> Self {
        match term {
            Some(term) if term.contains("kitty") => Self::Kitty,
            _ => Self::None,
        }
    }

    pub fn is_supported(self) -> bool {
        self != Self::None
    }
}

/// Kitty escape that displays the image file at `absolute_path`.
/// The payload is the base64 of the raw path bytes (`t=f`: file transmission).
pub fn kitty_display_file(absolute_path: &Path) -> String {
    let encoded = STANDARD.encode(absolute_path.as_os_str().as_encoded_bytes());
    format!("\x1b_Ga=T,t=f;{encoded}\x1b\\")
}
