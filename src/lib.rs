//! rendr.it editor core
//!
//! A headless implementation of the rendr.it HTML/CSS template editor: two
//! code buffers, a live preview rendered through Mustache into an isolated
//! frame and measured, library and rendr persistence against the rendr.it
//! API, and locally stored display options.
//!
//! # Features
//!
//! - **Live preview**: templates render against a simulated request path and
//!   query string; the frame reports width, height, and render time
//! - **Rendered preview**: the server-side raster of a saved rendr
//! - **Script sandbox** (`scripting`, default): inline preview scripts run in
//!   a fresh Boa context per render, bounded by loop, recursion, and time limits
//!
//! # Example
//!
//! ```no_run
//! use rendrit::{App, EditorConfig};
//! use rendrit::options::{MemoryStorage, OptionsStore};
//!
//! # async fn run() -> rendrit::Result<()> {
//! let config = EditorConfig {
//!     base_url: "http://localhost:8888".to_string(),
//!     ..Default::default()
//! };
//! let options = OptionsStore::new(Box::new(MemoryStorage::new()));
//! let mut app = App::new(config, options)?;
//! app.load_library("abcdefghij", "klmnopqrstuvwxyz").await?;
//! app.load_rendr("rendr1").await?;
//! println!("{:?}", app.preview().status());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod app;
pub mod client;
pub mod debounce;
pub mod editor;
pub mod options;
pub mod preview;
pub mod query;
pub mod rendering;
pub mod template;

pub use app::{App, AppEvent, ContentSource, Modal};
pub use client::{Document, Library, RendrClient};
pub use preview::{PreviewMode, PreviewStatus};

/// Configuration for the editor core
///
/// The defaults target a rendr.it server on localhost and keep preview
/// scripts on a short leash.
///
/// # Examples
///
/// ```
/// let cfg = rendrit::EditorConfig::default();
/// assert_eq!(cfg.debounce_ms, 250);
/// ```
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Root URL of the rendr.it API and renderer
    pub base_url: String,
    /// User agent string to send with requests
    pub user_agent: String,
    /// Timeout for API requests in milliseconds
    pub timeout_ms: u64,
    /// Size of the preview pane; text wraps at its width
    pub viewport: Viewport,
    /// Quiet period before an edit triggers a re-render
    pub debounce_ms: u64,
    /// Whether inline preview scripts run at all
    pub enable_scripts: bool,
    /// Time limit for the scripts of one preview load
    pub script_timeout_ms: u64,
    /// Maximum loop iterations before Boa throws an error (0 => disabled)
    pub script_loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub script_recursion_limit: usize,
    /// Image format requested from the server-side renderer
    pub preview_format: String,
    /// Where options are stored; `None` uses the platform config directory
    pub storage_path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_string(),
            user_agent: concat!("rendrit/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 30000,
            viewport: Viewport::default(),
            debounce_ms: 250,
            enable_scripts: true,
            script_timeout_ms: 2000,
            script_loop_iteration_limit: 1_000_000,
            script_recursion_limit: 512,
            preview_format: "png".to_string(),
            storage_path: None,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
