//! Editor bridge: the HTML and CSS buffers, dirty tracking, and pane splitters.
//!
//! Text editing itself belongs to whatever widget the front end uses. This
//! module only holds the current contents, whether a buffer accepts edits,
//! and digests of the last-saved rendr to decide if the editors are dirty.

use crate::client::Document;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Html,
    Css,
}

/// One code-editing buffer. Buffers start read-only until content is loaded.
#[derive(Debug, Clone)]
pub struct EditorBuffer {
    mode: EditorMode,
    content: String,
    read_only: bool,
}

impl EditorBuffer {
    pub fn new(mode: EditorMode) -> Self {
        Self {
            mode,
            content: String::new(),
            read_only: true,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Push externally loaded content and make the buffer editable.
    pub fn load(&mut self, content: &str) {
        self.content = content.to_string();
        self.read_only = false;
    }

    /// Apply a user edit (the full new contents).
    pub fn edit(&mut self, content: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly);
        }
        self.content = content.to_string();
        Ok(())
    }
}

fn digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Digests of the HTML and CSS as last saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    html: String,
    css: String,
}

impl SavedSnapshot {
    pub fn of(html: &str, css: &str) -> Self {
        Self {
            html: digest(html),
            css: digest(css),
        }
    }

    pub fn matches(&self, html: &str, css: &str) -> bool {
        self.html == digest(html) && self.css == digest(css)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    /// Editors match the saved rendr
    Clean,
    /// Editors diverge from the saved rendr
    Dirty,
    /// Nothing has been loaded to compare against
    Untracked,
}

type ResizeHook = Arc<dyn Fn(EditorMode) + Send + Sync>;

/// The pair of editors and their relation to the saved rendr.
pub struct EditorBridge {
    html: EditorBuffer,
    css: EditorBuffer,
    snapshot: Option<SavedSnapshot>,
    state: ChangeState,
    resize_hooks: Vec<ResizeHook>,
}

impl Default for EditorBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorBridge {
    pub fn new() -> Self {
        Self {
            html: EditorBuffer::new(EditorMode::Html),
            css: EditorBuffer::new(EditorMode::Css),
            snapshot: None,
            state: ChangeState::Untracked,
            resize_hooks: Vec::new(),
        }
    }

    pub fn html(&self) -> &EditorBuffer {
        &self.html
    }

    pub fn css(&self) -> &EditorBuffer {
        &self.css
    }

    pub fn buffer_mut(&mut self, mode: EditorMode) -> &mut EditorBuffer {
        match mode {
            EditorMode::Html => &mut self.html,
            EditorMode::Css => &mut self.css,
        }
    }

    /// Load a saved rendr into both editors and remember it as clean.
    pub fn sync(&mut self, doc: &Document) {
        self.html.load(&doc.body);
        self.css.load(&doc.css);
        self.snapshot = Some(SavedSnapshot::of(&doc.body, &doc.css));
        self.state = ChangeState::Clean;
    }

    /// Compare the editors to the saved rendr and record the result.
    pub fn check(&mut self) -> ChangeState {
        self.state = match &self.snapshot {
            None => ChangeState::Untracked,
            Some(s) if s.matches(self.html.content(), self.css.content()) => ChangeState::Clean,
            Some(_) => ChangeState::Dirty,
        };
        self.state
    }

    pub fn state(&self) -> ChangeState {
        self.state
    }

    pub fn has_unsaved_changes(&self) -> bool {
        match &self.snapshot {
            None => false,
            Some(s) => !s.matches(self.html.content(), self.css.content()),
        }
    }

    /// Register a callback run for each editor when a splitter is dragged.
    pub fn on_resize<F>(&mut self, hook: F)
    where
        F: Fn(EditorMode) + Send + Sync + 'static,
    {
        self.resize_hooks.push(Arc::new(hook));
    }

    /// Splitter drag handler: ask both editors to re-measure.
    pub fn resize(&self) {
        for hook in &self.resize_hooks {
            hook(EditorMode::Css);
            hook(EditorMode::Html);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A draggable divider between two panes.
#[derive(Debug, Clone, PartialEq)]
pub struct Splitter {
    pub orientation: Orientation,
    /// Minimum pane size in pixels on either side
    pub limit: u32,
    /// Divider position as a percentage of the container
    pub position: f64,
}

impl Splitter {
    /// The splitter between the CSS and HTML editors.
    pub fn editors() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            limit: 20,
            position: 50.0,
        }
    }

    /// The splitter between the editors and the preview pane.
    pub fn content() -> Self {
        Self {
            orientation: Orientation::Vertical,
            limit: 20,
            position: 38.0,
        }
    }

    /// Divider offset in pixels for a container of `extent` pixels.
    pub fn offset(&self, extent: u32) -> u32 {
        (extent as f64 * self.position / 100.0).round() as u32
    }

    /// Move the divider to `offset` pixels, clamped so neither pane shrinks
    /// below the limit, then notify the editors.
    pub fn drag_to(&mut self, offset: u32, extent: u32, editors: &EditorBridge) {
        if extent == 0 {
            return;
        }
        let max = extent.saturating_sub(self.limit).max(self.limit);
        let clamped = offset.clamp(self.limit.min(max), max);
        self.position = clamped as f64 * 100.0 / extent as f64;
        editors.resize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn doc(body: &str, css: &str) -> Document {
        Document {
            body: body.into(),
            css: css.into(),
            ..Default::default()
        }
    }

    #[test]
    fn buffers_start_read_only() {
        let mut buf = EditorBuffer::new(EditorMode::Html);
        assert!(buf.is_read_only());
        assert!(matches!(buf.edit("x"), Err(Error::ReadOnly)));
        buf.load("<p/>");
        assert!(!buf.is_read_only());
        buf.edit("<div/>").unwrap();
        assert_eq!(buf.content(), "<div/>");
    }

    #[test]
    fn edits_away_and_back_toggle_dirty() {
        let mut bridge = EditorBridge::new();
        assert_eq!(bridge.check(), ChangeState::Untracked);

        bridge.sync(&doc("<p>a</p>", "p{}"));
        assert_eq!(bridge.check(), ChangeState::Clean);

        bridge.buffer_mut(EditorMode::Html).edit("<p>b</p>").unwrap();
        assert_eq!(bridge.check(), ChangeState::Dirty);
        assert!(bridge.has_unsaved_changes());

        bridge.buffer_mut(EditorMode::Html).edit("<p>a</p>").unwrap();
        assert_eq!(bridge.check(), ChangeState::Clean);
        assert!(!bridge.has_unsaved_changes());
    }

    #[test]
    fn trailing_whitespace_counts_as_a_change() {
        let mut bridge = EditorBridge::new();
        bridge.sync(&doc("x", "y"));
        bridge.buffer_mut(EditorMode::Css).edit("y ").unwrap();
        assert_eq!(bridge.check(), ChangeState::Dirty);
    }

    #[test]
    fn splitter_drag_clamps_and_resizes_editors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut bridge = EditorBridge::new();
        let c = calls.clone();
        bridge.on_resize(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let mut split = Splitter::content();
        assert_eq!(split.offset(1000), 380);
        split.drag_to(5, 1000, &bridge);
        assert_eq!(split.offset(1000), 20);
        split.drag_to(999, 1000, &bridge);
        assert_eq!(split.offset(1000), 980);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
