//! Preview frame controller: the live/rendered state machine and the render
//! pipeline feeding the preview frame.
//!
//! Every render replaces the frame with a blank one under a new generation,
//! yields one scheduling tick, writes the new document, and measures it when
//! the frame loads. A load that belongs to a replaced frame is ignored.

use crate::client::RendrClient;
use crate::query::TemplateParams;
use crate::rendering::frame::{self, Frame, FrameLoad, LoadSettings};
use crate::template;
use crate::{EditorConfig, Error, Result};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewMode {
    /// Templates rendered locally on every edit
    #[default]
    Live,
    /// Raster snapshot produced by the server-side renderer
    Rendered,
}

impl fmt::Display for PreviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewMode::Live => write!(f, "live"),
            PreviewMode::Rendered => write!(f, "rendered"),
        }
    }
}

/// Status line of the preview pane
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewStatus {
    pub width: u32,
    pub height: u32,
    /// Unknown for live renders
    pub filesize: Option<u64>,
    /// Seconds from render start to frame load
    pub rendertime: f64,
    /// Set when the preview is broken
    pub error: Option<String>,
    pub script_errors: Vec<String>,
}

/// Everything a render needs from the editors and the loaded rendr
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub html: &'a str,
    pub css: &'a str,
    pub path: &'a str,
    pub query: &'a str,
    /// `(libraryId, rendrId)` of the loaded rendr
    pub document: Option<(&'a str, &'a str)>,
}

#[derive(Debug)]
enum RenderJob {
    Document(String),
    Image { url: String, shell: String },
    Failed(Error),
}

/// A render that has replaced the frame and awaits its load
#[derive(Debug)]
pub struct PendingRender {
    generation: u64,
    started: Instant,
    job: RenderJob,
}

impl PendingRender {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The document to write into the frame, if the render produced one.
    pub fn document(&self) -> Option<&str> {
        match &self.job {
            RenderJob::Document(doc) => Some(doc),
            RenderJob::Image { shell, .. } => Some(shell),
            RenderJob::Failed(_) => None,
        }
    }
}

/// Server-side renderer URL for a rendr. The `/` before the path and the `?`
/// before the query only appear when those parts are non-empty.
pub fn rendered_url(library_id: &str, rendr_id: &str, path: &str, query: &str, format: &str) -> String {
    let path = path.trim_start_matches('/');
    let query = query.trim_start_matches('?');
    let mut url = format!("/{}/{}", library_id, rendr_id);
    if !path.is_empty() {
        url.push('/');
        url.push_str(path);
    }
    url.push('.');
    url.push_str(format);
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

pub struct PreviewController {
    mode: PreviewMode,
    status: PreviewStatus,
    frame: Frame,
    generation: u64,
    settings: LoadSettings,
    format: String,
    last_load: Option<FrameLoad>,
}

impl PreviewController {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            mode: PreviewMode::Live,
            status: PreviewStatus::default(),
            frame: Frame::blank(0),
            generation: 0,
            settings: LoadSettings::from(config),
            format: config.preview_format.clone(),
            last_load: None,
        }
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn status(&self) -> &PreviewStatus {
        &self.status
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn last_load(&self) -> Option<&FrameLoad> {
        self.last_load.as_ref()
    }

    /// Switch to live preview. Only acts when the mode is exactly `Rendered`.
    pub fn set_live(&mut self) -> bool {
        if self.mode == PreviewMode::Rendered {
            self.mode = PreviewMode::Live;
            true
        } else {
            false
        }
    }

    /// Switch to rendered preview. Only acts when the mode is exactly `Live`
    /// and a persisted rendr exists.
    pub fn set_rendered(&mut self, has_document: bool) -> bool {
        if self.mode == PreviewMode::Live && has_document {
            self.mode = PreviewMode::Rendered;
            true
        } else {
            false
        }
    }

    /// Replace the frame and prepare the document for the current mode.
    pub fn begin(&mut self, request: RenderRequest<'_>) -> PendingRender {
        let started = Instant::now();
        self.generation += 1;
        self.frame = Frame::blank(self.generation);

        let job = match self.mode {
            PreviewMode::Live => {
                let params = TemplateParams::parse(request.path, request.query);
                match template::render_document(request.html, request.css, &params) {
                    Ok(doc) => RenderJob::Document(doc),
                    Err(e) => RenderJob::Failed(e),
                }
            }
            PreviewMode::Rendered => match request.document {
                Some((library_id, rendr_id)) => {
                    let url = rendered_url(library_id, rendr_id, request.path, request.query, &self.format);
                    match template::render_image_shell(&url) {
                        Ok(shell) => RenderJob::Image { url, shell },
                        Err(e) => RenderJob::Failed(e),
                    }
                }
                None => RenderJob::Failed(Error::NoDocument),
            },
        };

        PendingRender {
            generation: self.generation,
            started,
            job,
        }
    }

    /// Apply a frame load. Loads for replaced frames are dropped and `false`
    /// is returned.
    pub fn complete(&mut self, pending: &PendingRender, load: Result<FrameLoad>) -> bool {
        if pending.generation != self.frame.generation() {
            log::debug!(
                "dropping load for replaced frame {} (current {})",
                pending.generation,
                self.frame.generation()
            );
            return false;
        }

        let rendertime = pending.started.elapsed().as_secs_f64();
        match load {
            Ok(load) => {
                self.frame.resize_to_fit(load.width, load.height);
                self.status = PreviewStatus {
                    width: load.width,
                    height: load.height,
                    filesize: load.filesize,
                    rendertime,
                    error: None,
                    script_errors: load.script_errors.clone(),
                };
                self.last_load = Some(load);
            }
            Err(e) => {
                log::warn!("preview render failed: {}", e);
                self.frame.resize_to_fit(0, 0);
                self.status = PreviewStatus {
                    rendertime,
                    error: Some(e.to_string()),
                    ..Default::default()
                };
                self.last_load = None;
            }
        }
        true
    }

    /// Run a complete render for the current mode. Rendered previews fetch
    /// their image through `client`.
    pub async fn render(
        &mut self,
        request: RenderRequest<'_>,
        client: Option<&RendrClient>,
    ) -> PreviewStatus {
        let mut pending = self.begin(request);

        // the new frame exposes a writable document one tick after insertion
        tokio::task::yield_now().await;

        let generation = pending.generation;
        let job = std::mem::replace(&mut pending.job, RenderJob::Failed(Error::NoDocument));
        let load = match job {
            RenderJob::Document(doc) => {
                self.frame.write(doc.clone());
                let settings = self.settings.clone();
                match tokio::task::spawn_blocking(move || {
                    frame::load_document(generation, &doc, &settings)
                })
                .await
                {
                    Ok(load) => load,
                    Err(e) => Err(Error::Render(format!("frame load task failed: {}", e))),
                }
            }
            RenderJob::Image { url, shell } => {
                self.frame.write(shell);
                match client {
                    Some(client) => match client.fetch_image(&url).await {
                        Ok(bytes) => frame::load_image(generation, &bytes),
                        Err(e) => Err(e),
                    },
                    None => Err(Error::Config("rendered previews need an API client".into())),
                }
            }
            RenderJob::Failed(e) => Err(e),
        };

        self.complete(&pending, load);
        self.status.clone()
    }
}
