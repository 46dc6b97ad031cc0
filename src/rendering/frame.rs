//! The preview frame: an isolated surface a rendered document is written into.
//!
//! A frame is never reused. Each render replaces the previous frame with a
//! blank one under a new generation number, so a load that finishes for a
//! replaced frame can be recognized and dropped.

use crate::rendering::layout::layout_document;
use crate::{Result, Viewport};
use scraper::{Html, Selector};
use std::io::Cursor;

#[cfg(feature = "scripting")]
pub use crate::rendering::sandbox::ScriptLimits;

/// Frame size and the offsets that center it inside the preview pane
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub margin_left: i64,
    pub margin_top: i64,
}

impl FrameGeometry {
    /// Size a frame to its content and center it with negative margins.
    pub fn fit(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            margin_left: -((width as f64 / 2.0).round() as i64),
            margin_top: -((height as f64 / 2.0).round() as i64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    generation: u64,
    document: Option<String>,
    geometry: FrameGeometry,
}

impl Frame {
    /// A freshly inserted frame: zero-sized and without a document.
    pub fn blank(generation: u64) -> Self {
        Self {
            generation,
            document: None,
            geometry: FrameGeometry::default(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn write(&mut self, document: String) {
        self.document = Some(document);
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn resize_to_fit(&mut self, width: u32, height: u32) {
        self.geometry = FrameGeometry::fit(width, height);
    }
}

/// Settings a frame load runs under
#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub viewport: Viewport,
    pub enable_scripts: bool,
    #[cfg(feature = "scripting")]
    pub limits: ScriptLimits,
}

impl From<&crate::EditorConfig> for LoadSettings {
    fn from(config: &crate::EditorConfig) -> Self {
        Self {
            viewport: config.viewport,
            enable_scripts: config.enable_scripts,
            #[cfg(feature = "scripting")]
            limits: ScriptLimits {
                timeout_ms: config.script_timeout_ms,
                loop_iteration_limit: config.script_loop_iteration_limit,
                recursion_limit: config.script_recursion_limit,
            },
        }
    }
}

/// Result of a frame's load event
#[derive(Debug, Clone, Default)]
pub struct FrameLoad {
    pub generation: u64,
    pub width: u32,
    pub height: u32,
    /// Byte size of the loaded resource, when one was fetched
    pub filesize: Option<u64>,
    pub script_errors: Vec<String>,
    /// The `query` global as the page's scripts saw it
    pub query: Option<serde_json::Value>,
}

fn inline_scripts(document: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("script") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter(|s| s.value().attr("src").is_none())
        .map(|s| s.text().collect::<String>())
        .filter(|code| !code.trim().is_empty())
        .collect()
}

/// Load a written document: run its inline scripts in the sandbox and
/// measure the laid-out `<html>` box.
pub fn load_document(generation: u64, document: &str, settings: &LoadSettings) -> Result<FrameLoad> {
    let parsed = Html::parse_document(document);
    let mut load = FrameLoad {
        generation,
        ..Default::default()
    };

    if settings.enable_scripts {
        let scripts = inline_scripts(&parsed);
        #[cfg(feature = "scripting")]
        {
            match crate::rendering::sandbox::run_scripts(scripts, settings.limits) {
                Ok(outcome) => {
                    load.script_errors = outcome.errors;
                    load.query = outcome.query;
                }
                Err(e) => {
                    log::warn!("preview scripts did not finish: {}", e);
                    load.script_errors.push(e.to_string());
                }
            }
        }
        #[cfg(not(feature = "scripting"))]
        {
            if !scripts.is_empty() {
                log::debug!("scripting disabled at build time; skipping {} scripts", scripts.len());
            }
        }
    }

    let root = layout_document(&parsed, settings.viewport);
    load.width = root.outer_width();
    load.height = root.outer_height();
    Ok(load)
}

/// Load a fetched image and take its intrinsic dimensions.
pub fn load_image(generation: u64, bytes: &[u8]) -> Result<FrameLoad> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| crate::Error::Render(format!("unreadable image: {}", e)))?
        .into_dimensions()
        .map_err(|e| crate::Error::Render(format!("unreadable image: {}", e)))?;
    Ok(FrameLoad {
        generation,
        width,
        height,
        filesize: Some(bytes.len() as u64),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LoadSettings {
        LoadSettings::from(&crate::EditorConfig::default())
    }

    #[test]
    fn geometry_centers_frame() {
        let g = FrameGeometry::fit(301, 100);
        assert_eq!(g.margin_left, -151);
        assert_eq!(g.margin_top, -50);
    }

    #[test]
    fn blank_frames_are_zero_sized() {
        let f = Frame::blank(3);
        assert_eq!(f.generation(), 3);
        assert_eq!(f.geometry(), FrameGeometry::default());
        assert!(f.document().is_none());
    }

    #[test]
    fn load_measures_document() {
        let doc = "<html><head><style>.b{width:64px;height:32px}</style></head>\
                   <body style='margin:0;padding:0;overflow:hidden'><div class='b'></div></body></html>";
        let load = load_document(7, doc, &settings()).unwrap();
        assert_eq!(load.generation, 7);
        assert_eq!((load.width, load.height), (64, 32));
        assert_eq!(load.filesize, None);
    }

    #[cfg(feature = "scripting")]
    #[test]
    fn load_runs_inline_scripts() {
        let doc = "<html><head><script>query = {\"a\": \"1\"};</script></head>\
                   <body><script>query.seen = query.a + '!';</script></body></html>";
        let load = load_document(1, doc, &settings()).unwrap();
        assert!(load.script_errors.is_empty());
        assert_eq!(load.query, Some(serde_json::json!({"a": "1", "seen": "1!"})));
    }

    #[cfg(feature = "scripting")]
    #[test]
    fn shell_helper_decodes_url_safe_base64() {
        use crate::query::TemplateParams;

        // "hi?>" encodes to "aGk/Pg" in the url-safe alphabet without padding
        let params = TemplateParams::parse("", "?n=aGk_Pg&m=w6k");
        let doc = crate::template::render_document(
            "<script>query.out = window.decodeBase64UrlSafe(query.n);\
             query.utf8 = decodeBase64UrlSafe(query.m);</script>",
            "",
            &params,
        )
        .unwrap();
        let load = load_document(1, &doc, &settings()).unwrap();
        assert!(load.script_errors.is_empty(), "{:?}", load.script_errors);
        let query = load.query.unwrap();
        assert_eq!(query["out"], "hi?>");
        assert_eq!(query["utf8"], "é");
    }

    #[test]
    fn load_image_reads_png_dimensions() {
        let img = image::RgbaImage::new(12, 7);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let load = load_image(2, &bytes).unwrap();
        assert_eq!((load.width, load.height), (12, 7));
        assert_eq!(load.filesize, Some(bytes.len() as u64));
    }

    #[test]
    fn load_image_rejects_garbage() {
        assert!(load_image(1, b"not an image").is_err());
    }
}
