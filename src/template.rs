//! Templating pass: turns editor contents into a self-contained preview document.

use crate::query::TemplateParams;
use crate::Result;
use serde::Serialize;
use std::sync::OnceLock;

// Helper shipped with every preview so template scripts can decode the
// url-safe base64 values the server-side renderer accepts.
const DECODE_BASE64_URL_SAFE: &str = "window.decodeBase64UrlSafe = function (s) { \
s = s.replace(/-/g, '+').replace(/_/g, '/'); \
return decodeURIComponent(escape(atob(s))); };";

const DOCUMENT_SHELL: &str = "<html><head><style>{{{css}}}</style>\
<script>query = {{{query}}};{{{helpers}}}</script></head>\
<body style='margin:0;padding:0;overflow:hidden'>{{{html}}}</body></html>";

const IMAGE_SHELL: &str = "<html><head></head>\
<body style='margin:0;padding:0;overflow:hidden'>\
<img src=\"{{url}}\" style=\"display:block\" /></body></html>";

#[derive(Serialize)]
struct ShellContext<'a> {
    css: &'a str,
    html: &'a str,
    query: &'a str,
    helpers: &'a str,
}

fn document_shell() -> Result<&'static mustache::Template> {
    static SHELL: OnceLock<mustache::Template> = OnceLock::new();
    if let Some(t) = SHELL.get() {
        return Ok(t);
    }
    let compiled = mustache::compile_str(DOCUMENT_SHELL)?;
    Ok(SHELL.get_or_init(|| compiled))
}

/// Render a single template string against the preview parameters.
pub fn render_fragment(source: &str, params: &TemplateParams) -> Result<String> {
    let template = mustache::compile_str(source)?;
    Ok(template.render_to_string(&params.to_data())?)
}

/// Render HTML and CSS with the same data context and compose the preview
/// document. The parsed parameters are exposed to page scripts as `query`.
pub fn render_document(html: &str, css: &str, params: &TemplateParams) -> Result<String> {
    let css = render_fragment(css, params)?;
    let html = render_fragment(html, params)?;
    let query = serde_json::to_string(&params.to_json())
        .map_err(|e| crate::Error::Template(format!("failed to encode query: {}", e)))?;

    let ctx = ShellContext {
        css: &css,
        html: &html,
        query: &query,
        helpers: DECODE_BASE64_URL_SAFE,
    };
    Ok(document_shell()?.render_to_string(&ctx)?)
}

/// Document embedding a server-rendered image, used by rendered previews.
pub fn render_image_shell(url: &str) -> Result<String> {
    #[derive(Serialize)]
    struct ImageContext<'a> {
        url: &'a str,
    }
    let template = mustache::compile_str(IMAGE_SHELL)?;
    Ok(template.render_to_string(&ImageContext { url })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn renders_html_and_css_with_shared_data() {
        let params = TemplateParams::parse("/big", "?name=World&colour=red");
        let doc = render_document(
            "<p>Hello {{name}}</p>",
            "p { color: {{colour}}; }",
            &params,
        )
        .unwrap();

        assert!(doc.contains("<style>p { color: red; }</style>"));
        assert!(doc.contains("<p>Hello World</p>"));
        let start = doc.find("query = ").unwrap() + "query = ".len();
        let end = doc[start..].find(";window").unwrap() + start;
        let query: serde_json::Value = serde_json::from_str(&doc[start..end]).unwrap();
        assert_eq!(query, serde_json::json!({"colour": "red", "name": "World", "params": ["big"]}));
        assert!(doc.contains("window.decodeBase64UrlSafe"));
        assert!(doc.starts_with("<html><head>"));
    }

    #[test]
    fn template_values_are_escaped_by_the_engine() {
        let params = TemplateParams::parse("", "?name=%3Cb%3E");
        let out = render_fragment("{{name}}|{{{name}}}", &params).unwrap();
        assert_eq!(out, "&lt;b&gt;|<b>");
    }

    #[test]
    fn syntax_errors_surface_as_template_errors() {
        let params = TemplateParams::default();
        let err = render_document("{{#items}}<li>", "", &params).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn image_shell_embeds_url() {
        let doc = render_image_shell("/lib/r/a.png?w=1&h=2").unwrap();
        let parsed = scraper::Html::parse_document(&doc);
        let sel = scraper::Selector::parse("img").unwrap();
        let img = parsed.select(&sel).next().unwrap();
        assert_eq!(img.value().attr("src"), Some("/lib/r/a.png?w=1&h=2"));
        assert_eq!(img.value().attr("style"), Some("display:block"));
    }

    #[test]
    fn image_shell_escapes_quotes_in_url() {
        let url = "/lib/r.png?a=\"x\"&b=<'y'>";
        let doc = render_image_shell(url).unwrap();
        assert!(!doc.contains("\"x\""));
        let parsed = scraper::Html::parse_document(&doc);
        let sel = scraper::Selector::parse("img").unwrap();
        let imgs: Vec<_> = parsed.select(&sel).collect();
        assert_eq!(imgs.len(), 1);
        assert_eq!(imgs[0].value().attr("src"), Some(url));
    }
}
