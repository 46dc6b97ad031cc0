/// Block layout estimation used to measure preview documents.
///
/// This is not a CSS engine. It stacks block boxes vertically, shrink-wraps
/// them to their content, wraps inline text at a fixed advance per character
/// and honors a handful of properties (`display:none`, `width`, `height`,
/// `margin`, `padding`, `border-width`, `font-size`) from `<style>` rules and
/// inline `style` attributes. Lengths are `px`, `em`, or a bare `0`.

use crate::Viewport;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const DEFAULT_FONT_SIZE: u32 = 16;

// Elements that never produce boxes
const SKIPPED: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript",
];

// Elements whose text flows into the parent's inline run
const INLINE: &[&str] = &[
    "a", "abbr", "b", "cite", "code", "em", "i", "kbd", "label", "mark", "q", "s", "small",
    "span", "strong", "sub", "sup", "time", "u", "var",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    /// Vertical and horizontal margin
    pub margin: (u32, u32),
    pub border: u32,
    pub padding: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    /// Border box of the element
    pub rect: Rect,
    pub box_model: BoxModel,
}

// All box sums saturate: authored lengths go up to u32::MAX.
fn edge_total(border: u32, padding: u32) -> u32 {
    border.saturating_add(padding).saturating_mul(2)
}

impl LayoutBox {
    pub fn content_width(&self) -> u32 {
        let total = edge_total(self.box_model.border, self.box_model.padding);
        self.rect.width.saturating_sub(total)
    }

    pub fn content_height(&self) -> u32 {
        let total = edge_total(self.box_model.border, self.box_model.padding);
        self.rect.height.saturating_sub(total)
    }

    /// Width including horizontal margins
    pub fn outer_width(&self) -> u32 {
        self.rect.width.saturating_add(self.box_model.margin.1.saturating_mul(2))
    }

    /// Height including vertical margins
    pub fn outer_height(&self) -> u32 {
        self.rect.height.saturating_add(self.box_model.margin.0.saturating_mul(2))
    }
}

struct Rule {
    selector: Selector,
    declarations: Vec<(String, String)>,
}

/// The `<style>` rules of a document that the estimator understands.
#[derive(Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    /// Parse flat `selector { prop: value; }` rules. At-rules (with their
    /// whole block) and selectors the matcher rejects are skipped.
    pub fn parse(css: &str) -> Self {
        let mut sheet = Self::default();
        let css = strip_comments(css);

        let mut depth = 0usize;
        let mut prelude = String::new();
        let mut body = String::new();
        let mut nested = false;
        for c in css.chars() {
            match c {
                '{' => {
                    if depth > 0 {
                        nested = true;
                        body.push(c);
                    }
                    depth += 1;
                }
                '}' if depth == 0 => {}
                '}' => {
                    depth -= 1;
                    if depth > 0 {
                        body.push(c);
                        continue;
                    }
                    if !nested {
                        sheet.push_rule(&prelude, &body);
                    }
                    prelude.clear();
                    body.clear();
                    nested = false;
                }
                _ if depth == 0 => prelude.push(c),
                _ => body.push(c),
            }
        }
        sheet
    }

    fn push_rule(&mut self, prelude: &str, body: &str) {
        // statement at-rules such as `@import ...;` end at the semicolon
        let selector = prelude.rsplit(';').next().unwrap_or_default().trim();
        if selector.is_empty() || selector.starts_with('@') {
            return;
        }
        let Ok(parsed) = Selector::parse(selector) else {
            log::debug!("skipping unsupported selector {:?}", selector);
            return;
        };
        self.rules.push(Rule {
            selector: parsed,
            declarations: parse_declarations(body),
        });
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn extend(&mut self, other: Stylesheet) {
        self.rules.extend(other.rules);
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_declarations(body: &str) -> Vec<(String, String)> {
    body.split(';')
        .filter_map(|decl| {
            let (prop, value) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let value = value.trim().trim_end_matches("!important").trim().to_string();
            (!prop.is_empty()).then_some((prop, value))
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Style {
    hidden: bool,
    width: Option<u32>,
    height: Option<u32>,
    margin: (u32, u32),
    padding: u32,
    border: u32,
    font_size: u32,
}

impl Style {
    fn initial(tag: &str, font_size: u32) -> Self {
        let (margin, font_size) = match tag {
            "body" => ((8, 8), font_size),
            "p" | "ul" | "ol" | "blockquote" => ((font_size, 0), font_size),
            "h1" => ((21, 0), 32),
            "h2" => ((20, 0), 24),
            "h3" => ((19, 0), 19),
            _ => ((0, 0), font_size),
        };
        Self {
            hidden: false,
            width: None,
            height: None,
            margin,
            padding: 0,
            border: 0,
            font_size,
        }
    }

    fn compute(el: ElementRef, sheet: &Stylesheet, inherited_font: u32) -> Self {
        let mut style = Style::initial(el.value().name(), inherited_font);
        for rule in &sheet.rules {
            if rule.selector.matches(&el) {
                style.apply(&rule.declarations);
            }
        }
        if let Some(inline) = el.value().attr("style") {
            style.apply(&parse_declarations(inline));
        }
        if el.value().name() == "img" {
            style.width = style.width.or_else(|| attr_px(el, "width"));
            style.height = style.height.or_else(|| attr_px(el, "height"));
        }
        style
    }

    fn apply(&mut self, declarations: &[(String, String)]) {
        // font-size first so em lengths in the same block resolve against it
        for (prop, value) in declarations {
            if prop == "font-size" {
                if let Some(px) = parse_length(value, self.font_size) {
                    self.font_size = px;
                }
            }
        }
        for (prop, value) in declarations {
            let em = self.font_size;
            match prop.as_str() {
                "display" => self.hidden = value.eq_ignore_ascii_case("none"),
                "width" => self.width = parse_length(value, em),
                "height" => self.height = parse_length(value, em),
                "margin" => {
                    let parts: Vec<u32> = value
                        .split_whitespace()
                        .map(|v| parse_length(v, em).unwrap_or(0))
                        .collect();
                    self.margin = match parts.as_slice() {
                        [] => self.margin,
                        [all] => (*all, *all),
                        [v, h, ..] => (*v, *h),
                    };
                }
                "padding" => {
                    if let Some(first) = value.split_whitespace().next() {
                        self.padding = parse_length(first, em).unwrap_or(0);
                    }
                }
                "border-width" => self.border = parse_length(value, em).unwrap_or(0),
                "border" => {
                    self.border = value
                        .split_whitespace()
                        .find_map(|v| parse_length(v, em))
                        .unwrap_or(self.border);
                }
                _ => {}
            }
        }
    }
}

fn attr_px(el: ElementRef, name: &str) -> Option<u32> {
    el.value().attr(name).and_then(|v| v.trim().parse().ok())
}

/// Parse `12px`, `1.5em`, or `0` into whole pixels.
pub fn parse_length(value: &str, font_size: u32) -> Option<u32> {
    let value = value.trim();
    if value == "0" {
        return Some(0);
    }
    let (number, scale) = if let Some(n) = value.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("em") {
        (n, font_size as f64)
    } else {
        return None;
    };
    let n: f64 = number.trim().parse().ok()?;
    (n >= 0.0).then(|| (n * scale).round() as u32)
}

#[derive(Default)]
struct InlineRun {
    lines: Vec<String>,
    current: String,
}

impl InlineRun {
    fn push_text(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
    }

    /// Wrap the collected text and return its (width, height), clearing the run.
    fn flush(&mut self, available: u32, font_size: u32) -> (u32, u32) {
        self.line_break();
        let char_w = (font_size / 2).max(1);
        let line_h = font_size.saturating_add(4);
        let chars_per_line = ((available / char_w) as usize).max(1);

        let mut wrapped: Vec<String> = Vec::new();
        for line in self.lines.drain(..) {
            let mut cur = String::new();
            for word in line.split_whitespace() {
                let len = cur.chars().count();
                if len + word.chars().count() + 1 > chars_per_line && !cur.is_empty() {
                    wrapped.push(std::mem::take(&mut cur));
                    cur.push_str(word);
                } else {
                    if !cur.is_empty() {
                        cur.push(' ');
                    }
                    cur.push_str(word);
                }
            }
            if !cur.is_empty() {
                wrapped.push(cur);
            }
        }

        if wrapped.is_empty() {
            return (0, 0);
        }
        let widest = wrapped.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
        let lines = u32::try_from(wrapped.len()).unwrap_or(u32::MAX);
        (
            widest.saturating_mul(char_w).min(available),
            lines.saturating_mul(line_h),
        )
    }
}

fn layout_element(el: ElementRef, sheet: &Stylesheet, available: u32, font: u32) -> LayoutBox {
    let style = Style::compute(el, sheet, font);
    let box_model = BoxModel {
        margin: style.margin,
        border: style.border,
        padding: style.padding,
    };
    if style.hidden {
        return LayoutBox {
            rect: Rect { x: 0, y: 0, width: 0, height: 0 },
            box_model: BoxModel { margin: (0, 0), border: 0, padding: 0 },
        };
    }

    let edge = edge_total(style.border, style.padding);
    let content_avail = style.width.unwrap_or_else(|| {
        available.saturating_sub(style.margin.1.saturating_mul(2).saturating_add(edge))
    });

    let mut content_w = 0u32;
    let mut content_h = 0u32;
    let mut run = InlineRun::default();

    if el.value().name() != "img" {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => run.push_text(text),
                Node::Element(e) => {
                    let name = e.name();
                    if SKIPPED.contains(&name) {
                        continue;
                    }
                    if name == "br" {
                        run.line_break();
                        continue;
                    }
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if INLINE.contains(&name) {
                        run.push_text(&child_el.text().collect::<String>());
                        run.push_text(" ");
                        continue;
                    }
                    let (w, h) = run.flush(content_avail, style.font_size);
                    content_w = content_w.max(w);
                    content_h = content_h.saturating_add(h);

                    let child_box = layout_element(child_el, sheet, content_avail, style.font_size);
                    content_w = content_w.max(child_box.outer_width());
                    content_h = content_h.saturating_add(child_box.outer_height());
                }
                _ => {}
            }
        }
        let (w, h) = run.flush(content_avail, style.font_size);
        content_w = content_w.max(w);
        content_h = content_h.saturating_add(h);
    }

    LayoutBox {
        rect: Rect {
            x: i32::try_from(style.margin.1).unwrap_or(i32::MAX),
            y: i32::try_from(style.margin.0).unwrap_or(i32::MAX),
            width: style.width.unwrap_or(content_w).saturating_add(edge),
            height: style.height.unwrap_or(content_h).saturating_add(edge),
        },
        box_model,
    }
}

/// Collect the text of every `<style>` element in the document.
pub fn document_stylesheet(document: &Html) -> Stylesheet {
    let mut sheet = Stylesheet::default();
    let Ok(style_sel) = Selector::parse("style") else {
        return sheet;
    };
    for node in document.select(&style_sel) {
        let txt = node.text().collect::<String>();
        if !txt.trim().is_empty() {
            sheet.extend(Stylesheet::parse(&txt));
        }
    }
    sheet
}

/// Lay out the document's root element within the viewport width and return
/// its box. The preview frame is sized to this box.
pub fn layout_document(document: &Html, viewport: Viewport) -> LayoutBox {
    let sheet = document_stylesheet(document);
    layout_element(document.root_element(), &sheet, viewport.width, DEFAULT_FONT_SIZE)
}
