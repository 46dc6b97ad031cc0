//! Test URL parsing: query strings and path segments.
//!
//! The preview simulates a request URL such as `/a/b?name=foo&width=200`.
//! Decoding follows `decodeURIComponent`, so `+` stays a literal plus sign.

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Decoded query parameters. A pair without `=` maps to `None`.
pub type QueryMap = BTreeMap<String, Option<String>>;

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// Convert a query string (with or without its leading `?`) into a map.
pub fn parse_query(query: &str) -> QueryMap {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = QueryMap::new();
    if query.is_empty() {
        return params;
    }

    for pair in query.split('&') {
        let mut parts = pair.split('=');
        let key = parts.next().map(decode).unwrap_or_default();
        let value = parts.next().map(decode);
        params.insert(key, value);
    }
    params
}

/// Split a path (with or without its leading `/`) into decoded segments.
/// An empty path yields one empty segment, as the server-side renderer does.
pub fn parse_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.split('/').map(decode).collect()
}

/// Parameters available to templates while rendering a preview.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParams {
    pub segments: Vec<String>,
    pub query: QueryMap,
}

impl TemplateParams {
    pub fn parse(path: &str, query: &str) -> Self {
        Self {
            segments: parse_path(path),
            query: parse_query(query),
        }
    }

    /// Data context for the templating pass. Valueless keys render as null
    /// and `params` always holds the path segments.
    pub fn to_data(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.query {
            let value = value.clone().map(Value::String).unwrap_or(Value::Null);
            map.insert(key.clone(), value);
        }
        map.insert("params".to_string(), self.segments_value());
        Value::Object(map)
    }

    /// The object exposed to preview scripts as the `query` global.
    /// Valueless keys are dropped, as `JSON.stringify` drops `undefined`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.query {
            if let Some(value) = value {
                map.insert(key.clone(), Value::String(value.clone()));
            }
        }
        map.insert("params".to_string(), self.segments_value());
        Value::Object(map)
    }

    fn segments_value(&self) -> Value {
        Value::Array(self.segments.iter().cloned().map(Value::String).collect())
    }
}
