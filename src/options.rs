//! User display preferences, persisted client-side only.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Storage key holding the JSON-encoded options
pub const OPTIONS_KEY: &str = "options";

pub const DEFAULT_THEME: &str = "theme-dark";
pub const DEFAULT_GRID_THEME: &str = "preview-wood";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub theme: String,
    pub grid_theme: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            grid_theme: DEFAULT_GRID_THEME.to_string(),
        }
    }
}

/// Key/value string storage with local-storage semantics.
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage; starts empty.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| Error::Storage("storage lock poisoned".into()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| Error::Storage("storage lock poisoned".into()))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage backed by a single JSON object file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/rendrit/storage.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("rendrit").join("storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::Storage(format!("{}: {}", self.path.display(), e))),
        };
        match serde_json::from_str(&text) {
            Ok(items) => Ok(items),
            Err(e) => {
                log::warn!("ignoring corrupt storage file {}: {}", self.path.display(), e);
                Ok(BTreeMap::new())
            }
        }
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let text = serde_json::to_string_pretty(&items)
            .map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

/// Options with an in-memory copy kept in sync with storage.
pub struct OptionsStore {
    storage: Box<dyn Storage>,
    current: Options,
}

impl OptionsStore {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        let mut store = Self {
            storage,
            current: Options::default(),
        };
        store.current = store.get();
        store
    }

    /// Read options from storage, falling back to the defaults when the
    /// key is absent, unreadable, or not a valid options object.
    pub fn get(&self) -> Options {
        match self.storage.get_item(OPTIONS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("stored options are unparsable, using defaults: {}", e);
                Options::default()
            }),
            Ok(None) => Options::default(),
            Err(e) => {
                log::warn!("could not read options: {}", e);
                Options::default()
            }
        }
    }

    /// Write options and re-sync the in-memory copy from storage.
    pub fn save(&mut self, options: &Options) -> Result<Options> {
        let raw = serde_json::to_string(options).map_err(|e| Error::Storage(e.to_string()))?;
        self.storage.set_item(OPTIONS_KEY, &raw)?;
        self.current = self.get();
        Ok(self.current.clone())
    }

    pub fn current(&self) -> &Options {
        &self.current
    }
}

fn hex_colour_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").expect("hex colour pattern is valid")
    })
}

/// Whether `value` is a `#rgb` or `#rrggbb` colour.
pub fn is_hex_colour(value: &str) -> bool {
    hex_colour_pattern().is_match(value)
}

/// A grid theme is either a named preview background or a custom colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridTheme {
    Class(String),
    Colour { red: u8, green: u8, blue: u8 },
}

impl GridTheme {
    pub fn classify(value: &str) -> Self {
        if !is_hex_colour(value) {
            return GridTheme::Class(value.to_string());
        }
        let hex = &value[1..];
        let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
        if hex.len() == 3 {
            let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
            GridTheme::Colour {
                red: expand(0),
                green: expand(1),
                blue: expand(2),
            }
        } else {
            GridTheme::Colour {
                red: channel(&hex[0..2]),
                green: channel(&hex[2..4]),
                blue: channel(&hex[4..6]),
            }
        }
    }
}

/// How the preview pane is decorated for a grid theme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewStyle {
    pub class: String,
    pub background_color: Option<String>,
}

pub fn preview_style(grid_theme: &str) -> PreviewStyle {
    match GridTheme::classify(grid_theme) {
        GridTheme::Class(name) => PreviewStyle {
            class: format!("right_panel {}", name),
            background_color: None,
        },
        GridTheme::Colour { red, green, blue } => PreviewStyle {
            class: "right_panel ".to_string(),
            background_color: Some(format!("rgb({}, {}, {})", red, green, blue)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_nothing_is_saved() {
        let store = OptionsStore::new(Box::new(MemoryStorage::new()));
        let options = store.get();
        assert_eq!(options.theme, "theme-dark");
        assert_eq!(options.grid_theme, "preview-wood");
    }

    #[test]
    fn defaults_when_stored_value_is_garbage() {
        let storage = MemoryStorage::new();
        storage.set_item(OPTIONS_KEY, "{not json").unwrap();
        let store = OptionsStore::new(Box::new(storage));
        assert_eq!(store.get(), Options::default());
    }

    #[test]
    fn save_writes_and_resyncs() {
        let mut store = OptionsStore::new(Box::new(MemoryStorage::new()));
        let saved = store
            .save(&Options {
                theme: "theme-light".into(),
                grid_theme: "#808080".into(),
            })
            .unwrap();
        assert_eq!(saved.theme, "theme-light");
        assert_eq!(saved.grid_theme, "#808080");
        assert_eq!(store.current(), &saved);
        assert_eq!(store.get(), saved);
    }

    #[test]
    fn stored_shape_is_camel_case() {
        let raw = serde_json::to_string(&Options::default()).unwrap();
        assert!(raw.contains("\"gridTheme\":\"preview-wood\""));
    }

    #[test]
    fn file_storage_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let storage = FileStorage::new(&path);
        assert_eq!(storage.get_item(OPTIONS_KEY).unwrap(), None);
        storage.set_item(OPTIONS_KEY, "{}").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get_item(OPTIONS_KEY).unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn validates_hex_colours() {
        assert!(is_hex_colour("#808090"));
        assert!(is_hex_colour("#abc"));
        assert!(!is_hex_colour("808090"));
        assert!(!is_hex_colour("#80809"));
        assert!(!is_hex_colour("preview-wood"));
    }

    #[test]
    fn preview_style_for_class_and_colour() {
        assert_eq!(preview_style("").class, "right_panel ");
        assert_eq!(preview_style("preview-wood").class, "right_panel preview-wood");

        let coloured = preview_style("#808090");
        assert_eq!(coloured.background_color.as_deref(), Some("rgb(128, 128, 144)"));
        assert_eq!(
            GridTheme::classify("#fa0"),
            GridTheme::Colour { red: 255, green: 170, blue: 0 }
        );
    }
}
