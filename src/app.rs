//! Application controller: owns the editor state and wires the editors,
//! preview, persistence client, and options together behind UI actions.
//!
//! Nothing here is global. A front end constructs one `App`, forwards user
//! actions to it, and drains `AppEvent`s to open or close its dialogs.

use crate::client::{Document, Library, RendrClient, SaveDocument};
use crate::debounce::{Debounced, Debouncer};
use crate::editor::{ChangeState, EditorBridge, EditorMode};
use crate::options::{Options, OptionsStore};
use crate::preview::{PreviewController, PreviewStatus, RenderRequest};
use crate::{EditorConfig, Error, Result};
use std::time::Duration;

pub const NO_LIBRARY_NAME: &str = "(No library loaded)";

/// Dialogs the controller asks the front end to show or hide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    NewLibrary,
    LoadLibrary,
    NewRendr,
    Options,
    NewLibraryError,
    LoadLibraryError,
    LoadRendrError,
    NewRendrError,
    SaveRendrError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    OpenModal(Modal),
    CloseModal(Modal),
}

/// Where a new rendr's initial content comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentSource {
    /// Whatever the editors hold right now
    #[default]
    Current,
    /// Placeholder comments naming the rendr
    Empty,
}

/// State of the "new rendr" dialog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRendrForm {
    pub rendr_id: String,
    pub content_source: ContentSource,
}

pub struct App {
    config: EditorConfig,
    client: RendrClient,
    options: OptionsStore,
    editors: EditorBridge,
    preview: PreviewController,
    library: Option<Library>,
    document: Option<Document>,
    test_path: String,
    test_params: String,
    pub new_rendr: NewRendrForm,
    in_progress: bool,
    events: Vec<AppEvent>,
    changes: Option<Debouncer>,
}

impl App {
    pub fn new(config: EditorConfig, options: OptionsStore) -> Result<Self> {
        let client = RendrClient::new(&config)?;
        let preview = PreviewController::new(&config);
        Ok(Self {
            config,
            client,
            options,
            editors: EditorBridge::new(),
            preview,
            library: None,
            document: None,
            test_path: String::new(),
            test_params: String::new(),
            new_rendr: NewRendrForm::default(),
            in_progress: false,
            events: Vec::new(),
            changes: None,
        })
    }

    /// Start coalescing edits. The returned receiver fires once per burst;
    /// the front end answers each notification with `code_change`.
    /// Must be called from within a tokio runtime.
    pub fn watch_changes(&mut self) -> Debounced {
        let (debouncer, fired) = Debouncer::new(Duration::from_millis(self.config.debounce_ms));
        self.changes = Some(debouncer);
        fired
    }

    fn notify_change(&self) {
        if let Some(changes) = &self.changes {
            changes.trigger();
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn editors(&self) -> &EditorBridge {
        &self.editors
    }

    pub fn editors_mut(&mut self) -> &mut EditorBridge {
        &mut self.editors
    }

    pub fn preview(&self) -> &PreviewController {
        &self.preview
    }

    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn options(&self) -> &Options {
        self.options.current()
    }

    pub fn test_path(&self) -> &str {
        &self.test_path
    }

    pub fn test_params(&self) -> &str {
        &self.test_params
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    /// Drain the dialog events raised since the last call.
    pub fn take_events(&mut self) -> Vec<AppEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn library_name(&self) -> &str {
        self.library
            .as_ref()
            .map(|l| l.name.as_str())
            .unwrap_or(NO_LIBRARY_NAME)
    }

    /// Rendr ids listed in the library menu
    pub fn library_menu(&self) -> &[String] {
        self.library
            .as_ref()
            .map(|l| l.rendrs.as_slice())
            .unwrap_or(&[])
    }

    pub fn editor_has_unsaved_changes(&self) -> bool {
        self.editors.has_unsaved_changes()
    }

    /// The example URL shown under the preview.
    pub fn example_url(&self) -> Option<String> {
        let doc = self.document.as_ref()?;
        Some(crate::preview::rendered_url(
            &doc.library_id,
            &doc.rendr_id,
            &self.test_path,
            &self.test_params,
            &self.config.preview_format,
        ))
    }

    pub fn edit_html(&mut self, content: &str) -> Result<()> {
        self.editors.buffer_mut(EditorMode::Html).edit(content)?;
        self.notify_change();
        Ok(())
    }

    pub fn edit_css(&mut self, content: &str) -> Result<()> {
        self.editors.buffer_mut(EditorMode::Css).edit(content)?;
        self.notify_change();
        Ok(())
    }

    pub fn set_test_path(&mut self, path: &str) {
        self.test_path = path.to_string();
        self.notify_change();
    }

    pub fn set_test_params(&mut self, params: &str) {
        self.test_params = params.to_string();
        self.notify_change();
    }

    /// Compare the editors to the saved rendr and refresh the preview.
    /// Diverging from the saved rendr forces the live preview.
    pub async fn code_change(&mut self) -> PreviewStatus {
        if self.document.is_some() && self.editors.check() == ChangeState::Dirty && self.preview.set_live() {
            log::debug!("editors diverged from the saved rendr; switching to live preview");
        }

        let request = RenderRequest {
            html: self.editors.html().content(),
            css: self.editors.css().content(),
            path: &self.test_path,
            query: &self.test_params,
            document: self
                .document
                .as_ref()
                .map(|d| (d.library_id.as_str(), d.rendr_id.as_str())),
        };
        self.preview.render(request, Some(&self.client)).await
    }

    pub async fn new_library(&mut self, name: &str) -> Result<()> {
        self.in_progress = true;
        let result = self.client.create_library(name).await;
        self.in_progress = false;

        match result {
            Ok(library) => {
                log::info!("created library {}", library.library_id);
                self.library = Some(library);
                Ok(())
            }
            Err(e) => {
                log::warn!("creating library failed: {}", e);
                self.library = None;
                self.events.push(AppEvent::OpenModal(Modal::NewLibraryError));
                Err(e)
            }
        }
    }

    pub async fn load_library(&mut self, library_id: &str, key: &str) -> Result<()> {
        self.in_progress = true;
        let result = self.client.fetch_library(library_id, key).await;
        self.in_progress = false;

        match result {
            Ok(library) => {
                self.library = Some(library);
                self.events.push(AppEvent::CloseModal(Modal::LoadLibrary));
                Ok(())
            }
            Err(e) => {
                log::warn!("loading library {} failed: {}", library_id, e);
                self.library = None;
                self.events.push(AppEvent::OpenModal(Modal::LoadLibraryError));
                Err(e)
            }
        }
    }

    fn apply_document(&mut self, doc: Document) {
        self.editors.sync(&doc);
        self.test_path = doc.test_path.clone();
        self.test_params = doc.test_params.clone();
        self.document = Some(doc);
    }

    pub async fn load_rendr(&mut self, rendr_id: &str) -> Result<()> {
        let library_id = self.library.as_ref().ok_or(Error::NoLibrary)?.library_id.clone();

        self.in_progress = true;
        let result = self.client.fetch_document(&library_id, rendr_id).await;
        self.in_progress = false;

        match result {
            Ok(doc) => {
                self.apply_document(doc);
                self.code_change().await;
                Ok(())
            }
            Err(e) => {
                log::warn!("loading rendr {}/{} failed: {}", library_id, rendr_id, e);
                self.events.push(AppEvent::OpenModal(Modal::LoadRendrError));
                Err(e)
            }
        }
    }

    // Upsert a rendr and record it in the library. The response replaces the
    // editor contents, whatever was typed while the request was in flight.
    async fn persist(&mut self, rendr_id: &str, css: &str, body: &str) -> Result<Document> {
        let library = self.library.as_ref().ok_or(Error::NoLibrary)?;
        let key = library.key.clone().unwrap_or_default();
        let library_id = library.library_id.clone();

        self.in_progress = true;
        let result = self
            .client
            .save_document(SaveDocument {
                library_id: &library_id,
                library_key: &key,
                rendr_id,
                css,
                body,
                test_path: &self.test_path,
                test_params: &self.test_params,
            })
            .await;
        self.in_progress = false;

        let doc = result?;
        if let Some(library) = self.library.as_mut() {
            library.add_rendr_id(rendr_id);
        }
        Ok(doc)
    }

    /// Create a rendr from the "new rendr" dialog.
    pub async fn new_rendr(&mut self) -> Result<()> {
        let rendr_id = self.new_rendr.rendr_id.clone();
        let (css, body) = match self.new_rendr.content_source {
            ContentSource::Current => (
                self.editors.css().content().to_string(),
                self.editors.html().content().to_string(),
            ),
            ContentSource::Empty => (
                format!("/* Rendr {}: CSS content */", rendr_id),
                format!("<!-- Rendr {}: HTML body content -->", rendr_id),
            ),
        };

        match self.persist(&rendr_id, &css, &body).await {
            Ok(doc) => {
                self.apply_document(doc);
                self.events.push(AppEvent::CloseModal(Modal::NewRendr));
                self.code_change().await;
                Ok(())
            }
            Err(e) => {
                log::warn!("creating rendr {} failed: {}", rendr_id, e);
                self.events.push(AppEvent::OpenModal(Modal::NewRendrError));
                Err(e)
            }
        }
    }

    /// Save the editors over the loaded rendr. Does nothing when the editors
    /// match what was last saved.
    pub async fn save_rendr(&mut self) -> Result<()> {
        if !self.editor_has_unsaved_changes() {
            return Ok(());
        }
        let rendr_id = self.document.as_ref().ok_or(Error::NoDocument)?.rendr_id.clone();
        let css = self.editors.css().content().to_string();
        let body = self.editors.html().content().to_string();

        match self.persist(&rendr_id, &css, &body).await {
            Ok(doc) => {
                self.apply_document(doc);
                self.code_change().await;
                Ok(())
            }
            Err(e) => {
                log::warn!("saving rendr {} failed: {}", rendr_id, e);
                self.events.push(AppEvent::OpenModal(Modal::SaveRendrError));
                Err(e)
            }
        }
    }

    /// Switch to the live preview; only acts from rendered mode.
    pub async fn preview_live(&mut self) {
        if self.preview.set_live() {
            self.code_change().await;
        }
    }

    /// Switch to the server-rendered preview. Needs a saved rendr id and
    /// editors that match it.
    pub async fn preview_rendered(&mut self) {
        let has_document = self
            .document
            .as_ref()
            .is_some_and(|d| !d.rendr_id.is_empty());
        if self.editor_has_unsaved_changes() {
            return;
        }
        if self.preview.set_rendered(has_document) {
            self.code_change().await;
        }
    }

    /// Open the "new rendr" dialog; requires a loaded library.
    pub fn show_new_rendr(&mut self) {
        if self.library.is_some() {
            self.events.push(AppEvent::OpenModal(Modal::NewRendr));
        }
    }

    pub fn save_options(&mut self, theme: &str, grid_theme: &str) -> Result<Options> {
        let saved = self.options.save(&Options {
            theme: theme.to_string(),
            grid_theme: grid_theme.to_string(),
        })?;
        self.events.push(AppEvent::CloseModal(Modal::Options));
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MemoryStorage;
    use crate::preview::PreviewMode;

    fn app() -> App {
        App::new(
            EditorConfig::default(),
            OptionsStore::new(Box::new(MemoryStorage::new())),
        )
        .unwrap()
    }

    #[test]
    fn starts_with_defaults() {
        let app = app();
        assert_eq!(app.options().theme, "theme-dark");
        assert_eq!(app.options().grid_theme, "preview-wood");
        assert_eq!(app.preview().mode(), PreviewMode::Live);
        assert_eq!(app.new_rendr.content_source, ContentSource::Current);
        assert_eq!(app.library_name(), "(No library loaded)");
        assert!(app.library_menu().is_empty());
        assert!(!app.in_progress());
    }

    #[test]
    fn saves_options_and_closes_dialog() {
        let mut app = app();
        let saved = app.save_options("theme-light", "preview-checkerboard").unwrap();
        assert_eq!(saved.theme, "theme-light");
        assert_eq!(app.options().grid_theme, "preview-checkerboard");
        assert_eq!(app.take_events(), vec![AppEvent::CloseModal(Modal::Options)]);
    }

    #[test]
    fn new_rendr_dialog_needs_a_library() {
        let mut app = app();
        app.show_new_rendr();
        assert!(app.take_events().is_empty());

        app.library = Some(Library::default());
        app.show_new_rendr();
        assert_eq!(app.take_events(), vec![AppEvent::OpenModal(Modal::NewRendr)]);
    }

    #[tokio::test]
    async fn preview_rendered_without_document_is_a_no_op() {
        let mut app = app();
        app.preview_rendered().await;
        assert_eq!(app.preview().mode(), PreviewMode::Live);
    }

    #[tokio::test]
    async fn preview_modes_toggle_with_a_document() {
        let mut app = app();
        app.document = Some(Document {
            library_id: "lib".into(),
            rendr_id: "abcd".into(),
            ..Default::default()
        });
        app.preview.set_rendered(true);
        app.preview_live().await;
        assert_eq!(app.preview().mode(), PreviewMode::Live);
        assert!(app.preview().status().error.is_none());
    }

    #[tokio::test]
    async fn save_is_skipped_without_changes() {
        let mut app = app();
        assert!(app.save_rendr().await.is_ok());
        assert!(!app.in_progress());
        assert!(app.take_events().is_empty());
    }

    #[tokio::test]
    async fn diverging_edits_force_live_preview() {
        let mut app = app();
        app.apply_document(Document {
            library_id: "lib".into(),
            rendr_id: "r".into(),
            body: "<p>saved</p>".into(),
            css: "".into(),
            ..Default::default()
        });
        app.preview.set_rendered(true);

        app.edit_html("<p>changed</p>").unwrap();
        app.code_change().await;
        assert_eq!(app.preview().mode(), PreviewMode::Live);
        assert!(app.editor_has_unsaved_changes());
        assert_eq!(app.editors().state(), ChangeState::Dirty);

        app.edit_html("<p>saved</p>").unwrap();
        app.code_change().await;
        assert_eq!(app.editors().state(), ChangeState::Clean);
    }

    #[tokio::test]
    async fn edits_are_coalesced_by_the_watcher() {
        let mut app = App::new(
            EditorConfig {
                debounce_ms: 20,
                ..Default::default()
            },
            OptionsStore::new(Box::new(MemoryStorage::new())),
        )
        .unwrap();
        app.editors_mut().sync(&Document::default());
        let mut fired = app.watch_changes();

        app.edit_html("<b>1</b>").unwrap();
        app.edit_css("b{}").unwrap();
        app.set_test_params("a=1");
        assert_eq!(fired.recv().await, Some(()));
        assert_eq!(fired.try_recv(), None);
    }
}
