//! Thin request/response wrappers for the rendr.it persistence API.
//!
//! No call is retried and nothing guards against overlapping requests; when
//! two saves race, whichever response the caller applies last wins.

use crate::{EditorConfig, Error, Result};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// A named collection of rendrs, access-controlled by a secret key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub library_id: String,
    /// Secret key; never echoed by the fetch endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rendrs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_hash: Option<String>,
}

impl Library {
    /// Append a rendr id unless the library already lists it.
    pub fn add_rendr_id(&mut self, rendr_id: &str) {
        if !self.rendrs.iter().any(|r| r == rendr_id) {
            self.rendrs.push(rendr_id.to_string());
        }
    }
}

/// A saved HTML+CSS template and the test URL it is previewed with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub library_id: String,
    pub rendr_id: String,
    pub body: String,
    pub css: String,
    pub test_path: String,
    pub test_params: String,
}

/// Body of the upsert request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveRequest<'a> {
    library_key: &'a str,
    css: &'a str,
    body: &'a str,
    test_path: &'a str,
    test_params: &'a str,
}

/// Fields of a rendr save
#[derive(Debug, Clone, Copy)]
pub struct SaveDocument<'a> {
    pub library_id: &'a str,
    pub library_key: &'a str,
    pub rendr_id: &'a str,
    pub css: &'a str,
    pub body: &'a str,
    pub test_path: &'a str,
    pub test_params: &'a str,
}

#[derive(Debug, Clone)]
pub struct RendrClient {
    http: Client,
    base: Url,
}

impl RendrClient {
    pub fn new(config: &EditorConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        let base = Url::parse(&config.base_url)?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Error::Http {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }

    /// `POST /library/` with a form-encoded name.
    pub async fn create_library(&self, name: &str) -> Result<Library> {
        let url = self.url("/library/")?;
        log::debug!("creating library {:?}", name);
        let resp = self.http.post(url).form(&[("name", name)]).send().await?;
        Ok(Self::check(resp)?.json::<Library>().await?)
    }

    /// `GET /library/{id}?key={key}`. The key is re-attached to the result.
    pub async fn fetch_library(&self, library_id: &str, key: &str) -> Result<Library> {
        let url = self.url(&format!("/library/{}", library_id))?;
        let resp = self.http.get(url).query(&[("key", key)]).send().await?;
        let mut library = Self::check(resp)?.json::<Library>().await?;
        library.key = Some(key.to_string());
        Ok(library)
    }

    /// `GET /{libraryId}/{rendrId}.json`
    pub async fn fetch_document(&self, library_id: &str, rendr_id: &str) -> Result<Document> {
        let url = self.url(&format!("/{}/{}.json", library_id, rendr_id))?;
        let resp = self.http.get(url).send().await?;
        Ok(Self::check(resp)?.json::<Document>().await?)
    }

    /// `PUT /rendr/{libraryId}/{rendrId}`; creates the rendr when absent.
    pub async fn save_document(&self, doc: SaveDocument<'_>) -> Result<Document> {
        let url = self.url(&format!("/rendr/{}/{}", doc.library_id, doc.rendr_id))?;
        let body = SaveRequest {
            library_key: doc.library_key,
            css: doc.css,
            body: doc.body,
            test_path: doc.test_path,
            test_params: doc.test_params,
        };
        log::debug!("saving rendr {}/{}", doc.library_id, doc.rendr_id);
        let resp = self.http.put(url).json(&body).send().await?;
        Ok(Self::check(resp)?.json::<Document>().await?)
    }

    /// Fetch a server-rendered preview image by its absolute path.
    pub async fn fetch_image(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path)?;
        let resp = self.http.get(url).send().await?;
        let bytes = Self::check(resp)?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
