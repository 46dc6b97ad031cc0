//! A fake rendr.it API served by tiny_http for integration tests

#![allow(dead_code)]

use rendrit::options::{MemoryStorage, OptionsStore};
use rendrit::{App, EditorConfig};
use std::io::Read;
use std::sync::{Arc, Mutex};
use tiny_http::{Header, Response, Server};

/// A request as the fake server saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// What the fake server answers with
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(value: serde_json::Value) -> Self {
        Reply {
            status: 200,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn bytes(content_type: &'static str, body: Vec<u8>) -> Self {
        Reply {
            status: 200,
            content_type,
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        Reply {
            status,
            content_type: "application/json",
            body: b"{}".to_vec(),
        }
    }
}

pub struct FakeApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeApi {
    /// Serve `route` on an ephemeral port until the test process exits.
    pub fn start<F>(route: F) -> FakeApi
    where
        F: Fn(&Recorded) -> Reply + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        std::thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    content_type: request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Content-Type"))
                        .map(|h| h.value.as_str().to_string()),
                    body,
                };
                let reply = route(&recorded);
                log.lock().unwrap().push(recorded);

                let header = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()).unwrap();
                let response = Response::from_data(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        FakeApi {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn config(&self) -> EditorConfig {
        EditorConfig {
            base_url: self.base_url.clone(),
            timeout_ms: 5000,
            ..Default::default()
        }
    }

    pub fn app(&self) -> App {
        App::new(self.config(), OptionsStore::new(Box::new(MemoryStorage::new()))).unwrap()
    }
}

/// Echo a rendr upsert back the way the server stores it.
pub fn echo_save(request: &Recorded) -> Reply {
    let segments: Vec<&str> = request.url.trim_start_matches("/rendr/").split('/').collect();
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    Reply::json(serde_json::json!({
        "libraryId": segments[0],
        "rendrId": segments[1],
        "body": sent["body"],
        "css": sent["css"],
        "testPath": sent["testPath"],
        "testParams": sent["testParams"],
    }))
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
