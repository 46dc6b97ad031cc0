//! Integration tests for the persistence client against a fake API

mod common;

use common::{echo_save, FakeApi, Reply};
use rendrit::client::SaveDocument;
use rendrit::{Error, RendrClient};
use serde_json::json;

#[tokio::test]
async fn test_create_library_posts_form() {
    let api = FakeApi::start(|_| {
        Reply::json(json!({
            "keyHash": "klmnop1233",
            "libraryId": "abcdefh",
            "key": "wxyz",
            "name": "New Library"
        }))
    });
    let client = RendrClient::new(&api.config()).unwrap();

    let library = client.create_library("New Library").await.unwrap();
    assert_eq!(library.library_id, "abcdefh");
    assert_eq!(library.key.as_deref(), Some("wxyz"));
    assert_eq!(library.key_hash.as_deref(), Some("klmnop1233"));
    assert!(library.rendrs.is_empty());

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/library/");
    assert_eq!(requests[0].body, "name=New+Library");
    assert!(requests[0]
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("application/x-www-form-urlencoded"));
}

#[tokio::test]
async fn test_fetch_library_with_key() {
    let api = FakeApi::start(|_| {
        Reply::json(json!({
            "libraryId": "abcdefghij",
            "name": "Demo Test1",
            "rendrs": ["rendr1", "rendr2"]
        }))
    });
    let client = RendrClient::new(&api.config()).unwrap();

    let library = client.fetch_library("abcdefghij", "klmnopqrstuvwxyz").await.unwrap();
    assert_eq!(library.name, "Demo Test1");
    assert_eq!(library.rendrs, vec!["rendr1", "rendr2"]);
    // the fetch endpoint never echoes the key
    assert_eq!(library.key.as_deref(), Some("klmnopqrstuvwxyz"));
    assert_eq!(api.requests()[0].url, "/library/abcdefghij?key=klmnopqrstuvwxyz");
}

#[tokio::test]
async fn test_fetch_document() {
    let api = FakeApi::start(|_| {
        Reply::json(json!({
            "body": "<!-- Rendr Default Example: HTML body content -->",
            "css": "/* Rendr Default Example: CSS content */",
            "libraryId": "libid1",
            "rendrId": "rendrid1",
            "testParams": "name=foo&width=200",
            "testPath": "/a/b/c"
        }))
    });
    let client = RendrClient::new(&api.config()).unwrap();

    let doc = client.fetch_document("libid1", "rendrid1").await.unwrap();
    assert_eq!(api.requests()[0].url, "/libid1/rendrid1.json");
    assert_eq!(doc.rendr_id, "rendrid1");
    assert_eq!(doc.test_params, "name=foo&width=200");
    assert_eq!(doc.test_path, "/a/b/c");
    assert_eq!(doc.css, "/* Rendr Default Example: CSS content */");
}

#[tokio::test]
async fn test_save_document_puts_json() {
    let api = FakeApi::start(echo_save);
    let client = RendrClient::new(&api.config()).unwrap();

    let doc = client
        .save_document(SaveDocument {
            library_id: "libid2",
            library_key: "mspzehr",
            rendr_id: "rendrid2",
            css: "p { font-size: large; }",
            body: "<div><p>my name is {{name}}</p></div>",
            test_path: "",
            test_params: "name=bar",
        })
        .await
        .unwrap();
    assert_eq!(doc.body, "<div><p>my name is {{name}}</p></div>");
    assert_eq!(doc.test_params, "name=bar");

    let request = &api.requests()[0];
    assert_eq!(request.method, "PUT");
    assert_eq!(request.url, "/rendr/libid2/rendrid2");
    let sent: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(
        sent,
        json!({
            "libraryKey": "mspzehr",
            "css": "p { font-size: large; }",
            "body": "<div><p>my name is {{name}}</p></div>",
            "testPath": "",
            "testParams": "name=bar"
        })
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let api = FakeApi::start(|_| Reply::status(500));
    let client = RendrClient::new(&api.config()).unwrap();

    match client.fetch_document("libid1", "rendrid1").await {
        Err(Error::Http { status, url }) => {
            assert_eq!(status, 500);
            assert!(url.ends_with("/libid1/rendrid1.json"));
        }
        other => panic!("expected an HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_image_bytes() {
    let png = common::png(4, 3);
    let expected = png.clone();
    let api = FakeApi::start(move |_| Reply::bytes("image/png", png.clone()));
    let client = RendrClient::new(&api.config()).unwrap();

    let bytes = client.fetch_image("/lib/r/a.png?x=1").await.unwrap();
    assert_eq!(bytes, expected);
    assert_eq!(api.requests()[0].url, "/lib/r/a.png?x=1");
}
