//! Shared fixtures for integration tests: a fake storefront and a library folder.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use hb_downloader_core::cache::{CACHE_FILE_NAME, CacheIndex, CacheKey, CacheRecord, CacheStore};
use hb_downloader_core::catalog::Endpoints;
use hb_downloader_core::download::{HttpClient, HttpSettings, RetryPolicy};
use hb_downloader_core::sync::{SyncConfig, SyncCoordinator};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BUNDLE: &str = "Humble Indie Bundle 19";
pub const PRODUCT: &str = "Game: Deluxe";
pub const PRODUCT_FOLDER: &str = "Game - Deluxe";

/// Client without retries so failure paths stay fast.
pub fn client() -> HttpClient {
    let settings = HttpSettings {
        retry: RetryPolicy::no_retry(),
        ..HttpSettings::default()
    };
    HttpClient::new(None, &settings).expect("client builds")
}

pub fn coordinator(server: &MockServer, config: SyncConfig) -> SyncCoordinator {
    SyncCoordinator::new(config, client()).with_endpoints(Endpoints::new(server.uri()))
}

pub fn config(library: &Path) -> SyncConfig {
    let mut config = SyncConfig::new(library);
    config.workers = 2;
    config
}

/// Library page embedding the given purchase keys.
pub fn library_page(keys: &[&str]) -> String {
    format!(
        "<html><body><script id=\"user-home-json-data\" type=\"application/json\">{}</script></body></html>",
        json!({ "gamekeys": keys })
    )
}

pub async fn mount_library(server: &MockServer, keys: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/home/library"))
        .respond_with(ResponseTemplate::new(200).set_body_string(library_page(keys)))
        .mount(server)
        .await;
}

/// One file entry of an order document.
pub fn file_entry(url: &str, uploaded_at: Option<&str>) -> Value {
    let mut entry = json!({
        "name": "Download",
        "url": { "web": url },
        "md5": Value::Null,
        "human_size": "10 bytes",
    });
    if let Some(token) = uploaded_at {
        entry["uploaded_at"] = json!(token);
    }
    entry
}

/// Order document with one product and the given `(platform, files)` entries.
pub fn order(platforms: Vec<(&str, Vec<Value>)>) -> Value {
    let downloads: Vec<Value> = platforms
        .into_iter()
        .map(|(platform, files)| json!({ "platform": platform, "download_struct": files }))
        .collect();
    json!({
        "product": { "human_name": BUNDLE },
        "subproducts": [{ "human_name": PRODUCT, "downloads": downloads }],
    })
}

pub async fn mount_order(server: &MockServer, key: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/order/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serves `body` at `file_path`, expecting exactly `hits` requests.
pub async fn mount_file(server: &MockServer, file_path: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}

pub fn product_dir(library: &Path) -> PathBuf {
    library.join(BUNDLE).join(PRODUCT_FOLDER)
}

pub fn cache_path(library: &Path) -> PathBuf {
    library.join(CACHE_FILE_NAME)
}

/// Writes records as if an earlier run had completed them.
pub fn seed_cache(library: &Path, records: &[(&str, &str, &str)]) {
    std::fs::create_dir_all(library).expect("library dir");
    let mut store = CacheStore::open(&cache_path(library)).expect("cache opens");
    for (container, filename, token) in records {
        store
            .apply(
                CacheKey::new(*container, *filename),
                CacheRecord::completed(Some((*token).to_string()), None),
            )
            .expect("record applied");
    }
}

/// Writes one record carrying both a revision token and a content hash.
pub fn seed_cache_with_hash(library: &Path, container: &str, filename: &str, token: &str, hash: &str) {
    std::fs::create_dir_all(library).expect("library dir");
    let mut store = CacheStore::open(&cache_path(library)).expect("cache opens");
    store
        .apply(
            CacheKey::new(container, filename),
            CacheRecord::completed(Some(token.to_string()), Some(hash.to_string())),
        )
        .expect("record applied");
}

pub fn load_cache(library: &Path) -> CacheIndex {
    CacheStore::load(&cache_path(library)).expect("cache loads")
}
