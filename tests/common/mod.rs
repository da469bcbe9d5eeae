//! Common test utilities for batch-dl end-to-end tests

#![allow(dead_code)]

use batch_dl::{BatchFetcher, Config};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Tiny GIF89a header; enough for the file on disk to be recognisable
pub const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

/// Mock server laid out like a flag mirror: `/flags/{cc}/{cc}.gif`
pub struct FlagServer {
    pub server: MockServer,
}

impl FlagServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}/flags", self.server.uri())
    }

    /// Serve `cc`'s image with the given status
    pub async fn image(&self, cc: &str, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200)
                .set_body_raw(GIF_BYTES.to_vec(), "image/gif")
        } else {
            ResponseTemplate::new(status)
        };
        Mock::given(method("GET"))
            .and(path(format!("/flags/{cc}/{cc}.gif")))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// Serve `cc`'s metadata document naming `country`
    pub async fn metadata(&self, cc: &str, country: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/flags/{cc}/metadata.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "country": country,
                "tld": cc,
            })))
            .mount(&self.server)
            .await;
    }
}

/// Create a fetcher writing into a fresh temp directory
///
/// Keep the returned TempDir alive for as long as the files are needed.
pub fn create_fetcher(config: Config) -> (BatchFetcher, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config {
        output_dir: temp_dir.path().to_path_buf(),
        ..config
    };
    let fetcher = BatchFetcher::new(config).unwrap();
    (fetcher, temp_dir)
}

/// Sorted file names in `dir`
pub fn files_in(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
