//! Scripted fakes for the fetch, file and notification seams.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, UpdateError};
use crate::networking::{FetchCapability, FetchRequest, FetchResponse};
use crate::notify::NotificationSink;
use crate::storage::FileStore;

pub enum Scripted {
    Respond(FetchResponse),
    Fail(UpdateError),
    Hang,
}

#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, scripted: Scripted) -> Self {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(url.to_owned(), scripted);
        self
    }

    pub fn json(self, url: &str, body: serde_json::Value) -> Self {
        self.route(
            url,
            Scripted::Respond(FetchResponse {
                status: 200,
                status_text: "OK".into(),
                body: body.to_string().into_bytes(),
            }),
        )
    }

    pub fn bytes(self, url: &str, body: &[u8]) -> Self {
        self.route(
            url,
            Scripted::Respond(FetchResponse {
                status: 200,
                status_text: "OK".into(),
                body: body.to_vec(),
            }),
        )
    }

    pub fn status(self, url: &str, status: u16, status_text: &str) -> Self {
        self.route(
            url,
            Scripted::Respond(FetchResponse {
                status,
                status_text: status_text.into(),
                body: Vec::new(),
            }),
        )
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

impl FetchCapability for ScriptedFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let outcome = {
            let routes = self.routes.lock().expect("routes lock");
            match routes.get(&request.url) {
                Some(Scripted::Respond(response)) => Some(Ok(response.clone())),
                Some(Scripted::Fail(err)) => Some(Err(err.clone())),
                Some(Scripted::Hang) => None,
                None => Some(Ok(FetchResponse {
                    status: 404,
                    status_text: "Not Found".into(),
                    body: Vec::new(),
                })),
            }
        };
        match outcome {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    pub files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    pub dirs: Mutex<Vec<PathBuf>>,
    pub read_only: HashSet<PathBuf>,
    pub broken_dirs: HashSet<PathBuf>,
}

impl MemoryFileStore {
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files
            .lock()
            .expect("files lock")
            .get(path.as_ref())
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.files.lock().expect("files lock").len()
    }
}

impl FileStore for MemoryFileStore {
    async fn ensure_dir(&self, path: &Path) -> std::io::Result<()> {
        if self.broken_dirs.contains(path) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        self.dirs.lock().expect("dirs lock").push(path.to_path_buf());
        Ok(())
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if self.read_only.contains(path) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file",
            ));
        }
        self.files
            .lock()
            .expect("files lock")
            .insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub fn any_contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push(message.to_owned());
    }
}

/// Release payload in the shape the hosting API returns.
pub fn release_json(tag: &str, assets: &[(&str, u64, &str)]) -> serde_json::Value {
    let assets: Vec<serde_json::Value> = assets
        .iter()
        .map(|(name, id, url)| {
            serde_json::json!({
                "name": name,
                "id": id,
                "browser_download_url": url,
            })
        })
        .collect();
    serde_json::json!({ "tag_name": tag, "name": format!("Release {tag}"), "assets": assets })
}
