use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-process state. The connection is opened once by `main` and injected
/// here; handlers never open or own store handles themselves.
pub struct AppState {
    pub workspace: PathBuf,
    pub db: Connection,
}
