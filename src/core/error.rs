use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire bench backend.
/// Every module returns `Result<T, ManagerError>`.
#[derive(Debug, Error)]
pub enum ManagerError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry request failed: HTTP {status} {reason}")]
    Registry { status: u16, reason: String },

    #[error("Download failed for {url}: HTTP {status} {reason}")]
    Download {
        url: String,
        status: u16,
        reason: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Project ─────────────────────────────────────────
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project already exists: {0}")]
    ProjectAlreadyExists(String),

    #[error("Invalid project name: {0}")]
    InvalidProjectName(String),

    #[error("No server jar provisioned for {server} in project {project}")]
    ServerNotProvisioned { project: String, server: String },

    // ── Server process ──────────────────────────────────
    #[error("Failed to spawn server process: {source}")]
    Spawn { source: std::io::Error },

    #[error("A server is already running")]
    AlreadyRunning,
}

/// Convenience alias used throughout the crate.
pub type ManagerResult<T> = Result<T, ManagerError>;

impl From<std::io::Error> for ManagerError {
    fn from(source: std::io::Error) -> Self {
        ManagerError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
