use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Files on disk under `STORAGE_DIR` / `RECORDS_DIR`.
    Local,
    /// Process memory; everything is lost on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_image_model: String,
    pub port: u16,
    pub backend: StorageBackend,
    pub storage_dir: PathBuf,
    pub records_dir: PathBuf,
    pub public_base_url: String,
    pub identity_header: String,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_api_key = get("GEMINI_API_KEY").context("GEMINI_API_KEY must be set")?;
        let port: u16 = parse_or(get("PORT"), 8080, "PORT")?;
        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}/objects"))
            .trim_end_matches('/')
            .to_string();
        let max_concurrent_requests: usize = parse_or(get("MAX_CONCURRENT_REQUESTS"), 10, "MAX_CONCURRENT_REQUESTS")?;
        if max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }
        let backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("local") => StorageBackend::Local,
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'local' or 'memory', got {other}"),
        };

        Ok(Self {
            gemini_api_key,
            gemini_api_base: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            gemini_image_model: get("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            port,
            backend,
            storage_dir: get("STORAGE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data/storage")),
            records_dir: get("RECORDS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./data/records")),
            public_base_url,
            identity_header: get("IDENTITY_HEADER").unwrap_or_else(|| "x-caller-id".to_string()).to_ascii_lowercase(),
            request_timeout: Duration::from_secs(parse_or(get("REQUEST_TIMEOUT_SECS"), 120, "REQUEST_TIMEOUT_SECS")?),
            max_concurrent_requests,
            max_upload_bytes: parse_or(get("MAX_UPLOAD_BYTES"), 20 * 1024 * 1024, "MAX_UPLOAD_BYTES")?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T, key: &str) -> Result<T> {
    match value {
        Some(raw) => raw.parse().ok().with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}
