use std::{env, path::PathBuf};

use anyhow::{Context, Result};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_PORT: u16 = 8080;

/// Process configuration, resolved once at startup from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the remote summarization API.
    pub api_base_url: String,
    /// Port the local UI listens on.
    pub port: u16,
    /// File holding the persisted bearer token.
    pub credential_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let api_base_url = env::var("SUMMARY_API_URL")
            .map(|raw| normalize_base_url(&raw))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid PORT value `{raw}`"))?,
            Err(_) => DEFAULT_PORT,
        };

        let credential_path = env::var("CREDENTIAL_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_credential_path());

        Ok(Self {
            api_base_url,
            port,
            credential_path,
        })
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn default_credential_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("pdf-summary-client").join("token")
    } else {
        PathBuf::from(".pdf-summary-token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_base_url("http://api.example.com/"),
            "http://api.example.com"
        );
        assert_eq!(
            normalize_base_url("  http://api.example.com  "),
            "http://api.example.com"
        );
    }

    #[test]
    fn default_credential_path_is_not_empty() {
        let path = default_credential_path();
        assert!(path.file_name().is_some());
    }
}
