use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Placeholder JWT secrets that must not reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Key sealing stored SMTP passwords and Gmail tokens.
    pub secret_key: [u8; 32],
    /// Absolute origin used in redirects, the sitemap and upload URLs.
    pub public_url: String,
    pub upload_dir: PathBuf,
    /// IP geolocation endpoint. Empty disables lookups.
    pub geo_url: String,
    /// Honour `X-Forwarded-For`/`X-Real-IP`. Only safe behind a reverse
    /// proxy that overwrites them.
    pub trust_proxy: bool,
    pub google: GoogleConfig,
}

impl Default for Config {
    fn default() -> Self {
        let public_url = "http://localhost:3000".to_string();
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            db_path: "folio.db".into(),
            jwt_secret: "dev-secret-change-me".into(),
            secret_key: [0u8; 32],
            google: GoogleConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: format!("{public_url}/api/gmail/callback"),
            },
            public_url,
            upload_dir: "./uploads".into(),
            geo_url: "http://ip-api.com/json".into(),
            trust_proxy: false,
        }
    }
}

impl Config {
    /// Read every setting from the environment, falling back to
    /// development defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let port = match std::env::var("FOLIO_PORT") {
            Ok(v) => v.parse().with_context(|| format!("FOLIO_PORT is not a port: {v}"))?,
            Err(_) => defaults.port,
        };

        let secret_key = match std::env::var("FOLIO_SECRET_KEY") {
            Ok(v) if !v.trim().is_empty() => {
                folio_crypto::keys::key_from_base64(&v).context("FOLIO_SECRET_KEY must be 32 bytes of base64")?
            }
            _ => {
                warn!("FOLIO_SECRET_KEY unset: using an ephemeral key, stored credentials will not survive a restart");
                folio_crypto::keys::generate_key()
            }
        };

        let public_url = env_or("FOLIO_PUBLIC_URL", &defaults.public_url)
            .trim_end_matches('/')
            .to_string();

        let google = GoogleConfig {
            client_id: env_or("GOOGLE_CLIENT_ID", ""),
            client_secret: env_or("GOOGLE_CLIENT_SECRET", ""),
            redirect_uri: env_or("GOOGLE_REDIRECT_URI", &format!("{public_url}/api/gmail/callback")),
        };
        if google.client_id.is_empty() {
            warn!("GOOGLE_CLIENT_ID unset: Gmail connections will fail");
        }

        Ok(Self {
            host: env_or("FOLIO_HOST", &defaults.host),
            port,
            db_path: env_or("FOLIO_DB_PATH", "folio.db").into(),
            jwt_secret: env_or("FOLIO_JWT_SECRET", &defaults.jwt_secret),
            secret_key,
            public_url,
            upload_dir: env_or("FOLIO_UPLOAD_DIR", "./uploads").into(),
            geo_url: env_or("FOLIO_GEO_URL", &defaults.geo_url),
            trust_proxy: env_flag("FOLIO_TRUST_PROXY"),
            google,
        })
    }

    pub fn has_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
