//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `LYRICAST_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `LYRICAST_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `LYRICAST_TRANSCRIPTION__MODEL=gemini-2.0-flash` sets the `transcription.model` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! LYRICAST_PORT=8080
//!
//! # Point the relay at a different provider deployment
//! LYRICAST_TRANSCRIPTION__BASE_URL="https://generativelanguage.googleapis.com"
//! LYRICAST_TRANSCRIPTION__REQUEST_TIMEOUT="2m"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LYRICAST_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Transcription provider configuration (endpoint, model, prompt, timeout)
    pub transcription: TranscriptionConfig,
    /// Upload handling configuration
    pub files: FilesConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

/// Transcription provider configuration.
///
/// The model identifier and instruction prompt are fixed configuration, not
/// runtime parameters; the caller only supplies the credential per request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranscriptionConfig {
    /// Base URL of the Generative Language API
    pub base_url: Url,
    /// Model identifier used for transcript generation
    pub model: String,
    /// Instruction sent alongside the uploaded audio
    pub prompt: String,
    /// Timeout applied to each provider call
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://generativelanguage.googleapis.com").unwrap(),
            model: "gemini-1.5-flash".to_string(),
            prompt: "Generate a transcript of the audio with timestamps in LRC format.".to_string(),
            request_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Upload handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesConfig {
    /// Maximum accepted upload size in bytes (default: 100MB)
    pub max_upload_size: u64,
    /// Directory where uploads are spooled while in flight.
    /// Uses the system temporary directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_dir: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 100 * 1024 * 1024, // 100MB
            upload_dir: None,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            transcription: TranscriptionConfig::default(),
            files: FilesConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("LYRICAST_").split("__"))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.transcription.model.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: transcription.model cannot be empty".to_string(),
            });
        }

        if self.transcription.prompt.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: transcription.prompt cannot be empty".to_string(),
            });
        }

        if self.transcription.request_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: transcription.request_timeout must be positive".to_string(),
            });
        }

        if self.files.max_upload_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: max_upload_size cannot be 0. Set a positive byte count (default: 100MB)."
                    .to_string(),
            });
        }

        // Validate CORS configuration
        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin."
                    .to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
