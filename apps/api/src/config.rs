use anyhow::{Context, Result};

use crate::intake::DEFAULT_MAX_AUDIO_BYTES;
use crate::session::orchestrator::{DEFAULT_MIN_SESSION_SECS, MAX_MIN_SESSION_SECS};

const DEFAULT_AI_TIMEOUT_SECS: u64 = 120;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unset means sessions live in process memory only.
    pub database_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub ai_service_url: String,
    pub port: u16,
    pub rust_log: String,
    pub max_audio_upload_bytes: usize,
    pub min_session_duration_secs: i64,
    pub ai_service_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let min_session_duration_secs: i64 = parse_or(
            &lookup,
            "MIN_SESSION_DURATION_SECS",
            DEFAULT_MIN_SESSION_SECS,
        )?;
        if !(0..=MAX_MIN_SESSION_SECS).contains(&min_session_duration_secs) {
            anyhow::bail!(
                "MIN_SESSION_DURATION_SECS must be between 0 and {MAX_MIN_SESSION_SECS}, got {min_session_duration_secs}"
            );
        }

        Ok(Config {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            ai_service_url: require("AI_SERVICE_URL")?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            max_audio_upload_bytes: parse_or(&lookup, "MAX_AUDIO_UPLOAD_BYTES", DEFAULT_MAX_AUDIO_BYTES)?,
            min_session_duration_secs,
            ai_service_timeout_secs: parse_or(
                &lookup,
                "AI_SERVICE_TIMEOUT_SECS",
                DEFAULT_AI_TIMEOUT_SECS,
            )?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 5] = [
        ("S3_BUCKET", "interview-audio"),
        ("S3_ENDPOINT", "http://localhost:9000"),
        ("AWS_ACCESS_KEY_ID", "minio"),
        ("AWS_SECRET_ACCESS_KEY", "minio123"),
        ("AI_SERVICE_URL", "http://localhost:8000"),
    ];

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_lookup(env(&REQUIRED)).unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.max_audio_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.min_session_duration_secs, 1830);
        assert_eq!(config.ai_service_timeout_secs, 120);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DATABASE_URL", "postgres://localhost/interviews"),
            ("PORT", "9090"),
            ("MIN_SESSION_DURATION_SECS", "60"),
        ]);
        let config = Config::from_lookup(env(&pairs)).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/interviews")
        );
        assert_eq!(config.port, 9090);
        assert_eq!(config.min_session_duration_secs, 60);
    }

    #[test]
    fn test_missing_required_variable_is_named() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "AI_SERVICE_URL")
            .collect();
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("AI_SERVICE_URL"));
    }

    #[test]
    fn test_min_session_duration_out_of_range_is_rejected() {
        for raw in ["-60", "86401", "9000000000000000"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("MIN_SESSION_DURATION_SECS", raw));
            let err = Config::from_lookup(env(&pairs)).unwrap_err();
            assert!(
                err.to_string().contains("MIN_SESSION_DURATION_SECS"),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = Config::from_lookup(env(&pairs)).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
