use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::error::{PlotlineError, Result};

const STARSCAPE_BASE_URL: &str = "https://starscape.infegy.com/api";
const ATLAS_BASE_URL: &str = "https://atlas.infegy.com/api/v3";
const ATLAS_KEY_FILE: &str = "infegy_atlas_api_key.txt";

/// Run configuration loaded from environment variables and credential files.
#[derive(Debug, Clone)]
pub struct Config {
    // Starscape (analytics)
    pub starscape_base_url: String,
    pub starscape_api_key: String,

    // Atlas (dataset hosting). Only needed for uploads.
    pub atlas_base_url: String,
    pub atlas_api_key: Option<String>,

    // Polling
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub early_complete_min: Option<usize>,

    // Enrichment
    pub narrative_limit: usize,
    pub enrichment_delay: Duration,
    pub volume_window_days: u32,

    // Output
    pub output_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. The Starscape key file must exist.
    /// The Atlas key file may be absent at its default path, but a file named
    /// through `ATLAS_API_KEY_FILE` must be readable and non-empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let key_file = lookup("STARSCAPE_API_KEY_FILE").unwrap_or_else(|| "api_key.txt".into());
        let starscape_api_key = read_credential(Path::new(&key_file))?;

        let atlas_api_key = match lookup("ATLAS_API_KEY_FILE") {
            Some(path) => Some(read_credential(Path::new(&path))?),
            None => {
                let default = Path::new(ATLAS_KEY_FILE);
                if default.exists() {
                    Some(read_credential(default)?)
                } else {
                    None
                }
            }
        };

        Ok(Self {
            starscape_base_url: lookup("STARSCAPE_BASE_URL")
                .unwrap_or_else(|| STARSCAPE_BASE_URL.to_string()),
            starscape_api_key,
            atlas_base_url: lookup("ATLAS_BASE_URL").unwrap_or_else(|| ATLAS_BASE_URL.to_string()),
            atlas_api_key,
            poll_interval: Duration::from_secs(parse_or(&lookup, "PLOTLINE_POLL_INTERVAL_SECS", 10)?),
            poll_timeout: Duration::from_secs(parse_or(&lookup, "PLOTLINE_POLL_TIMEOUT_SECS", 600)?),
            early_complete_min: parse_optional(&lookup, "PLOTLINE_EARLY_COMPLETE_MIN")?,
            narrative_limit: parse_or(&lookup, "PLOTLINE_NARRATIVE_LIMIT", 5)?,
            enrichment_delay: Duration::from_millis(parse_or(
                &lookup,
                "PLOTLINE_ENRICHMENT_DELAY_MS",
                1000,
            )?),
            volume_window_days: parse_or(&lookup, "PLOTLINE_VOLUME_WINDOW_DAYS", 30)?,
            output_dir: lookup("PLOTLINE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("plotline_data")),
        })
    }

    /// Configuration for simulated runs: no credentials, short waits.
    pub fn simulated() -> Self {
        Self {
            starscape_base_url: STARSCAPE_BASE_URL.to_string(),
            starscape_api_key: String::new(),
            atlas_base_url: ATLAS_BASE_URL.to_string(),
            atlas_api_key: None,
            poll_interval: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(60),
            early_complete_min: None,
            narrative_limit: 5,
            enrichment_delay: Duration::from_millis(500),
            volume_window_days: 30,
            output_dir: env::var("PLOTLINE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("plotline_data")),
        }
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            starscape_base_url = self.starscape_base_url.as_str(),
            starscape_api_key = redact(&self.starscape_api_key),
            atlas_base_url = self.atlas_base_url.as_str(),
            atlas_api_key = self.atlas_api_key.as_deref().map(redact).unwrap_or("<unset>"),
            poll_interval_secs = self.poll_interval.as_secs_f64(),
            poll_timeout_secs = self.poll_timeout.as_secs(),
            early_complete_min = ?self.early_complete_min,
            narrative_limit = self.narrative_limit,
            enrichment_delay_ms = self.enrichment_delay.as_millis() as u64,
            output_dir = %self.output_dir.display(),
            "Loaded config"
        );
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

/// Read a single-line credential file, trimming surrounding whitespace.
pub fn read_credential(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|source| PlotlineError::Credential {
        path: path.to_path_buf(),
        source,
    })?;
    let key = raw.trim();
    if key.is_empty() {
        return Err(PlotlineError::Config(format!(
            "credential file {} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PlotlineError::Config(format!("{key} must be a number ({e})"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path.display().to_string()
    }

    #[test]
    fn defaults_apply_when_only_key_file_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = HashMap::new();
        vars.insert("STARSCAPE_API_KEY_FILE", key_file(&dir, "key.txt", "  secret\n"));

        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.starscape_api_key, "secret");
        assert_eq!(config.atlas_api_key, None);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.poll_timeout, Duration::from_secs(600));
        assert_eq!(config.narrative_limit, 5);
        assert_eq!(config.early_complete_min, None);
        assert_eq!(config.output_dir, PathBuf::from("plotline_data"));
    }

    #[test]
    fn overrides_are_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = HashMap::new();
        vars.insert("STARSCAPE_API_KEY_FILE", key_file(&dir, "key.txt", "k"));
        vars.insert("ATLAS_API_KEY_FILE", key_file(&dir, "atlas.txt", "a"));
        vars.insert("PLOTLINE_POLL_TIMEOUT_SECS", "1800".to_string());
        vars.insert("PLOTLINE_NARRATIVE_LIMIT", "10".to_string());
        vars.insert("PLOTLINE_EARLY_COMPLETE_MIN", "5".to_string());

        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.atlas_api_key.as_deref(), Some("a"));
        assert_eq!(config.poll_timeout, Duration::from_secs(1800));
        assert_eq!(config.narrative_limit, 10);
        assert_eq!(config.early_complete_min, Some(5));
    }

    #[test]
    fn bad_number_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = HashMap::new();
        vars.insert("STARSCAPE_API_KEY_FILE", key_file(&dir, "key.txt", "k"));
        vars.insert("PLOTLINE_NARRATIVE_LIMIT", "five".to_string());

        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, PlotlineError::Config(msg) if msg.contains("PLOTLINE_NARRATIVE_LIMIT")));
    }

    #[test]
    fn missing_key_file_is_a_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt").display().to_string();
        let err = Config::from_lookup(|k| {
            (k == "STARSCAPE_API_KEY_FILE").then(|| missing.clone())
        })
        .unwrap_err();
        assert!(matches!(err, PlotlineError::Credential { .. }));
    }

    #[test]
    fn explicit_atlas_key_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = HashMap::new();
        vars.insert("STARSCAPE_API_KEY_FILE", key_file(&dir, "key.txt", "k"));
        vars.insert(
            "ATLAS_API_KEY_FILE",
            dir.path().join("missing.txt").display().to_string(),
        );

        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, PlotlineError::Credential { path, .. } if path.ends_with("missing.txt")));
    }

    #[test]
    fn explicit_empty_atlas_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = HashMap::new();
        vars.insert("STARSCAPE_API_KEY_FILE", key_file(&dir, "key.txt", "k"));
        vars.insert("ATLAS_API_KEY_FILE", key_file(&dir, "atlas.txt", "\n"));

        let err = Config::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, PlotlineError::Config(msg) if msg.contains("atlas.txt")));
    }

    #[test]
    fn empty_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = key_file(&dir, "key.txt", "   \n");
        assert!(matches!(
            read_credential(Path::new(&path)),
            Err(PlotlineError::Config(_))
        ));
    }
}
