// Portal configuration
//
// Sources, lowest to highest precedence:
// - built-in defaults
// - optional TOML file (`consular-wizard.toml` next to the working directory, or `--config=<path>`)
// - environment variables `CONSULAR_WIZARD__<SECTION>__<KEY>` (e.g. `CONSULAR_WIZARD__SINK__KIND=http`)

use crate::wizard::{HttpSink, LoggingSink, SubmissionSink};
use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "consular-wizard.toml";
pub const ENV_PREFIX: &str = "CONSULAR_WIZARD";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub logging: LoggingConfig,
    pub sink: SinkConfig,
    /// TOML citizen profile used to prefill wizards.
    pub profile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Log,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Log,
            endpoint: None,
            token: None,
            timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    /// Load configuration from `path` (or the default file if present) plus environment
    /// overrides, then validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::build(path, true)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn build(path: Option<&Path>, with_env: bool) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {:?}", p);
                }
                builder = builder.add_source(config::File::from(p).required(true));
            }
            None => {
                builder = builder
                    .add_source(config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false));
            }
        }

        if with_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings = builder.build().context("Failed to read configuration")?;
        settings
            .try_deserialize::<PortalConfig>()
            .context("Configuration has invalid values")
    }

    pub fn validate(&self) -> Result<()> {
        self.level_filter()?;

        if self.sink.kind == SinkKind::Http {
            self.sink_endpoint()?;
            if self.sink.timeout_secs == 0 {
                anyhow::bail!("sink.timeout_secs must be a positive number of seconds");
            }
        }
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(self.logging.level.trim())
            .map_err(|_| anyhow::anyhow!("Unknown logging.level '{}'", self.logging.level))
    }

    fn sink_endpoint(&self) -> Result<Url> {
        let raw = self
            .sink
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("sink.endpoint is required when sink.kind = \"http\""))?;
        let url = Url::parse(raw).with_context(|| format!("sink.endpoint is not a URL: {}", raw))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            anyhow::bail!("sink.endpoint must use http or https (got {})", url.scheme());
        }
        Ok(url)
    }

    /// Construct the submission sink this configuration selects.
    pub fn build_sink(&self) -> Result<Box<dyn SubmissionSink>> {
        match self.sink.kind {
            SinkKind::Log => Ok(Box::new(LoggingSink)),
            SinkKind::Http => {
                let sink = HttpSink::new(
                    self.sink_endpoint()?,
                    self.sink.token.clone(),
                    Duration::from_secs(self.sink.timeout_secs),
                )?;
                Ok(Box::new(sink))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consular-wizard.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn defaults_use_logging_sink() {
        let cfg = PortalConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sink.kind, SinkKind::Log);
        assert_eq!(cfg.level_filter().unwrap(), LevelFilter::Info);
        assert_eq!(cfg.build_sink().unwrap().name(), "log");
    }

    #[test]
    fn file_values_are_loaded() {
        let (_dir, path) = write_config(
            r#"
profile_path = "/etc/consular/profile.toml"

[logging]
level = "debug"

[sink]
kind = "http"
endpoint = "https://portal.example/api/submissions"
token = "secret-token-value"
timeout_secs = 10
"#,
        );

        let cfg = PortalConfig::build(Some(&path), false).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.level_filter().unwrap(), LevelFilter::Debug);
        assert_eq!(cfg.sink.kind, SinkKind::Http);
        assert_eq!(cfg.sink.timeout_secs, 10);
        assert_eq!(
            cfg.profile_path.as_deref(),
            Some(Path::new("/etc/consular/profile.toml"))
        );
        assert_eq!(cfg.build_sink().unwrap().name(), "http");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let (_dir, path) = write_config("[logging]\nlevel = \"warn\"\n");
        let cfg = PortalConfig::build(Some(&path), false).unwrap();
        assert_eq!(cfg.sink.kind, SinkKind::Log);
        assert_eq!(cfg.sink.timeout_secs, 30);
        assert!(cfg.logging.directory.is_none());
    }

    #[test]
    fn http_sink_requires_endpoint() {
        let mut cfg = PortalConfig::default();
        cfg.sink.kind = SinkKind::Http;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("sink.endpoint"), "{}", err);
    }

    #[test]
    fn http_sink_rejects_non_http_scheme() {
        let mut cfg = PortalConfig::default();
        cfg.sink.kind = SinkKind::Http;
        cfg.sink.endpoint = Some("ftp://portal.example/in".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn http_sink_rejects_zero_timeout() {
        let mut cfg = PortalConfig::default();
        cfg.sink.kind = SinkKind::Http;
        cfg.sink.endpoint = Some("https://portal.example/in".to_string());
        cfg.sink.timeout_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = PortalConfig::default();
        cfg.logging.level = "chatty".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PortalConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"), "{}", err);
    }

    /// Removes the variables it set when dropped, so a failing assertion cannot leak them.
    struct EnvVars(Vec<&'static str>);

    impl EnvVars {
        fn set(pairs: &[(&'static str, &str)]) -> Self {
            for (key, value) in pairs {
                std::env::set_var(key, value);
            }
            Self(pairs.iter().map(|(k, _)| *k).collect())
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in &self.0 {
                std::env::remove_var(key);
            }
        }
    }

    // The only test that reads CONSULAR_WIZARD__* variables; every other test builds
    // without the environment source.
    #[test]
    fn environment_overrides_file_values() {
        let (_dir, path) = write_config(
            r#"
[logging]
level = "warn"

[sink]
kind = "log"
timeout_secs = 10
"#,
        );

        let _vars = EnvVars::set(&[
            ("CONSULAR_WIZARD__SINK__KIND", "http"),
            ("CONSULAR_WIZARD__SINK__ENDPOINT", "https://portal.example/api/in"),
            ("CONSULAR_WIZARD__SINK__TOKEN", "12345"),
            ("CONSULAR_WIZARD__SINK__TIMEOUT_SECS", "45"),
        ]);

        let cfg = PortalConfig::build(Some(&path), true).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.sink.kind, SinkKind::Http);
        assert_eq!(
            cfg.sink.endpoint.as_deref(),
            Some("https://portal.example/api/in")
        );
        // Numeric-looking values still land in string fields.
        assert_eq!(cfg.sink.token.as_deref(), Some("12345"));
        assert_eq!(cfg.sink.timeout_secs, 45);
        // Keys not set in the environment keep the file value.
        assert_eq!(cfg.level_filter().unwrap(), LevelFilter::Warn);
        assert_eq!(cfg.build_sink().unwrap().name(), "http");
    }
}
