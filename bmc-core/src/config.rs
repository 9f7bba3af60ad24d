use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HarnessError, HarnessResult};

/// Harness-wide configuration, loadable from TOML with sane defaults.
///
/// Environment overrides (`WEBEXT_DIR`, `HOME`, `BMC_WEBSITE_CMD`) are
/// applied by [`HarnessConfig::apply_env`] after deserialization so a
/// config file never shadows the CI environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    pub selection: SelectionSection,
    pub extension: ExtensionSection,
    pub timeouts: TimeoutSection,
    pub retry: RetrySection,
    pub website: WebsiteSection,
    pub downloads: DownloadSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    /// Engine kinds to exercise. Empty means "all known kinds".
    pub browsers: Vec<String>,
    /// Reader drivers to exercise. Empty means "all known readers".
    pub readers: Vec<String>,
    pub headless: bool,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            browsers: Vec::new(),
            readers: Vec::new(),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExtensionSection {
    /// Directory holding the unpacked web-extension sources.
    pub unpacked_dir: Option<PathBuf>,
    /// Directory searched for the packaged `{name}-{version}.zip`.
    /// Overridden by `WEBEXT_DIR`; falls back to `./build`.
    pub archive_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    /// Bounded wait for the widget frame to become attachable.
    pub frame_attach_secs: u64,
    /// Default bounded wait for DOM conditions inside the widget.
    pub dom_wait_secs: u64,
    /// Bounded wait for the host URL to change after a load click.
    pub url_change_secs: u64,
    /// Bounded wait for the WebDriver server to report ready.
    pub driver_ready_secs: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            frame_attach_secs: 30,
            dom_wait_secs: 10,
            url_change_secs: 10,
            driver_ready_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: usize,
    pub backoff_ms: u64,
    /// Treat automation-layer timeouts as transient inside wrapped calls.
    pub retry_timeouts: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 1000,
            retry_timeouts: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebsiteSection {
    /// Command used to spawn the disposable reference website.
    pub command: Vec<String>,
    pub base_url: String,
    /// Echo the website's captured output after a run.
    pub dbg_output: bool,
}

impl Default for WebsiteSection {
    fn default() -> Self {
        Self {
            command: vec![
                "python3".to_string(),
                "static-website/server.py".to_string(),
            ],
            base_url: "http://localhost:5000".to_string(),
            dbg_output: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DownloadSection {
    /// Directory polled for exported files. Defaults to
    /// `$HOME/Downloads` once env overrides are applied.
    pub dir: Option<PathBuf>,
    pub poll_secs: u64,
}

impl HarnessConfig {
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("WEBEXT_DIR") {
            if !dir.is_empty() {
                self.extension.archive_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(cmd) = std::env::var("BMC_WEBSITE_CMD") {
            if !cmd.is_empty() {
                self.website.command = cmd.split_whitespace().map(str::to_string).collect();
            }
        }
        if self.downloads.dir.is_none() {
            if let Ok(home) = std::env::var("HOME") {
                self.downloads.dir = Some(Path::new(&home).join("Downloads"));
            }
        }
        if self.downloads.poll_secs == 0 {
            self.downloads.poll_secs = 120;
        }
    }
}

pub fn load_harness_config<P: AsRef<Path>>(path: P) -> HarnessResult<HarnessConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|err| HarnessError::Configuration(format!("{}: {err}", path.display())))?
    } else {
        HarnessConfig::default()
    };
    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = HarnessConfig::default();
        assert!(config.selection.browsers.is_empty());
        assert!(config.selection.headless);
        assert_eq!(config.timeouts.frame_attach_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_ms, 1000);
    }

    #[test]
    fn toml_sections_deserialize() {
        let raw = r#"
            [selection]
            browsers = ["firefox"]
            readers = ["localhost"]
            headless = false

            [retry]
            max_attempts = 3
            backoff_ms = 250
        "#;
        let config: HarnessConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.selection.browsers, vec!["firefox"]);
        assert!(!config.selection.headless);
        assert_eq!(config.retry.max_attempts, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.timeouts.dom_wait_secs, 10);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_harness_config("/nonexistent/bmc.toml").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.downloads.poll_secs, 120);
    }
}
