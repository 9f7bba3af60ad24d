use std::process::Stdio;
use std::time::Duration;

use fantoccini::wd::WebDriverCompatibleCommand;
use serde_json::json;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

use super::engine::EngineKind;

/// One OS-level WebDriver server process (geckodriver/chromedriver),
/// owned by the session that launched it.
#[derive(Debug)]
pub struct WebDriverServer {
    kind: EngineKind,
    base_url: String,
    child: Mutex<Option<Child>>,
}

impl WebDriverServer {
    pub async fn spawn(kind: EngineKind, ready_timeout: Duration) -> HarnessResult<Self> {
        let port = kind.driver_port();
        let base_url = format!("http://localhost:{port}");
        let mut command = Command::new(kind.driver_binary());
        match kind {
            EngineKind::Firefox => {
                command.arg("--port").arg(port.to_string());
            }
            EngineKind::Chrome => {
                command.arg(format!("--port={port}"));
            }
        }
        command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let child = command.spawn().map_err(|err| {
            HarnessError::Launch(format!("cannot spawn {}: {err}", kind.driver_binary()))
        })?;
        info!(kind = %kind, port, "spawned webdriver server");

        let server = Self {
            kind,
            base_url,
            child: Mutex::new(Some(child)),
        };
        server.wait_ready(ready_timeout).await?;
        Ok(server)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn wait_ready(&self, timeout: Duration) -> HarnessResult<()> {
        let status_url = format!("{}/status", self.base_url);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match reqwest::get(&status_url).await {
                Ok(response) if response.status().is_success() => {
                    debug!(kind = %self.kind, "webdriver server ready");
                    return Ok(());
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(HarnessError::Launch(format!(
                    "{} did not become ready on {}",
                    self.kind.driver_binary(),
                    self.base_url
                )));
            }
            sleep(Duration::from_millis(200)).await;
        }
    }

    /// Kills the server process. Safe to call more than once.
    pub async fn shutdown(&self) {
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            if let Err(err) = child.kill().await {
                warn!(kind = %self.kind, error = %err, "failed to kill webdriver server");
            }
        }
    }
}

/// geckodriver vendor command installing a packaged addon into the
/// running session (`POST /session/{id}/moz/addon/install`).
#[derive(Debug)]
pub struct InstallAddon {
    pub path: String,
    pub temporary: bool,
}

impl WebDriverCompatibleCommand for InstallAddon {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!(
            "session/{}/moz/addon/install",
            session_id.unwrap_or_default()
        ))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (
            http::Method::POST,
            Some(json!({ "path": self.path, "temporary": self.temporary }).to_string()),
        )
    }
}

/// chromedriver extension command dumping the browser console
/// (`POST /session/{id}/se/log` with `{"type": "browser"}`).
#[derive(Debug)]
pub struct GetBrowserLog;

impl WebDriverCompatibleCommand for GetBrowserLog {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!("session/{}/se/log", session_id.unwrap_or_default()))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (http::Method::POST, Some(json!({ "type": "browser" }).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_addon_targets_the_moz_vendor_endpoint() {
        let cmd = InstallAddon {
            path: "/tmp/bookmycomics-0.0.1.zip".into(),
            temporary: true,
        };
        let base = url::Url::parse("http://localhost:4444/").unwrap();
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        assert_eq!(
            endpoint.as_str(),
            "http://localhost:4444/session/abc123/moz/addon/install"
        );
        let (method, body) = cmd.method_and_body(&endpoint);
        assert_eq!(method, http::Method::POST);
        let body: serde_json::Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["temporary"], true);
    }

    #[test]
    fn browser_log_uses_the_selenium_log_endpoint() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let endpoint = GetBrowserLog.endpoint(&base, Some("xyz")).unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:9515/session/xyz/se/log");
    }
}
