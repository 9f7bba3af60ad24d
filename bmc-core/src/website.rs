use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::WebsiteSection;
use crate::error::{HarnessError, HarnessResult};

const READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Output captured from the reference website process over its whole
/// lifetime, returned by [`ReferenceWebsite::stop`].
pub struct WebsiteOutput {
    pub stdout: String,
    pub stderr: String,
}

/// The disposable reference website, run as a child process for the
/// `localhost` reader. Output is captured rather than inherited so a
/// runner can echo it after the fact.
pub struct ReferenceWebsite {
    child: Child,
    base_url: String,
}

impl ReferenceWebsite {
    /// Spawns the configured server command and waits (bounded) until
    /// its base URL answers.
    pub async fn start(section: &WebsiteSection) -> HarnessResult<Self> {
        let (program, args) = section.command.split_first().ok_or_else(|| {
            HarnessError::Configuration("empty reference website command".to_string())
        })?;
        info!(command = %section.command.join(" "), "starting reference website");
        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                HarnessError::Launch(format!("reference website '{program}': {err}"))
            })?;
        let website = Self {
            child,
            base_url: section.base_url.clone(),
        };
        website.wait_ready().await?;
        Ok(website)
    }

    async fn wait_ready(&self) -> HarnessResult<()> {
        let deadline = Instant::now() + READY_TIMEOUT;
        loop {
            match reqwest::get(&self.base_url).await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %self.base_url, "reference website ready");
                    return Ok(());
                }
                Ok(response) => {
                    debug!(url = %self.base_url, status = %response.status(), "not ready yet")
                }
                Err(err) => debug!(url = %self.base_url, error = %err, "not reachable yet"),
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::Launch(format!(
                    "reference website never answered at {}",
                    self.base_url
                )));
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Kills the server and drains its captured output.
    pub async fn stop(self) -> HarnessResult<WebsiteOutput> {
        let Self { mut child, .. } = self;
        if let Err(err) = child.start_kill() {
            warn!(error = %err, "reference website already gone");
        }
        let output = child.wait_with_output().await?;
        Ok(WebsiteOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
