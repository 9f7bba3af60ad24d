use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use crate::session::BrowserSession;

/// Failure-time artifact collector. Every capture is best-effort: a
/// scenario that already failed must not fail harder because the
/// browser refused a screenshot.
pub struct DiagnosticsSink {
    dir: PathBuf,
}

impl DiagnosticsSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Captures a screenshot and, where the engine exposes it, the
    /// browser console. Returns the paths that were actually written.
    pub async fn capture(&self, session: &BrowserSession, label: &str) -> Vec<PathBuf> {
        let mut written = Vec::new();
        if let Err(err) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %err, "cannot create artifacts dir");
            return written;
        }
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let base = format!("{label}-{}-{stamp}", session.kind());

        match session.screenshot().await {
            Ok(png) => {
                let path = self.dir.join(format!("{base}.png"));
                match tokio::fs::write(&path, png).await {
                    Ok(()) => {
                        info!(path = %path.display(), "screenshot captured");
                        written.push(path);
                    }
                    Err(err) => warn!(error = %err, "screenshot write failed"),
                }
            }
            Err(err) => warn!(error = %err, "screenshot capture failed"),
        }

        match session.console_log().await {
            Ok(lines) => {
                let path = self.dir.join(format!("{base}.console.log"));
                match tokio::fs::write(&path, lines.join("\n")).await {
                    Ok(()) => {
                        info!(path = %path.display(), "console log captured");
                        written.push(path);
                    }
                    Err(err) => warn!(error = %err, "console log write failed"),
                }
            }
            // Firefox has no console endpoint; silence is expected.
            Err(err) => warn!(error = %err, "console log unavailable"),
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_remembers_its_directory() {
        let sink = DiagnosticsSink::new("/tmp/bmc-artifacts");
        assert_eq!(sink.dir(), Path::new("/tmp/bmc-artifacts"));
    }
}
