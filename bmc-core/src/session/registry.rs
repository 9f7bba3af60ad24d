use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::extension::ExtensionBundle;

use super::browser::BrowserSession;
use super::engine::EngineKind;

static GLOBAL: Lazy<SessionRegistry> = Lazy::new(SessionRegistry::new);

/// Process-wide cache of one [`BrowserSession`] per engine kind.
///
/// Sessions are created lazily on first request and released exactly
/// once at process teardown; launching a browser is far too expensive
/// to do per test.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<EngineKind, Arc<BrowserSession>>>,
}

impl SessionRegistry {
    fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static SessionRegistry {
        &GLOBAL
    }

    /// Returns the cached session for `kind`, launching it on first
    /// call with the engine-specific startup options.
    pub async fn get(
        &self,
        kind: EngineKind,
        config: &HarnessConfig,
        extension: &ExtensionBundle,
    ) -> HarnessResult<Arc<BrowserSession>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(&kind) {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(BrowserSession::launch(kind, config, extension).await?);
        sessions.insert(kind, Arc::clone(&session));
        Ok(session)
    }

    /// Quits every cached session. Idempotent; meant for the
    /// test-runner's session-end hook, failing tests included.
    pub async fn release_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (kind, session) in sessions.drain() {
            info!(kind = %kind, "releasing browser session");
            session.shutdown().await;
        }
    }

    /// Number of live sessions, for teardown assertions.
    pub async fn live_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
