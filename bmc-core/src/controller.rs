use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::config::TimeoutSection;
use crate::error::{HarnessError, HarnessResult};
use crate::readers::{load_random_retrying, NavigationPredicate, ReaderDriver};
use crate::retry::RetryPolicy;
use crate::session::BrowserSession;
use crate::sidebar::SidebarController;

/// Per-scenario facade over one browser session: resolves the widget
/// controller lazily and owns the between-scenario reset.
///
/// The widget frame is re-injected on every page load, so the cached
/// controller must be dropped whenever the host page changes; see
/// [`SessionController::refresh`].
pub struct SessionController {
    session: Arc<BrowserSession>,
    timeouts: TimeoutSection,
    sidebar: Mutex<Option<Arc<SidebarController>>>,
}

impl SessionController {
    pub fn new(session: Arc<BrowserSession>, timeouts: TimeoutSection) -> Self {
        Self {
            session,
            timeouts,
            sidebar: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// The widget controller for the current page, attaching on first
    /// use.
    pub async fn sidebar(&self) -> HarnessResult<Arc<SidebarController>> {
        let mut cached = self.sidebar.lock().await;
        if let Some(sidebar) = cached.as_ref() {
            return Ok(Arc::clone(sidebar));
        }
        let sidebar = Arc::new(
            SidebarController::attach(Arc::clone(&self.session), self.timeouts.clone()).await?,
        );
        *cached = Some(Arc::clone(&sidebar));
        Ok(sidebar)
    }

    /// Drops the cached widget controller; element handles inside it
    /// are stale after any host page navigation.
    pub async fn refresh(&self) {
        *self.sidebar.lock().await = None;
    }

    pub async fn register(&self, display_name: &str, expect_failure: bool) -> HarnessResult<()> {
        self.sidebar().await?.register(display_name, expect_failure).await
    }

    /// Between-scenario reset: drop cached state and wipe the
    /// extension's persisted storage so scenarios cannot bleed into
    /// each other. The wipe runs focused inside the widget frame,
    /// where the storage bridge is reachable.
    pub async fn reset(&self) -> HarnessResult<()> {
        self.refresh().await;
        let sidebar = self.sidebar().await?;
        let session = Arc::clone(&self.session);
        sidebar
            .focus(|_client| async move { session.clear_local_state().await })
            .await?;
        self.refresh().await;
        Ok(())
    }

    /// Standard scenario opening: load a random page on `reader`, then
    /// make sure the widget is present and expanded.
    pub async fn open_on_random_page(
        &self,
        reader: &dyn ReaderDriver,
        policy: &RetryPolicy,
        predicate: Option<&dyn NavigationPredicate>,
    ) -> HarnessResult<()> {
        load_random_retrying(reader, policy, predicate).await?;
        self.refresh().await;
        let sidebar = self.sidebar().await?;
        if !sidebar.loaded().await? {
            return Err(HarnessError::Structural(
                "widget frame absent after navigation".to_string(),
            ));
        }
        if sidebar.hidden().await? {
            info!(reader = reader.name(), "expanding collapsed widget");
            sidebar.toggle().await?;
        }
        if sidebar.hidden().await? {
            return Err(HarnessError::Structural(
                "widget still hidden after toggle".to_string(),
            ));
        }
        Ok(())
    }
}
