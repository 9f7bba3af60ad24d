use std::future::Future;
use std::time::Duration;

use fantoccini::{Client, Locator};
use tracing::warn;

use crate::error::HarnessResult;
use crate::session::wait::wait_for_element;
use crate::session::BrowserSession;

use super::SIDEPANEL_ID;

/// Focus guard for the widget iframe. Entering switches the WebDriver
/// browsing context into the frame; [`FrameScope::exit`] switches back
/// to the parent. The session tracks scope state so that nested entry
/// fails fast instead of silently re-targeting the wrong document.
pub struct FrameScope<'a> {
    session: &'a BrowserSession,
    client: Client,
    active: bool,
}

impl<'a> FrameScope<'a> {
    /// Waits for the widget frame to be attached (bounded), then
    /// switches into it.
    pub async fn enter(
        session: &'a BrowserSession,
        timeout: Duration,
    ) -> HarnessResult<FrameScope<'a>> {
        let frame = wait_for_element(
            session.client(),
            Locator::Id(SIDEPANEL_ID),
            timeout,
            "widget frame",
        )
        .await?;
        session.begin_frame_scope()?;
        match frame.enter_frame().await {
            Ok(()) => Ok(FrameScope {
                session,
                client: session.client().clone(),
                active: true,
            }),
            Err(err) => {
                session.end_frame_scope();
                Err(err.into())
            }
        }
    }

    /// Handle targeting the frame's document.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Switches back to the parent document and releases the scope.
    pub async fn exit(mut self) -> HarnessResult<()> {
        self.active = false;
        let result = self.client.clone().enter_parent_frame().await;
        self.session.end_frame_scope();
        result?;
        Ok(())
    }
}

impl Drop for FrameScope<'_> {
    fn drop(&mut self) {
        if self.active {
            // Cannot switch contexts from a sync drop; the session is
            // left focused on the frame and the flag cleared so the
            // next scope can recover.
            warn!("frame scope dropped without exit, context left inside the widget frame");
            self.session.end_frame_scope();
        }
    }
}

/// Runs `body` with the browsing context focused inside the widget
/// frame, restoring the parent context afterwards whether or not the
/// body succeeded.
pub async fn with_frame<T, F, Fut>(
    session: &BrowserSession,
    timeout: Duration,
    body: F,
) -> HarnessResult<T>
where
    F: FnOnce(Client) -> Fut,
    Fut: Future<Output = HarnessResult<T>>,
{
    let scope = FrameScope::enter(session, timeout).await?;
    let result = body(scope.client().clone()).await;
    let exited = scope.exit().await;
    let value = result?;
    exited?;
    Ok(value)
}
