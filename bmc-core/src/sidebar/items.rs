use std::sync::Arc;
use std::time::Duration;

use fantoccini::actions::{InputSource, MouseActions, PointerAction, MOUSE_BUTTON_LEFT};
use fantoccini::Client;

use crate::config::TimeoutSection;
use crate::error::HarnessResult;
use crate::session::wait::wait_until;
use crate::session::{BrowserSession, Element, Locator};

use super::frame::with_frame;

const FOLD_MARKER: &str = ".label-container > .label.rollingArrow";
const SOURCE_ROWS: &str = ".nested > .label-container";
const OWN_LABEL: &str = ":not(.nested) > .label-container .label";
const OWN_TRASH: &str = ":not(.nested) > .label-container .fa-trash";

/// One registered comic row in the widget's list. Wraps a live element
/// handle; handles go stale on re-render, so callers re-fetch the list
/// through the controller after mutating operations.
pub struct RegisteredItem {
    session: Arc<BrowserSession>,
    timeouts: TimeoutSection,
    element: Element,
}

impl RegisteredItem {
    pub(super) fn new(
        session: Arc<BrowserSession>,
        timeouts: TimeoutSection,
        element: Element,
    ) -> Self {
        Self {
            session,
            timeouts,
            element,
        }
    }

    fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.frame_attach_secs)
    }

    pub async fn name(&self) -> HarnessResult<String> {
        with_frame(&self.session, self.frame_timeout(), |_client| async move {
            self.element.find(Locator::Css(FOLD_MARKER)).await?.text().await.map_err(Into::into)
        })
        .await
    }

    /// Whether the item's source rows are rolled up.
    pub async fn folded(&self) -> HarnessResult<bool> {
        with_frame(&self.session, self.frame_timeout(), |_client| async move {
            self.folded_nofocus().await
        })
        .await
    }

    /// Folds or unfolds the source rows.
    pub async fn toggle_fold(&self) -> HarnessResult<()> {
        with_frame(&self.session, self.frame_timeout(), |_client| async move {
            self.toggle_fold_nofocus().await
        })
        .await
    }

    /// The item's source rows, unfolding first when needed.
    pub async fn sources(&self) -> HarnessResult<Vec<ItemSource>> {
        with_frame(&self.session, self.frame_timeout(), |_client| async move {
            self.sources_nofocus().await
        })
        .await
    }

    /// Deletes the whole item through its trash button. The button
    /// only becomes clickable under hover, hence the pointer chain.
    pub async fn delete(&self) -> HarnessResult<()> {
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let label = self.element.find(Locator::Css(OWN_LABEL)).await?;
            let trash = self.element.find(Locator::Css(OWN_TRASH)).await?;
            hover_and_click(client, label, trash).await
        })
        .await
    }

    /// Bounded wait for the row to disappear from the list after a
    /// delete was triggered.
    pub async fn wait_for_removal(&self) -> HarnessResult<()> {
        let timeout = Duration::from_secs(self.timeouts.dom_wait_secs);
        with_frame(&self.session, self.frame_timeout(), |_client| async move {
            wait_until(timeout, "item removal", move || async move {
                // A stale handle means the row left the DOM.
                match self.element.attr("class").await {
                    Ok(_) => Ok(None),
                    Err(_) => Ok(Some(())),
                }
            })
            .await
        })
        .await
    }

    pub(super) async fn folded_nofocus(&self) -> HarnessResult<bool> {
        let marker = self.element.find(Locator::Css(FOLD_MARKER)).await?;
        let class = marker.attr("class").await?.unwrap_or_default();
        Ok(!class.contains("rollingArrow-down"))
    }

    pub(super) async fn toggle_fold_nofocus(&self) -> HarnessResult<()> {
        let marker = self.element.find(Locator::Css(FOLD_MARKER)).await?;
        marker.click().await?;
        Ok(())
    }

    pub(super) async fn sources_nofocus(&self) -> HarnessResult<Vec<ItemSource>> {
        if self.folded_nofocus().await? {
            self.toggle_fold_nofocus().await?;
        }
        let rows = self.element.find_all(Locator::Css(SOURCE_ROWS)).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                ItemSource::new(
                    Arc::clone(&self.session),
                    self.timeouts.clone(),
                    row,
                )
            })
            .collect())
    }
}

/// One source row under a registered comic.
pub struct ItemSource {
    session: Arc<BrowserSession>,
    timeouts: TimeoutSection,
    element: Element,
}

impl ItemSource {
    pub(super) fn new(
        session: Arc<BrowserSession>,
        timeouts: TimeoutSection,
        element: Element,
    ) -> Self {
        Self {
            session,
            timeouts,
            element,
        }
    }

    /// Clicks the source label, loading the tracked page into the host
    /// tab.
    pub async fn click(&self) -> HarnessResult<()> {
        let frame_timeout = Duration::from_secs(self.timeouts.frame_attach_secs);
        with_frame(&self.session, frame_timeout, |_client| async move {
            self.click_nofocus().await
        })
        .await
    }

    pub(super) async fn click_nofocus(&self) -> HarnessResult<()> {
        self.element
            .find(Locator::Css(".label"))
            .await?
            .click()
            .await?;
        Ok(())
    }

    /// Deletes this single source through its hover-revealed trash
    /// button.
    pub async fn delete(&self) -> HarnessResult<()> {
        let frame_timeout = Duration::from_secs(self.timeouts.frame_attach_secs);
        with_frame(&self.session, frame_timeout, |client| async move {
            let label = self.element.find(Locator::Css(".label")).await?;
            let trash = self.element.find(Locator::Css(".fa-trash")).await?;
            hover_and_click(client, label, trash).await
        })
        .await
    }
}

/// Hover over `reveal`, then over `target`, then click `target`. Used
/// for the trash buttons, which stay hidden until their row is hovered.
async fn hover_and_click(
    mut client: Client,
    reveal: Element,
    target: Element,
) -> HarnessResult<()> {
    let chain = MouseActions::new("mouse".to_string())
        .then(PointerAction::MoveToElement {
            element: reveal,
            duration: None,
            x: 0,
            y: 0,
        })
        .then(PointerAction::MoveToElement {
            element: target,
            duration: None,
            x: 0,
            y: 0,
        })
        .then(PointerAction::Down {
            button: MOUSE_BUTTON_LEFT,
        })
        .then(PointerAction::Up {
            button: MOUSE_BUTTON_LEFT,
        });
    client.perform_actions(chain).await?;
    Ok(())
}
