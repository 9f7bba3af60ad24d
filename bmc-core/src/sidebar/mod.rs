mod frame;
mod items;

use std::sync::Arc;
use std::time::Duration;

use fantoccini::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::TimeoutSection;
use crate::error::{HarnessError, HarnessResult};
use crate::session::wait::{wait_displayed, wait_for_element, wait_until};
use crate::session::{BrowserSession, Locator};

pub use frame::{with_frame, FrameScope};
pub use items::{ItemSource, RegisteredItem};

/// DOM id of the iframe the extension injects into every page.
pub const SIDEPANEL_ID: &str = "BmcSidePanel";

const TOGGLE_BUTTON: &str = "hide-but";
const PANEL_STD: &str = "side-panel";
const PANEL_ADDER: &str = "side-panel-adder";
const ADDER_NAME_INPUT: &str = "#side-panel-adder > #bookmark-name";
const ADDER_CONFIRM: &str = "#side-panel-adder > #add-confirm.button-add";
const ADDER_ERROR: &str = "#side-panel-adder > #error-display";
const LIST_ITEMS: &str = "#manga-list .mangaListItem";
const ENTRY_LABELS: &str = ".label.rollingArrow";
const FILTER_INPUT: &str = "#side-panel > #searchbox";
const PANEL_LIST_ITEMS: &str = "#side-panel > #manga-list > .mangaListItem";

/// Controls the widget injected by the extension. Every DOM access
/// happens inside a [`FrameScope`], so the host page's browsing
/// context is restored after each operation.
pub struct SidebarController {
    session: Arc<BrowserSession>,
    timeouts: TimeoutSection,
}

impl SidebarController {
    /// Attaches to the widget frame, waiting (bounded) for the
    /// extension's content script to inject it.
    pub async fn attach(
        session: Arc<BrowserSession>,
        timeouts: TimeoutSection,
    ) -> HarnessResult<Self> {
        wait_for_element(
            session.client(),
            Locator::Id(SIDEPANEL_ID),
            Duration::from_secs(timeouts.dom_wait_secs),
            "widget frame",
        )
        .await?;
        Ok(Self { session, timeouts })
    }

    fn frame_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.frame_attach_secs)
    }

    fn dom_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.dom_wait_secs)
    }

    /// Whether the widget frame is present on the current page. The
    /// frame is the one marker that the extension loaded at all.
    pub async fn loaded(&self) -> HarnessResult<bool> {
        Ok(self
            .session
            .client()
            .find(Locator::Id(SIDEPANEL_ID))
            .await
            .is_ok())
    }

    /// Current frame size as `(width, height)`.
    pub async fn size(&self) -> HarnessResult<(f64, f64)> {
        let frame = self.session.find(Locator::Id(SIDEPANEL_ID)).await?;
        let (_x, _y, width, height) = frame.rectangle().await?;
        Ok((width, height))
    }

    /// Whether the widget is collapsed: neither the list view nor the
    /// registration view is displayed.
    pub async fn hidden(&self) -> HarnessResult<bool> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let std_panel =
                wait_for_element(&client, Locator::Id(PANEL_STD), dom, "list view").await?;
            let adder =
                wait_for_element(&client, Locator::Id(PANEL_ADDER), dom, "registration view")
                    .await?;
            Ok(!(std_panel.is_displayed().await? || adder.is_displayed().await?))
        })
        .await
    }

    /// Expands or collapses the widget and waits for the toggle
    /// button's label to flip, which marks the transition as complete.
    pub async fn toggle(&self) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let button =
                wait_displayed(&client, Locator::Id(TOGGLE_BUTTON), dom, "toggle button").await?;
            let before = button.text().await?;
            button.click().await?;
            let expected = if before == ">" { "<" } else { ">" };
            let client_ref = &client;
            wait_until(dom, "toggle label flip", move || async move {
                let button = client_ref.find(Locator::Id(TOGGLE_BUTTON)).await?;
                Ok((button.text().await? == expected).then_some(()))
            })
            .await
        })
        .await
    }

    /// Bounded wait for `elem_id`'s text to contain `expected`.
    pub async fn wait_for_text(&self, elem_id: &str, expected: &str) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let client_ref = &client;
            wait_until(dom, "expected widget text", move || async move {
                match client_ref.find(Locator::Id(elem_id)).await {
                    Ok(element) => {
                        Ok(element.text().await?.contains(expected).then_some(()))
                    }
                    Err(_) => Ok(None),
                }
            })
            .await
        })
        .await
    }

    /// Registers the current host page under `display_name`.
    ///
    /// With `expect_failure` the confirmation waits are skipped so the
    /// caller can inspect the error display instead.
    pub async fn register(&self, display_name: &str, expect_failure: bool) -> HarnessResult<()> {
        info!(name = display_name, expect_failure, "registering current page");
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            start_registration(&client, dom).await?;
            let input = client.find(Locator::Css(ADDER_NAME_INPUT)).await?;
            input.clear().await?;
            input.send_keys(display_name).await?;
            let confirm = client.find(Locator::Css(ADDER_CONFIRM)).await?;
            confirm.click().await?;
            if expect_failure {
                return Ok(());
            }
            wait_panel_visible(&client, dom).await?;
            let client_ref = &client;
            wait_until(dom, "registered entry in list", move || async move {
                for label in client_ref.find_all(Locator::Css(ENTRY_LABELS)).await? {
                    if label.text().await.unwrap_or_default() == display_name {
                        return Ok(Some(()));
                    }
                }
                Ok(None)
            })
            .await
        })
        .await
    }

    /// Checks the registration error display. With `wait_for_error`
    /// the call waits for a non-empty visible error; otherwise it
    /// requires the display to be hidden right now.
    pub async fn check_registration_error(&self, wait_for_error: bool) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            if !wait_for_error {
                let display = error_display_style(&client).await?;
                if display != "none" {
                    return Err(HarnessError::Structural(format!(
                        "error display unexpectedly visible (display: {display})"
                    )));
                }
                return Ok(());
            }
            let client_ref = &client;
            wait_until(dom, "registration error", move || async move {
                if error_display_style(client_ref).await? != "block" {
                    return Ok(None);
                }
                let element = client_ref.find(Locator::Css(ADDER_ERROR)).await?;
                Ok((!element.text().await?.is_empty()).then_some(()))
            })
            .await
        })
        .await
    }

    /// Types `text` into the list's search box, narrowing the entries
    /// shown to those whose names contain it.
    pub async fn filter(&self, text: &str) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let input =
                wait_for_element(&client, Locator::Css(FILTER_INPUT), dom, "filter input").await?;
            input.clear().await?;
            input.send_keys(text).await?;
            Ok(())
        })
        .await
    }

    /// Number of list entries currently displayed; filtered-out entries
    /// stay in the DOM but are hidden.
    pub async fn visible_entries(&self) -> HarnessResult<usize> {
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let mut visible = 0;
            for item in client.find_all(Locator::Css(PANEL_LIST_ITEMS)).await? {
                if item.is_displayed().await? {
                    visible += 1;
                }
            }
            Ok(visible)
        })
        .await
    }

    /// Snapshot of the registered comics currently listed.
    pub async fn get_registered(&self) -> HarnessResult<Vec<RegisteredItem>> {
        let dom = self.dom_timeout();
        let elements = with_frame(&self.session, self.frame_timeout(), |client| async move {
            wait_panel_visible(&client, dom).await?;
            Ok(client.find_all(Locator::Css(LIST_ITEMS)).await?)
        })
        .await?;
        Ok(elements
            .into_iter()
            .map(|element| {
                RegisteredItem::new(
                    Arc::clone(&self.session),
                    self.timeouts.clone(),
                    element,
                )
            })
            .collect())
    }

    /// Finds the entry named `name` and clicks its single source,
    /// loading the tracked page into the host tab.
    pub async fn load(&self, name: &str, wait_for_url_change: bool) -> HarnessResult<()> {
        let previous = self.session.current_url().await?;
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            wait_panel_visible(&client, dom).await?;
            let mut selected = Vec::new();
            for item in client.find_all(Locator::Css(LIST_ITEMS)).await? {
                let label = item.find(Locator::Css(".label-container .label")).await?;
                if label.text().await? == name {
                    selected.push(item);
                }
            }
            if selected.len() != 1 {
                return Err(HarnessError::Structural(format!(
                    "expected exactly one entry named '{name}', found {}",
                    selected.len()
                )));
            }
            let item = RegisteredItem::new(
                Arc::clone(&self.session),
                self.timeouts.clone(),
                selected.remove(0),
            );
            let sources = item.sources_nofocus().await?;
            if sources.len() != 1 {
                return Err(HarnessError::Structural(format!(
                    "expected exactly one source under '{name}', found {}",
                    sources.len()
                )));
            }
            sources[0].click_nofocus().await
        })
        .await?;

        if wait_for_url_change {
            let session = &self.session;
            let previous = &previous;
            wait_until(
                Duration::from_secs(self.timeouts.url_change_secs),
                "host url change",
                move || async move {
                    let current = session.current_url().await?;
                    Ok((current != *previous).then_some(()))
                },
            )
            .await?;
        }
        Ok(())
    }

    /// Waits for the toggle button to enter its notification state,
    /// which signals a completed storage operation.
    pub async fn wait_notification(&self) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let client_ref = &client;
            wait_until(dom, "notification start", move || async move {
                Ok(notification_active(client_ref).await?.then_some(()))
            })
            .await
        })
        .await
    }

    /// Waits for a full notification cycle: the state appears, then
    /// clears again.
    pub async fn wait_notification_done(&self) -> HarnessResult<()> {
        let dom = self.dom_timeout();
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            let client_ref = &client;
            wait_until(dom, "notification start", move || async move {
                Ok(notification_active(client_ref).await?.then_some(()))
            })
            .await?;
            wait_until(dom, "notification end", move || async move {
                Ok((!notification_active(client_ref).await?).then_some(()))
            })
            .await
        })
        .await
    }

    /// Clears a lingering notification marker so the next operation
    /// observes a fresh cycle.
    pub async fn reset_notification(&self) -> HarnessResult<()> {
        with_frame(&self.session, self.frame_timeout(), |client| async move {
            debug!("resetting notification marker");
            client
                .execute(
                    "var e = document.querySelector('.notif-transform'); \
                     if (e) { e.classList.remove('notif-transform'); }",
                    vec![],
                )
                .await?;
            Ok(())
        })
        .await
    }

    /// Runs `body` focused inside the widget frame. Escape hatch for
    /// scenarios needing DOM access beyond the controller surface.
    pub async fn focus<T, F, Fut>(&self, body: F) -> HarnessResult<T>
    where
        F: FnOnce(Client) -> Fut,
        Fut: std::future::Future<Output = HarnessResult<T>>,
    {
        with_frame(&self.session, self.frame_timeout(), body).await
    }
}

/// Clicks the `+` button and waits for the registration form. The
/// first click is occasionally swallowed while the widget animates, so
/// one re-click is attempted before giving up.
async fn start_registration(client: &Client, dom: Duration) -> HarnessResult<()> {
    let add_button =
        wait_displayed(client, Locator::Id("register-but"), dom, "register button").await?;
    add_button.click().await?;
    if wait_displayed(
        client,
        Locator::Css(ADDER_NAME_INPUT),
        Duration::from_secs(5),
        "registration form",
    )
    .await
    .is_err()
    {
        let add_button = client.find(Locator::Id("register-but")).await?;
        add_button.click().await?;
        wait_displayed(
            client,
            Locator::Css(ADDER_NAME_INPUT),
            Duration::from_secs(5),
            "registration form",
        )
        .await?;
    }
    Ok(())
}

/// The list view is shown only once the widget finished re-rendering.
async fn wait_panel_visible(client: &Client, dom: Duration) -> HarnessResult<()> {
    wait_displayed(client, Locator::Id(PANEL_STD), dom, "list view").await?;
    Ok(())
}

async fn notification_active(client: &Client) -> HarnessResult<bool> {
    let button = client.find(Locator::Id(TOGGLE_BUTTON)).await?;
    Ok(button
        .attr("class")
        .await?
        .unwrap_or_default()
        .contains("notif-transform"))
}

/// Computed `display` of the registration error element; `none` when
/// the element is absent altogether.
async fn error_display_style(client: &Client) -> HarnessResult<String> {
    let value = client
        .execute(
            "var e = document.querySelector(arguments[0]); \
             return e ? window.getComputedStyle(e).display : 'none';",
            vec![Value::String(ADDER_ERROR.to_string())],
        )
        .await?;
    Ok(value.as_str().unwrap_or("none").to_string())
}
