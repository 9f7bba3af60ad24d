use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::TimeoutSection;
use crate::error::HarnessResult;
use crate::session::wait::{wait_for_element, wait_until};
use crate::session::{BrowserSession, Locator};

const IMPORT_FILE_INPUT: &str = "import-file";
const IMPORT_SUBMIT: &str = "storage-import-submit";
const IMPORT_FORM: &str = "storage-import-form";
const EXPORT_BUTTON: &str = "storage-exporter";

/// Drives the extension's options page, which hosts the storage
/// import/export forms. The page is extension-internal, so engines
/// without internal-page access surface `Unsupported` from [`open`].
///
/// [`open`]: OptionsController::open
pub struct OptionsController {
    session: Arc<BrowserSession>,
    timeouts: TimeoutSection,
}

impl OptionsController {
    pub fn new(session: Arc<BrowserSession>, timeouts: TimeoutSection) -> Self {
        Self { session, timeouts }
    }

    fn dom_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.dom_wait_secs)
    }

    /// Navigates to the options page. The extension origin is resolved
    /// from the widget frame, so a host page must be loaded first.
    pub async fn open(&self) -> HarnessResult<()> {
        self.session.open_internal_page("options").await
    }

    /// Imports a tracking payload from `path` through the file input
    /// and waits for the storage operation to complete.
    pub async fn import_payload(&self, path: &Path) -> HarnessResult<()> {
        // The file input resolves relative paths against the browser's
        // working directory, not ours.
        let path = path.canonicalize()?;
        info!(path = %path.display(), "importing tracking payload");
        let input = wait_for_element(
            self.session.client(),
            Locator::Id(IMPORT_FILE_INPUT),
            self.dom_timeout(),
            "import file input",
        )
        .await?;
        input.send_keys(&path.to_string_lossy()).await?;
        let submit = self.session.find(Locator::Id(IMPORT_SUBMIT)).await?;
        submit.click().await?;
        self.wait_form_notification(IMPORT_FORM).await
    }

    /// Clicks the exporter, which downloads the current tracking state
    /// as `bmc-data.json`. Completion is observed through the download
    /// directory, see `storage::wait_for_download`.
    pub async fn trigger_export(&self) -> HarnessResult<()> {
        info!("triggering tracking payload export");
        let button = self.session.find(Locator::Id(EXPORT_BUTTON)).await?;
        button.click().await?;
        Ok(())
    }

    /// Bounded wait for the completion marker the page drops on a form
    /// once its storage operation finished.
    async fn wait_form_notification(&self, form_id: &'static str) -> HarnessResult<()> {
        let client = self.session.client();
        wait_until(
            self.dom_timeout(),
            "storage operation notification",
            move || async move {
                let form = client.find(Locator::Id(form_id)).await?;
                Ok(form
                    .attr("class")
                    .await?
                    .unwrap_or_default()
                    .contains("notif-transform")
                    .then_some(()))
            },
        )
        .await
    }
}
