use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fantoccini::actions::{InputSource, MouseActions, PointerAction};
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Value};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::extension::ExtensionBundle;

use super::engine::EngineKind;
use super::webdriver::{GetBrowserLog, InstallAddon, WebDriverServer};

/// One live browser with the extension installed, wrapping the native
/// automation handle for its engine.
///
/// Engine-specific behavior is confined to the capability methods
/// (`ensure_click`, `clear_local_state`, `open_internal_page`,
/// `console_log`); everything else is uniform WebDriver plumbing.
pub struct BrowserSession {
    kind: EngineKind,
    client: Client,
    server: WebDriverServer,
    // Chrome refuses profile reuse across sessions; keep the tempdir
    // alive for as long as the browser runs.
    _profile_dir: Option<TempDir>,
    in_frame: AtomicBool,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession")
            .field("kind", &self.kind)
            .finish()
    }
}

impl BrowserSession {
    pub async fn launch(
        kind: EngineKind,
        config: &HarnessConfig,
        extension: &ExtensionBundle,
    ) -> HarnessResult<Self> {
        let server = WebDriverServer::spawn(
            kind,
            Duration::from_secs(config.timeouts.driver_ready_secs),
        )
        .await?;

        let mut profile_dir = None;
        let mut caps = serde_json::Map::new();
        match kind {
            EngineKind::Firefox => {
                let mut args: Vec<String> = Vec::new();
                if config.selection.headless {
                    args.push("-headless".to_string());
                }
                caps.insert("moz:firefoxOptions".to_string(), json!({ "args": args }));
            }
            EngineKind::Chrome => {
                let profile = tempfile::Builder::new().prefix("bmc-chrome-").tempdir()?;
                let mut args = vec!["--no-sandbox".to_string()];
                if config.selection.headless {
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                // driver.get() can hang mid-navigation on some readers
                // without this.
                args.push("--disable-browser-side-navigation".to_string());
                args.push(format!(
                    "--load-extension={}",
                    extension.unpacked_path().display()
                ));
                args.push(format!("--user-data-dir={}", profile.path().display()));
                caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
                caps.insert("goog:loggingPrefs".to_string(), json!({ "browser": "ALL" }));
                profile_dir = Some(profile);
            }
        }

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(server.base_url())
            .await?;

        if kind == EngineKind::Firefox {
            info!(
                kind = %kind,
                addon = %extension.packed_path().display(),
                "installing packaged addon"
            );
            client
                .issue_cmd(InstallAddon {
                    path: extension.packed_path().display().to_string(),
                    temporary: true,
                })
                .await?;
        } else {
            info!(
                kind = %kind,
                addon = %extension.unpacked_path().display(),
                "loading unpacked extension"
            );
        }

        Ok(Self {
            kind,
            client,
            server,
            _profile_dir: profile_dir,
            in_frame: AtomicBool::new(false),
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The raw automation handle, for call sites that need DOM access
    /// beyond the capability surface.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn goto(&self, url: &str) -> HarnessResult<()> {
        debug!(kind = %self.kind, url, "navigating");
        self.client.goto(url).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> HarnessResult<url::Url> {
        Ok(self.client.current_url().await?)
    }

    pub async fn refresh(&self) -> HarnessResult<()> {
        self.client.refresh().await?;
        Ok(())
    }

    pub async fn find(&self, locator: Locator<'_>) -> HarnessResult<Element> {
        Ok(self.client.find(locator).await?)
    }

    pub async fn find_all(&self, locator: Locator<'_>) -> HarnessResult<Vec<Element>> {
        Ok(self.client.find_all(locator).await?)
    }

    pub async fn execute(&self, script: &str, args: Vec<Value>) -> HarnessResult<Value> {
        Ok(self.client.execute(script, args).await?)
    }

    /// Brings `element` into a clickable position. The mechanism is
    /// engine-specific; the contract is that a click attempt right
    /// after this call lands on the element.
    pub async fn ensure_click(&self, element: &Element) -> HarnessResult<()> {
        match self.kind {
            EngineKind::Chrome => {
                // Chromedriver honors a pointer hover, which scrolls
                // the target into view as a side effect.
                let hover = MouseActions::new("mouse".to_string()).then(
                    PointerAction::MoveToElement {
                        element: element.clone(),
                        duration: None,
                        x: 0,
                        y: 0,
                    },
                );
                let mut client = self.client.clone();
                client.perform_actions(hover).await?;
            }
            EngineKind::Firefox => {
                // geckodriver ignores hover-scrolling; center the
                // element in the viewport by hand.
                let (x, y, _w, _h) = element.rectangle().await?;
                let size = self
                    .client
                    .execute("return [window.innerWidth, window.innerHeight];", vec![])
                    .await?;
                let width = size
                    .get(0)
                    .and_then(Value::as_f64)
                    .unwrap_or(1024.0);
                let height = size
                    .get(1)
                    .and_then(Value::as_f64)
                    .unwrap_or(768.0);
                let script =
                    format!("window.scrollTo({}, {});", x - width / 2.0, y - height / 2.0);
                self.client.execute(&script, vec![]).await?;
            }
        }
        Ok(())
    }

    /// `ensure_click` followed by the click itself.
    pub async fn click(&self, element: &Element) -> HarnessResult<()> {
        self.ensure_click(element).await?;
        element.click().await?;
        Ok(())
    }

    /// Clears the extension's persisted storage, both tiers. A missing
    /// storage bridge is a no-op, not an error; not every engine
    /// exposes the same API surface to content scripts.
    pub async fn clear_local_state(&self) -> HarnessResult<()> {
        let scripts: [&str; 2] = match self.kind {
            EngineKind::Chrome => [
                "(chrome || window.chrome || browser || window.browser).storage.local.clear(()=>{});",
                "(chrome || window.chrome || browser || window.browser).storage.sync.clear(()=>{});",
            ],
            EngineKind::Firefox => [
                "(chrome || window.chrome || browser || window.browser).storage.local.clear().catch(e=>{}).then(()=>{});",
                "(chrome || window.chrome || browser || window.browser).storage.sync.clear().catch(e=>{}).then(()=>{});",
            ],
        };
        for script in scripts {
            if let Err(err) = self.client.execute(script, vec![]).await {
                debug!(kind = %self.kind, error = %err, "storage bridge unavailable, skipping clear");
            }
        }
        Ok(())
    }

    /// Navigates to an extension-internal page, e.g. `settings`.
    ///
    /// Firefox exposes the extension origin through the widget frame's
    /// `src`; chromedriver cannot reach extension pages in this setup
    /// and reports the capability as unsupported.
    pub async fn open_internal_page(&self, name: &str) -> HarnessResult<()> {
        match self.kind {
            EngineKind::Chrome => Err(HarnessError::Unsupported(format!(
                "internal page '{name}' on chrome"
            ))),
            EngineKind::Firefox => {
                let frame = self
                    .client
                    .find(Locator::Id(crate::sidebar::SIDEPANEL_ID))
                    .await
                    .map_err(|_| {
                        HarnessError::Structural(
                            "widget frame absent, cannot resolve extension origin".to_string(),
                        )
                    })?;
                let src = frame.attr("src").await?.ok_or_else(|| {
                    HarnessError::Structural("widget frame has no src".to_string())
                })?;
                let src = url::Url::parse(&src).map_err(|err| {
                    HarnessError::Unexpected(format!("bad frame src '{src}': {err}"))
                })?;
                let target = format!(
                    "{}://{}/{name}.html",
                    src.scheme(),
                    src.host_str().unwrap_or_default()
                );
                self.goto(&target).await
            }
        }
    }

    /// Fetches the browser console, where the engine exposes it.
    pub async fn console_log(&self) -> HarnessResult<Vec<String>> {
        match self.kind {
            EngineKind::Firefox => Err(HarnessError::Unsupported(
                "browser console log on firefox".to_string(),
            )),
            EngineKind::Chrome => {
                let value = self.client.issue_cmd(GetBrowserLog).await?;
                let entries = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .map(|item| {
                                item.get("message")
                                    .and_then(Value::as_str)
                                    .map(str::to_string)
                                    .unwrap_or_else(|| item.to_string())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(entries)
            }
        }
    }

    pub async fn screenshot(&self) -> HarnessResult<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    /// Marks the session as focused inside the widget frame. Nested
    /// entry is a structural defect, not something to paper over.
    pub(crate) fn begin_frame_scope(&self) -> HarnessResult<()> {
        if self
            .in_frame
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HarnessError::Structural(
                "frame scope already entered on this session".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn end_frame_scope(&self) {
        self.in_frame.store(false, Ordering::SeqCst);
    }

    pub(crate) fn in_frame(&self) -> bool {
        self.in_frame.load(Ordering::SeqCst)
    }

    /// Quits the browser and kills its WebDriver server. Called once,
    /// by the registry, at process teardown.
    pub async fn shutdown(&self) {
        if let Err(err) = self.client.clone().close().await {
            warn!(kind = %self.kind, error = %err, "browser did not close cleanly");
        }
        self.server.shutdown().await;
    }
}
