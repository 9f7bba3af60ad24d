use std::future::Future;
use std::time::Duration;

use fantoccini::elements::Element;
use fantoccini::{Client, Locator};
use tokio::time::{sleep, Instant};

use crate::error::{HarnessError, HarnessResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Polls `probe` until it yields a value or `timeout` elapses. Probe
/// errors propagate immediately; only `Ok(None)` keeps the loop going.
pub async fn wait_until<T, F, Fut>(timeout: Duration, what: &str, mut probe: F) -> HarnessResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Timeout(what.to_string()));
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Bounded wait for an element to appear. Absence (including transient
/// lookup failures while the page re-renders) keeps polling.
pub async fn wait_for_element(
    client: &Client,
    locator: Locator<'_>,
    timeout: Duration,
    what: &str,
) -> HarnessResult<Element> {
    wait_until(timeout, what, move || async move {
        Ok(client.find(locator).await.ok())
    })
    .await
}

/// Bounded wait for an element to be present and displayed.
pub async fn wait_displayed(
    client: &Client,
    locator: Locator<'_>,
    timeout: Duration,
    what: &str,
) -> HarnessResult<Element> {
    wait_until(timeout, what, move || async move {
        match client.find(locator).await {
            Ok(element) => match element.is_displayed().await {
                Ok(true) => Ok(Some(element)),
                _ => Ok(None),
            },
            Err(_) => Ok(None),
        }
    })
    .await
}
