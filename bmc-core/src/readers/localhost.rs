use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::error::{HarnessError, HarnessResult};
use crate::session::{BrowserSession, Element, Locator};

use super::{check_predicate, NavigationPredicate, ReaderDriver};

/// Driver for the bundled reference website, the only reader with
/// deterministic content. URLs follow `/<comic>/<chapter>/<page>`.
pub struct LocalhostDriver {
    session: Arc<BrowserSession>,
    base_url: String,
}

impl LocalhostDriver {
    pub const NAME: &'static str = "localhost";

    pub fn new(session: Arc<BrowserSession>, base_url: String) -> Self {
        Self { session, base_url }
    }

    fn home_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    async fn collect_hrefs(&self, selector: &str) -> HarnessResult<Vec<String>> {
        let mut hrefs = Vec::new();
        for link in self.session.find_all(Locator::Css(selector)).await? {
            if let Some(href) = link.attr("href").await? {
                hrefs.push(href);
            }
        }
        Ok(hrefs)
    }

    async fn goto_random(&self, hrefs: Vec<String>, what: &str) -> HarnessResult<()> {
        if hrefs.is_empty() {
            return Err(HarnessError::retriable(format!(
                "no {what} links on reference website"
            )));
        }
        let pick = rand::thread_rng().gen_range(0..hrefs.len());
        self.session.goto(&hrefs[pick]).await
    }

    async fn find_pager_button(
        &self,
        preferred: &'static str,
        fallback: &'static str,
    ) -> HarnessResult<Option<Element>> {
        for selector in [preferred, fallback] {
            if let Ok(button) = self.session.find(Locator::Css(selector)).await {
                return Ok(Some(button));
            }
        }
        Ok(None)
    }

    /// Path segments of the current URL, relative to the site root.
    async fn path_segments(&self) -> HarnessResult<Vec<String>> {
        let url = self.session.current_url().await?;
        Ok(url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait(?Send)]
impl ReaderDriver for LocalhostDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    async fn home(&self) -> HarnessResult<()> {
        self.session.goto(&self.home_url()).await
    }

    /// Walks the site hierarchy at random: comic, then chapter, then a
    /// page when the chapter offers per-page buttons. Chapter-level
    /// reading is a supported terminal state, not a failure.
    async fn load_random(
        &self,
        predicate: Option<&dyn NavigationPredicate>,
    ) -> HarnessResult<()> {
        self.home().await?;
        let comics = self.collect_hrefs("body>div#latest-updates>a").await?;
        self.goto_random(comics, "comic").await?;
        let chapters = self.collect_hrefs("body>div#chapters>a").await?;
        self.goto_random(chapters, "chapter").await?;

        let mut pages = self
            .session
            .find_all(Locator::Css("body>div#buttons>button"))
            .await?;
        if pages.is_empty() {
            // Plain-link rendering; the first anchor points back up.
            let links = self
                .session
                .find_all(Locator::Css("body>div#buttons>a"))
                .await?;
            pages = links.into_iter().skip(1).collect();
        }
        if !pages.is_empty() {
            let pick = rand::thread_rng().gen_range(0..pages.len());
            self.session.click(&pages[pick]).await?;
        }
        // The walk is a single random path; a rejection here is
        // retriable so the enclosing policy re-runs the whole walk.
        check_predicate(self, predicate).await
    }

    async fn has_prev_page(&self) -> HarnessResult<bool> {
        Ok(!self
            .session
            .find_all(Locator::Css("body>div#buttons>#prev"))
            .await?
            .is_empty()
            || !self
                .session
                .find_all(Locator::Css("body>div#buttons>#prev-page"))
                .await?
                .is_empty())
    }

    async fn prev_page(&self) -> HarnessResult<()> {
        match self
            .find_pager_button("body>#buttons>#prev-page", "body>#buttons>#prev")
            .await?
        {
            Some(button) => self.session.click(&button).await,
            None => {
                warn!("already at earliest page of reference website");
                Ok(())
            }
        }
    }

    async fn has_next_page(&self) -> HarnessResult<bool> {
        Ok(!self
            .session
            .find_all(Locator::Css("body>#buttons>#next"))
            .await?
            .is_empty()
            || !self
                .session
                .find_all(Locator::Css("body>#buttons>#next-page"))
                .await?
                .is_empty())
    }

    async fn next_page(&self) -> HarnessResult<()> {
        match self
            .find_pager_button("body>#buttons>#next-page", "body>#buttons>#next")
            .await?
        {
            Some(button) => self.session.click(&button).await,
            None => {
                warn!("already at latest page of reference website");
                Ok(())
            }
        }
    }

    async fn comic_name(&self) -> HarnessResult<Option<String>> {
        Ok(self.path_segments().await?.first().cloned())
    }

    async fn chapter(&self) -> HarnessResult<Option<String>> {
        Ok(self.path_segments().await?.get(1).cloned())
    }

    async fn page(&self) -> HarnessResult<Option<u32>> {
        Ok(self
            .path_segments()
            .await?
            .get(2)
            .and_then(|segment| segment.parse().ok()))
    }
}
