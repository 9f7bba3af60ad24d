use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HarnessResult;
use crate::session::{BrowserSession, Locator};

use super::{sweep_candidates, NavigationPredicate, ReaderDriver, SiteDescriptor};

const DESCRIPTOR: SiteDescriptor = SiteDescriptor {
    name: IsekaiScanDriver::NAME,
    home_url: "https://isekaiscan.com/",
    entry_selector: ".chapter-item",
    chapter_link_selector: ".chapter>a",
    min_chapter_links: 2,
    allowed_hosts: &[],
    reject_compound_suffix: false,
    // `/manga/<name>/<chapter>`.
    path_depth: Some(3),
    pager_selector: ".nav-links",
};

const PREV_SELECTOR: &str = ".nav-previous>.prev_page";
const NEXT_SELECTOR: &str = ".nav-next>.next_page";

pub struct IsekaiScanDriver {
    session: Arc<BrowserSession>,
}

impl IsekaiScanDriver {
    pub const NAME: &'static str = "isekaiscan";

    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait(?Send)]
impl ReaderDriver for IsekaiScanDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    async fn home(&self) -> HarnessResult<()> {
        self.session.goto(DESCRIPTOR.home_url).await
    }

    async fn load_random(
        &self,
        predicate: Option<&dyn NavigationPredicate>,
    ) -> HarnessResult<()> {
        sweep_candidates(&self.session, &DESCRIPTOR, predicate, self).await
    }

    async fn has_prev_page(&self) -> HarnessResult<bool> {
        Ok(!self
            .session
            .find_all(Locator::Css(PREV_SELECTOR))
            .await?
            .is_empty())
    }

    async fn prev_page(&self) -> HarnessResult<()> {
        let button = self.session.find(Locator::Css(PREV_SELECTOR)).await?;
        self.session.click(&button).await
    }

    async fn has_next_page(&self) -> HarnessResult<bool> {
        Ok(!self
            .session
            .find_all(Locator::Css(NEXT_SELECTOR))
            .await?
            .is_empty())
    }

    async fn next_page(&self) -> HarnessResult<()> {
        let button = self.session.find(Locator::Css(NEXT_SELECTOR)).await?;
        self.session.click(&button).await
    }

    async fn comic_name(&self) -> HarnessResult<Option<String>> {
        let url = self.session.current_url().await?;
        if !url.as_str().contains("isekaiscan.com") {
            return Ok(None);
        }
        let crumbs = self
            .session
            .find_all(Locator::Css(
                "#manga-reading-nav-head .breadcrumb li:nth-child(1) > a",
            ))
            .await?;
        match crumbs.first() {
            Some(crumb) => Ok(Some(crumb.text().await?)),
            None => Ok(None),
        }
    }

    /// The reading view does not encode a parseable chapter token.
    async fn chapter(&self) -> HarnessResult<Option<String>> {
        Ok(None)
    }

    async fn page(&self) -> HarnessResult<Option<u32>> {
        Ok(None)
    }
}
