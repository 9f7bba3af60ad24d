use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HarnessResult;
use crate::session::{BrowserSession, Locator};

use super::{sweep_candidates, NavigationPredicate, ReaderDriver, SiteDescriptor};

const DESCRIPTOR: SiteDescriptor = SiteDescriptor {
    name: MangaNatoDriver::NAME,
    home_url: "https://manganato.com/",
    entry_selector: ".content-homepage-item",
    chapter_link_selector: ".item-chapter>a",
    min_chapter_links: 3,
    // Chapter pages live on a sibling domain.
    allowed_hosts: &["manganato.com", "chapmanganato.com"],
    reject_compound_suffix: true,
    // `/manga-<id>/chapter-<n>` on the chapter domain.
    path_depth: Some(2),
    pager_selector: ".navi-change-chapter-btn",
};

const PREV_SELECTOR: &str = ".navi-change-chapter-btn>.navi-change-chapter-btn-prev";
const NEXT_SELECTOR: &str = ".navi-change-chapter-btn>.navi-change-chapter-btn-next";

pub struct MangaNatoDriver {
    session: Arc<BrowserSession>,
}

impl MangaNatoDriver {
    pub const NAME: &'static str = "manganato";

    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait(?Send)]
impl ReaderDriver for MangaNatoDriver {
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

    /// Second breadcrumb entry on a chapter page; `None` when the
    /// current URL is not a chapter page of this site.
    async fn comic_name(&self) -> HarnessResult<Option<String>> {
        let url = self.session.current_url().await?;
        if !url.as_str().contains("chapmanganato.com") {
            return Ok(None);
        }
        let crumbs = self
            .session
            .find_all(Locator::Css(".panel-breadcrumb > .a-h"))
            .await?;
        match crumbs.get(1) {
            Some(crumb) => Ok(Some(crumb.text().await?)),
            None => Ok(None),
        }
    }

    async fn chapter(&self) -> HarnessResult<Option<String>> {
        let url = self.session.current_url().await?;
        Ok(chapter_from_url(url.as_str()))
    }

    /// The site has no per-page browsing.
    async fn page(&self) -> HarnessResult<Option<u32>> {
        Ok(None)
    }
}

/// `https://chapmanganato.com/manga-xy123/chapter-42` -> `42`.
fn chapter_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    last.rsplit('-').next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_token_comes_from_last_url_segment() {
        assert_eq!(
            chapter_from_url("https://chapmanganato.com/manga-aa0001/chapter-42"),
            Some("42".to_string())
        );
        assert_eq!(
            chapter_from_url("https://chapmanganato.com/manga-aa0001/chapter-42/"),
            Some("42".to_string())
        );
    }
}
