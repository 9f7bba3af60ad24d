use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HarnessResult;
use crate::session::{BrowserSession, Locator};

use super::{sweep_candidates, NavigationPredicate, ReaderDriver, SiteDescriptor};

const DESCRIPTOR: SiteDescriptor = SiteDescriptor {
    name: MangaKakalotDriver::NAME,
    home_url: "https://mangakakalot.com/",
    entry_selector: ".itemupdate",
    chapter_link_selector: "li>span>a",
    min_chapter_links: 3,
    allowed_hosts: &["mangakakalot.com"],
    reject_compound_suffix: false,
    // `/chapter/<id>/chapter_<n>`.
    path_depth: Some(3),
    pager_selector: ".btn-navigation-chap",
};

// The site's own CSS classes are swapped: the "next" button goes to the
// previous chapter and "back" to the next one.
const PREV_SELECTOR: &str = ".btn-navigation-chap>.next";
const NEXT_SELECTOR: &str = ".btn-navigation-chap>.back";

pub struct MangaKakalotDriver {
    session: Arc<BrowserSession>,
}

impl MangaKakalotDriver {
    pub const NAME: &'static str = "mangakakalot";

    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

#[async_trait(?Send)]
impl ReaderDriver for MangaKakalotDriver {
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
        if !url.as_str().contains("mangakakalot.com") {
            return Ok(None);
        }
        let crumbs = self
            .session
            .find_all(Locator::Css(".breadcrumb > p > span > a > span"))
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

    async fn page(&self) -> HarnessResult<Option<u32>> {
        Ok(None)
    }
}

/// `https://mangakakalot.com/chapter/xy123/chapter_42` -> `42`.
fn chapter_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let token = last.rsplit('_').next()?;
    if token == last {
        return None;
    }
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_token_requires_underscore_segment() {
        assert_eq!(
            chapter_from_url("https://mangakakalot.com/chapter/xy123/chapter_42"),
            Some("42".to_string())
        );
        assert_eq!(
            chapter_from_url("https://mangakakalot.com/manga/xy123"),
            None
        );
    }
}
