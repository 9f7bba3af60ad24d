use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::session::{BrowserSession, Element, Locator};

use super::{dismiss_consent, NavigationPredicate, ReaderDriver};

const HOME_URL: &str = "https://fanfox.net/";
const LATEST_SELECTOR: &str = "p.manga-list-1-item-subtitle > a";
const PAGE_LINK_SELECTOR: &str = "div > div > span > a";

/// Snapshot of the reading view's pager strip. The strip holds, in
/// order, a `<` button, one link per page with the current one marked
/// `active`, a `>` button, and optional previous/next chapter links.
/// Every click invalidates the element handles, so the snapshot is
/// rebuilt after each navigation.
#[derive(Default)]
struct NavBar {
    pages: Vec<Element>,
    page_idx: Option<usize>,
    chapter_prev: Option<Element>,
    chapter_next: Option<Element>,
}

impl NavBar {
    /// Rebuilds the snapshot from the DOM. Returns `false` when no
    /// populated pager exists on the current page.
    async fn update(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        *self = NavBar::default();

        // The strip appears twice (above and below the scan); only one
        // instance is populated.
        let mut pager = None;
        for candidate in session
            .find_all(Locator::Css(".pager-list-left"))
            .await?
        {
            let children = candidate
                .prop("childElementCount")
                .await?
                .and_then(|count| count.parse::<u32>().ok())
                .unwrap_or(0);
            if children > 0 {
                pager = Some(candidate);
                break;
            }
        }
        let Some(pager) = pager else {
            return Ok(false);
        };

        self.pages = pager.find_all(Locator::Css("span > a")).await?;
        for button in pager.find_all(Locator::Css("a.chapter")).await? {
            let text = button.text().await?;
            if text.contains("Pre") {
                self.chapter_prev = Some(button);
            } else if text.contains("Next") {
                self.chapter_next = Some(button);
            }
        }

        for (idx, page) in self.pages.iter().enumerate() {
            let class = page.attr("class").await?.unwrap_or_default();
            if class.contains("active") {
                self.page_idx = Some(idx);
                break;
            }
        }
        Ok(true)
    }

    async fn prev_page(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        match self.page_idx {
            Some(idx) if idx > 0 => {
                let back = self.pages[0].clone();
                session.click(&back).await?;
                self.update(session).await
            }
            _ => Ok(false),
        }
    }

    async fn next_page(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        match self.page_idx {
            Some(idx) if idx + 1 < self.pages.len() => {
                let forward = self.pages[self.pages.len() - 1].clone();
                session.click(&forward).await?;
                self.update(session).await
            }
            _ => Ok(false),
        }
    }

    /// Jumps to the last page of the current chapter; `pages[len-2]`
    /// is the highest page link, ahead of the `>` button.
    async fn last_page(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        if self.pages.len() < 2 || self.page_idx == Some(self.pages.len() - 2) {
            return Ok(false);
        }
        let last = self.pages[self.pages.len() - 2].clone();
        session.click(&last).await?;
        self.update(session).await
    }

    async fn prev_chapter(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        match self.chapter_prev.clone() {
            Some(button) => {
                session.click(&button).await?;
                self.update(session).await
            }
            None => Ok(false),
        }
    }

    async fn next_chapter(&mut self, session: &BrowserSession) -> HarnessResult<bool> {
        match self.chapter_next.clone() {
            Some(button) => {
                session.click(&button).await?;
                self.update(session).await
            }
            None => Ok(false),
        }
    }

    fn has_prev(&self) -> bool {
        matches!(self.page_idx, Some(idx) if idx > 0) || self.chapter_prev.is_some()
    }

    fn has_next(&self) -> bool {
        matches!(self.page_idx, Some(idx) if idx + 1 < self.pages.len())
            || self.chapter_next.is_some()
    }
}

/// Driver for fanfox.net (historically mangafox), the one reader with
/// per-page URLs and a full pager strip.
pub struct FanFoxDriver {
    session: Arc<BrowserSession>,
    navbar: Mutex<NavBar>,
}

impl FanFoxDriver {
    pub const NAME: &'static str = "mangafox";

    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self {
            session,
            navbar: Mutex::new(NavBar::default()),
        }
    }
}

#[async_trait(?Send)]
impl ReaderDriver for FanFoxDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    async fn home(&self) -> HarnessResult<()> {
        self.session.goto(HOME_URL).await
    }

    /// Picks a random latest-chapter link, then a random mid-chapter
    /// page so that both navigation directions stay available.
    /// Single-page chapters are accepted as-is.
    async fn load_random(
        &self,
        predicate: Option<&dyn NavigationPredicate>,
    ) -> HarnessResult<()> {
        self.home().await?;
        dismiss_consent(&self.session).await?;

        let mut candidates = Vec::new();
        for link in self.session.find_all(Locator::Css(LATEST_SELECTOR)).await? {
            if let Some(href) = link.attr("href").await? {
                candidates.push(href);
            }
        }

        while !candidates.is_empty() {
            let pick = rand::thread_rng().gen_range(0..candidates.len());
            let href = candidates.swap_remove(pick);
            self.session.goto(&href).await?;
            let current = self.session.current_url().await?;
            if current.as_str().trim_end_matches('/') == HOME_URL.trim_end_matches('/') {
                // Redirected back to the listing; dead link.
                continue;
            }
            if let Some(predicate) = predicate {
                if !predicate.accept(self).await? {
                    continue;
                }
            }

            // The page links are injected dynamically and duplicated
            // above and below the scan.
            let pages = self
                .session
                .find_all(Locator::Css(PAGE_LINK_SELECTOR))
                .await?;
            let pages = if pages.len() <= 2 {
                &pages[..]
            } else {
                &pages[..pages.len() / 2]
            };
            let mut navbar = self.navbar.lock().await;
            match mid_page_index(pages.len()) {
                Some(mid) => self.session.click(&pages[mid]).await?,
                // Too short to have a middle; accept the page as-is.
                None => debug!(url = %current, "short chapter, staying on first page"),
            }
            navbar.update(&self.session).await?;
            return Ok(());
        }

        Err(HarnessError::retriable("no loadable latest chapter on fanfox"))
    }

    async fn has_prev_page(&self) -> HarnessResult<bool> {
        let mut navbar = self.navbar.lock().await;
        navbar.update(&self.session).await?;
        Ok(navbar.has_prev())
    }

    async fn prev_page(&self) -> HarnessResult<()> {
        let mut navbar = self.navbar.lock().await;
        navbar.update(&self.session).await?;
        if !navbar.prev_page(&self.session).await? {
            // Crossing a chapter boundary backwards lands on its last
            // page, to keep one step meaning one page.
            if navbar.prev_chapter(&self.session).await? {
                if !navbar.last_page(&self.session).await? {
                    warn!("already at earliest page, cannot go back");
                }
            } else {
                warn!("already at earliest chapter, cannot go back");
            }
        }
        Ok(())
    }

    async fn has_next_page(&self) -> HarnessResult<bool> {
        let mut navbar = self.navbar.lock().await;
        navbar.update(&self.session).await?;
        Ok(navbar.has_next())
    }

    async fn next_page(&self) -> HarnessResult<()> {
        let mut navbar = self.navbar.lock().await;
        navbar.update(&self.session).await?;
        if !navbar.next_page(&self.session).await? && !navbar.next_chapter(&self.session).await? {
            warn!("already at latest chapter, cannot go forward");
        }
        Ok(())
    }

    async fn comic_name(&self) -> HarnessResult<Option<String>> {
        let url = self.session.current_url().await?;
        Ok(parse_reading_url(url.as_str()).map(|location| location.name))
    }

    async fn chapter(&self) -> HarnessResult<Option<String>> {
        let url = self.session.current_url().await?;
        Ok(parse_reading_url(url.as_str()).and_then(|location| location.chapter))
    }

    async fn page(&self) -> HarnessResult<Option<u32>> {
        let url = self.session.current_url().await?;
        Ok(parse_reading_url(url.as_str()).and_then(|location| location.page))
    }
}

/// Index of a random middle page, avoiding both chapter edges so the
/// landing page keeps a previous and a next. Chapters with fewer than
/// three pages have no middle.
fn mid_page_index(len: usize) -> Option<usize> {
    if len < 3 {
        return None;
    }
    Some(rand::thread_rng().gen_range(1..len - 1))
}

struct ReadingLocation {
    name: String,
    chapter: Option<String>,
    page: Option<u32>,
}

/// Decodes `https://fanfox.net/manga/<name>[/vNN]/cNNN/P.html`.
fn parse_reading_url(url: &str) -> Option<ReadingLocation> {
    if !url.contains("fanfox.net") {
        return None;
    }
    let parsed = url::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    let manga_idx = segments.iter().position(|segment| *segment == "manga")?;
    let name = segments.get(manga_idx + 1)?.to_string();

    let chapter = segments.iter().find_map(|segment| {
        let token = segment.strip_prefix('c')?;
        if !token.is_empty() && token.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
            Some(token.to_string())
        } else {
            None
        }
    });
    let page = segments
        .last()
        .and_then(|segment| segment.strip_suffix(".html"))
        .and_then(|token| token.parse().ok());

    Some(ReadingLocation {
        name,
        chapter,
        page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_url_decodes_name_chapter_and_page() {
        let location =
            parse_reading_url("https://fanfox.net/manga/some_title/c120/3.html").unwrap();
        assert_eq!(location.name, "some_title");
        assert_eq!(location.chapter.as_deref(), Some("120"));
        assert_eq!(location.page, Some(3));
    }

    #[test]
    fn reading_url_skips_volume_segments() {
        let location =
            parse_reading_url("https://fanfox.net/manga/some_title/v05/c087/1.html").unwrap();
        assert_eq!(location.chapter.as_deref(), Some("087"));
        assert_eq!(location.page, Some(1));
    }

    #[test]
    fn mid_page_pick_avoids_edges_and_short_chapters() {
        assert_eq!(mid_page_index(0), None);
        assert_eq!(mid_page_index(1), None);
        assert_eq!(mid_page_index(2), None);
        assert_eq!(mid_page_index(3), Some(1));
        for _ in 0..50 {
            let idx = mid_page_index(6).unwrap();
            assert!((1..5).contains(&idx));
        }
    }

    #[test]
    fn foreign_urls_are_not_reading_locations() {
        assert!(parse_reading_url("https://example.com/manga/x/c1/1.html").is_none());
        assert!(parse_reading_url("https://fanfox.net/").is_none());
    }
}
