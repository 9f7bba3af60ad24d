mod fanfox;
mod isekaiscan;
mod localhost;
mod mangakakalot;
mod manganato;

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, trace};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::retry::RetryPolicy;
use crate::session::{BrowserSession, Locator};

pub use fanfox::FanFoxDriver;
pub use isekaiscan::IsekaiScanDriver;
pub use localhost::LocalhostDriver;
pub use mangakakalot::MangaKakalotDriver;
pub use manganato::MangaNatoDriver;

/// Per-site adapter over a shared capability set. One implementation
/// per external site; call sites never branch on the concrete type.
#[async_trait(?Send)]
pub trait ReaderDriver {
    fn name(&self) -> &'static str;

    fn session(&self) -> &Arc<BrowserSession>;

    /// Loads the site's home/listing view.
    async fn home(&self) -> HarnessResult<()>;

    /// One sweep over a fresh candidate list: navigates to a random
    /// qualifying content page or raises the retriable kind when every
    /// candidate was rejected. Whole-call retries belong to the
    /// enclosing [`RetryPolicy`], see [`load_random_retrying`].
    async fn load_random(
        &self,
        predicate: Option<&dyn NavigationPredicate>,
    ) -> HarnessResult<()>;

    async fn has_prev_page(&self) -> HarnessResult<bool>;

    async fn prev_page(&self) -> HarnessResult<()>;

    async fn has_next_page(&self) -> HarnessResult<bool>;

    async fn next_page(&self) -> HarnessResult<()>;

    /// Comic identity for the current page, if the current URL belongs
    /// to this site.
    async fn comic_name(&self) -> HarnessResult<Option<String>>;

    /// Chapter token for the current page. `None` is a valid steady
    /// state, not a failure.
    async fn chapter(&self) -> HarnessResult<Option<String>>;

    /// Page number, for sites with per-page URLs.
    async fn page(&self) -> HarnessResult<Option<u32>>;
}

/// Pure test-precondition over the freshly loaded page.
#[async_trait(?Send)]
pub trait NavigationPredicate {
    fn describe(&self) -> &'static str;

    async fn accept(&self, driver: &dyn ReaderDriver) -> HarnessResult<bool>;
}

/// Requires that the loaded page has a next page to browse to.
pub struct WithNextPage;

#[async_trait(?Send)]
impl NavigationPredicate for WithNextPage {
    fn describe(&self) -> &'static str {
        "with-next-page"
    }

    async fn accept(&self, driver: &dyn ReaderDriver) -> HarnessResult<bool> {
        driver.has_next_page().await
    }
}

/// Requires that the loaded page has a previous page.
pub struct WithPrevPage;

#[async_trait(?Send)]
impl NavigationPredicate for WithPrevPage {
    fn describe(&self) -> &'static str {
        "with-prev-page"
    }

    async fn accept(&self, driver: &dyn ReaderDriver) -> HarnessResult<bool> {
        driver.has_prev_page().await
    }
}

/// Rejects the comic a previous scenario already registered.
pub struct DifferentComic(pub String);

#[async_trait(?Send)]
impl NavigationPredicate for DifferentComic {
    fn describe(&self) -> &'static str {
        "different-comic"
    }

    async fn accept(&self, driver: &dyn ReaderDriver) -> HarnessResult<bool> {
        Ok(driver.comic_name().await?.as_deref() != Some(self.0.as_str()))
    }
}

/// Rejects every comic already visited by the running scenario.
pub struct ExcludedComics(pub Vec<String>);

#[async_trait(?Send)]
impl NavigationPredicate for ExcludedComics {
    fn describe(&self) -> &'static str {
        "excluded-comics"
    }

    async fn accept(&self, driver: &dyn ReaderDriver) -> HarnessResult<bool> {
        Ok(match driver.comic_name().await? {
            Some(name) => !self.0.contains(&name),
            None => true,
        })
    }
}

/// Evaluates `predicate` against the driver that just completed an
/// operation, turning a rejection into a retriable failure so it
/// composes with [`RetryPolicy`] without entangling predicate logic
/// into each driver's sweep.
pub async fn check_predicate(
    driver: &dyn ReaderDriver,
    predicate: Option<&dyn NavigationPredicate>,
) -> HarnessResult<()> {
    if let Some(predicate) = predicate {
        if !predicate.accept(driver).await? {
            return Err(HarnessError::retriable(format!(
                "predicate '{}' rejected the loaded page",
                predicate.describe()
            )));
        }
    }
    Ok(())
}

/// `load_random` wrapped in the retry policy: each attempt runs a full
/// sweep over a fresh candidate list, then re-checks the predicate as
/// a whole-call postcondition.
pub async fn load_random_retrying(
    driver: &dyn ReaderDriver,
    policy: &RetryPolicy,
    predicate: Option<&dyn NavigationPredicate>,
) -> HarnessResult<()> {
    policy
        .run("load_random", || async move {
            driver.load_random(predicate).await?;
            check_predicate(driver, predicate).await
        })
        .await
}

/// Static per-site metadata driving the shared candidate sweep.
pub(crate) struct SiteDescriptor {
    pub name: &'static str,
    pub home_url: &'static str,
    /// Listing entries on the home page.
    pub entry_selector: &'static str,
    /// Chapter links inside one listing entry.
    pub chapter_link_selector: &'static str,
    /// Entries with fewer links than this have too little history to
    /// navigate around in.
    pub min_chapter_links: usize,
    /// Hosts a candidate link must point at; empty means any.
    pub allowed_hosts: &'static [&'static str],
    /// Reject links whose last path segment carries a sub-chapter
    /// suffix (`chapter-12.5`); the chapter parser cannot round-trip
    /// those.
    pub reject_compound_suffix: bool,
    /// Expected number of path segments on a reading-view URL; `None`
    /// when the site's URL shape is not stable enough to check.
    pub path_depth: Option<usize>,
    /// A pagination control that must exist on an accepted page.
    pub pager_selector: &'static str,
}

/// Known consent/interstitial dismissers, tried best-effort on the
/// listing page. Absence is the normal case.
const CONSENT_SELECTORS: [&str; 2] = [
    "#onetrust-accept-btn-handler",
    ".qc-cmp2-summary-buttons button[mode=primary]",
];

pub(crate) async fn dismiss_consent(session: &BrowserSession) -> HarnessResult<()> {
    for selector in CONSENT_SELECTORS {
        if let Ok(button) = session.client().find(Locator::Css(selector)).await {
            if button.is_displayed().await.unwrap_or(false) {
                debug!(selector, "dismissing consent overlay");
                let _ = button.click().await;
            }
        }
    }
    Ok(())
}

/// The shared `load_random` sweep: collect candidate chapter links from
/// the listing, then pop candidates at random without replacement until
/// one yields a usable content page.
///
/// Candidates are collected as URLs, not element handles; element
/// references from the listing snapshot are unusable after the first
/// navigation.
pub(crate) async fn sweep_candidates(
    session: &BrowserSession,
    descriptor: &SiteDescriptor,
    predicate: Option<&dyn NavigationPredicate>,
    driver: &dyn ReaderDriver,
) -> HarnessResult<()> {
    session.goto(descriptor.home_url).await?;
    dismiss_consent(session).await?;

    let mut candidates = Vec::new();
    for entry in session
        .find_all(Locator::Css(descriptor.entry_selector))
        .await?
    {
        let links = entry
            .find_all(Locator::Css(descriptor.chapter_link_selector))
            .await?;
        if links.len() < descriptor.min_chapter_links {
            continue;
        }
        // The second-newest chapter: guaranteed to have a next one.
        let Some(href) = links[1].attr("href").await? else {
            continue;
        };
        if !link_is_acceptable(descriptor, &href) {
            continue;
        }
        candidates.push(href);
    }
    trace!(site = descriptor.name, count = candidates.len(), "collected candidates");

    while !candidates.is_empty() {
        let pick = rand::thread_rng().gen_range(0..candidates.len());
        let href = candidates.swap_remove(pick);
        session.goto(&href).await?;

        let current = session.current_url().await?;
        if current.as_str().trim_end_matches('/') == descriptor.home_url.trim_end_matches('/') {
            // Navigation bounced back to the listing.
            continue;
        }
        if let Some(depth) = descriptor.path_depth {
            if url_path_depth(&current) != depth {
                // Interstitial or landing page instead of a reading view.
                continue;
            }
        }
        if session
            .find_all(Locator::Css(descriptor.pager_selector))
            .await?
            .is_empty()
        {
            continue;
        }
        if let Some(predicate) = predicate {
            if !predicate.accept(driver).await? {
                continue;
            }
        }
        return Ok(());
    }

    Err(HarnessError::retriable(format!(
        "no acceptable candidate on {}",
        descriptor.name
    )))
}

fn url_path_depth(url: &url::Url) -> usize {
    url.path_segments()
        .map(|segments| segments.filter(|segment| !segment.is_empty()).count())
        .unwrap_or(0)
}

fn link_is_acceptable(descriptor: &SiteDescriptor, href: &str) -> bool {
    if !descriptor.allowed_hosts.is_empty()
        && !descriptor
            .allowed_hosts
            .iter()
            .any(|host| href.contains(&format!("://{host}/")))
    {
        return false;
    }
    if descriptor.reject_compound_suffix {
        let last = href.trim_end_matches('/').rsplit('/').next().unwrap_or("");
        let suffix = last.rsplit('-').next().unwrap_or("");
        if suffix.contains('.') {
            return false;
        }
    }
    true
}

pub const READER_NAMES: [&str; 5] = [
    FanFoxDriver::NAME,
    MangaKakalotDriver::NAME,
    MangaNatoDriver::NAME,
    IsekaiScanDriver::NAME,
    LocalhostDriver::NAME,
];

/// Resolves the `--reader` selection. Unknown names abort before any
/// session is created.
pub fn resolve_readers(names: &[String]) -> HarnessResult<Vec<String>> {
    if names.is_empty() {
        return Ok(READER_NAMES.iter().map(|name| name.to_string()).collect());
    }
    let mut resolved = Vec::new();
    for name in names {
        let name = name.to_lowercase();
        if !READER_NAMES.contains(&name.as_str()) {
            return Err(HarnessError::Configuration(format!(
                "unknown reader: {name}"
            )));
        }
        if !resolved.contains(&name) {
            resolved.push(name);
        }
    }
    Ok(resolved)
}

/// Builds the driver for `name` over a live session.
pub fn reader_by_name(
    name: &str,
    session: Arc<BrowserSession>,
    config: &HarnessConfig,
) -> HarnessResult<Box<dyn ReaderDriver>> {
    match name {
        FanFoxDriver::NAME => Ok(Box::new(FanFoxDriver::new(session))),
        MangaKakalotDriver::NAME => Ok(Box::new(MangaKakalotDriver::new(session))),
        MangaNatoDriver::NAME => Ok(Box::new(MangaNatoDriver::new(session))),
        IsekaiScanDriver::NAME => Ok(Box::new(IsekaiScanDriver::new(session))),
        LocalhostDriver::NAME => Ok(Box::new(LocalhostDriver::new(
            session,
            config.website.base_url.clone(),
        ))),
        other => Err(HarnessError::Configuration(format!(
            "unknown reader: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reader_selection_means_all() {
        let readers = resolve_readers(&[]).unwrap();
        assert_eq!(readers.len(), READER_NAMES.len());
    }

    #[test]
    fn unknown_reader_is_a_configuration_error() {
        let err = resolve_readers(&["mangapile".into()]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }

    #[test]
    fn reader_selection_dedupes() {
        let readers =
            resolve_readers(&["localhost".into(), "LOCALHOST".into(), "mangafox".into()]).unwrap();
        assert_eq!(readers, vec!["localhost", "mangafox"]);
    }

    #[test]
    fn compound_chapter_suffixes_are_rejected() {
        let descriptor = SiteDescriptor {
            name: "manganato",
            home_url: "https://manganato.com/",
            entry_selector: ".content-homepage-item",
            chapter_link_selector: ".item-chapter>a",
            min_chapter_links: 3,
            allowed_hosts: &["manganato.com", "chapmanganato.com"],
            reject_compound_suffix: true,
            path_depth: Some(2),
            pager_selector: ".navi-change-chapter-btn",
        };
        assert!(link_is_acceptable(
            &descriptor,
            "https://chapmanganato.com/manga-aa0001/chapter-12"
        ));
        assert!(!link_is_acceptable(
            &descriptor,
            "https://chapmanganato.com/manga-aa0001/chapter-12.5"
        ));
        assert!(!link_is_acceptable(
            &descriptor,
            "https://somewhere-else.example/manga-aa0001/chapter-12"
        ));
    }

    #[test]
    fn path_depth_counts_non_empty_segments() {
        let url = url::Url::parse("https://chapmanganato.com/manga-aa0001/chapter-12").unwrap();
        assert_eq!(url_path_depth(&url), 2);
        let url = url::Url::parse("https://chapmanganato.com/manga-aa0001/chapter-12/").unwrap();
        assert_eq!(url_path_depth(&url), 2);
        let url = url::Url::parse("https://manganato.com/").unwrap();
        assert_eq!(url_path_depth(&url), 0);
    }

    /// Offline driver reporting a fixed comic name, for predicate
    /// plumbing tests that never touch a browser.
    struct FixedComic(&'static str);

    #[async_trait(?Send)]
    impl ReaderDriver for FixedComic {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn session(&self) -> &Arc<BrowserSession> {
            unreachable!("offline driver has no session")
        }

        async fn home(&self) -> HarnessResult<()> {
            Ok(())
        }

        async fn load_random(
            &self,
            _predicate: Option<&dyn NavigationPredicate>,
        ) -> HarnessResult<()> {
            Ok(())
        }

        async fn has_prev_page(&self) -> HarnessResult<bool> {
            Ok(true)
        }

        async fn prev_page(&self) -> HarnessResult<()> {
            Ok(())
        }

        async fn has_next_page(&self) -> HarnessResult<bool> {
            Ok(true)
        }

        async fn next_page(&self) -> HarnessResult<()> {
            Ok(())
        }

        async fn comic_name(&self) -> HarnessResult<Option<String>> {
            Ok(Some(self.0.to_string()))
        }

        async fn chapter(&self) -> HarnessResult<Option<String>> {
            Ok(None)
        }

        async fn page(&self) -> HarnessResult<Option<u32>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn predicate_rejection_is_transient() {
        let driver = FixedComic("taken");
        let predicate = DifferentComic("taken".to_string());
        let err = check_predicate(&driver, Some(&predicate)).await.unwrap_err();
        assert!(err.is_transient(false));
        assert!(check_predicate(&driver, None).await.is_ok());
    }

    #[tokio::test]
    async fn excluded_comics_reject_only_listed_names() {
        let predicate = ExcludedComics(vec!["taken".to_string()]);
        assert!(!predicate.accept(&FixedComic("taken")).await.unwrap());
        assert!(predicate.accept(&FixedComic("fresh")).await.unwrap());
    }
}
