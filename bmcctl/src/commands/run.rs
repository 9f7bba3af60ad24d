use std::sync::Arc;

use bmc_core::session::wait::wait_displayed;
use bmc_core::session::Locator;
use bmc_core::{
    reader_by_name, resolve_engines, resolve_readers, DiagnosticsSink, DifferentComic,
    ExcludedComics, ExtensionBundle, HarnessConfig, HarnessError, HarnessResult,
    NavigationPredicate, ReaderDriver, ReferenceWebsite, RetryPolicy, SessionController,
    SessionRegistry, SidebarController, WithPrevPage,
};
use tracing::{error, info, warn};

use crate::{AppError, Result, RunArgs};

const REGISTER_BUTTON: &str = "body > div#register-but";
const ADDER_NAME_INPUT: &str = "#side-panel-adder > #bookmark-name";
const ADDER_CONFIRM: &str = "#side-panel-adder > #add-confirm.button-add";
const ADDER_CANCEL: &str = "#side-panel-adder > #add-cancel.button-add";

const SCENARIOS: [&str; 11] = [
    "widget-loads",
    "widget-toggle",
    "reader-navigation",
    "homepage-buttons",
    "register",
    "register-cancel",
    "register-duplicate",
    "register-notification",
    "list-filter",
    "load-registered",
    "delete-entry",
];

pub async fn execute(mut config: HarnessConfig, args: RunArgs) -> Result<()> {
    if !args.browsers.is_empty() {
        config.selection.browsers = args.browsers.clone();
    }
    if !args.readers.is_empty() {
        config.selection.readers = args.readers.clone();
    }
    // Selection errors must surface before any browser is launched.
    let engines = resolve_engines(&config.selection.browsers)?;
    let readers = resolve_readers(&config.selection.readers)?;
    let scenarios: Vec<&str> = match &args.scenario {
        Some(name) => {
            if !SCENARIOS.contains(&name.as_str()) {
                return Err(AppError::InvalidArgument(format!(
                    "unknown scenario: {name}"
                )));
            }
            vec![name.as_str()]
        }
        None => SCENARIOS.to_vec(),
    };

    let bundle = ExtensionBundle::load(&config.extension)?;
    let website = if readers.iter().any(|reader| reader == "localhost") {
        Some(ReferenceWebsite::start(&config.website).await?)
    } else {
        None
    };
    let diagnostics = DiagnosticsSink::new(&args.artifacts);
    let policy = RetryPolicy::new(&config.retry);

    let mut failed = 0usize;
    let mut total = 0usize;
    for kind in engines {
        let session = match SessionRegistry::global().get(kind, &config, &bundle).await {
            Ok(session) => session,
            Err(err) => {
                error!(kind = %kind, error = %err, "browser session unavailable");
                failed += readers.len() * scenarios.len();
                total += readers.len() * scenarios.len();
                continue;
            }
        };
        let controller = SessionController::new(Arc::clone(&session), config.timeouts.clone());
        for reader_name in &readers {
            let driver = reader_by_name(reader_name, Arc::clone(&session), &config)?;
            for scenario in &scenarios {
                total += 1;
                info!(kind = %kind, reader = %reader_name, scenario, "running scenario");
                match run_scenario(scenario, &controller, driver.as_ref(), &policy).await {
                    Ok(()) => info!(scenario, "scenario passed"),
                    Err(err) => {
                        failed += 1;
                        error!(scenario, error = %err, "scenario failed");
                        diagnostics
                            .capture(&session, &format!("{scenario}-{reader_name}"))
                            .await;
                    }
                }
                if let Err(err) = controller.reset().await {
                    warn!(error = %err, "between-scenario reset failed");
                }
            }
        }
    }

    SessionRegistry::global().release_all().await;

    if let Some(website) = website {
        let output = website.stop().await?;
        if args.dbg_website || config.website.dbg_output {
            println!("--- reference website stdout ---");
            println!("{}", output.stdout);
            println!("--- reference website stderr ---");
            println!("{}", output.stderr);
        }
    }

    if failed > 0 {
        return Err(AppError::ScenariosFailed { failed, total });
    }
    info!(total, "all scenarios passed");
    Ok(())
}

fn unique_name(prefix: &str) -> String {
    format!("{prefix}-{:08x}", rand::random::<u32>())
}

async fn check_home_buttons_hidden(sidebar: &SidebarController) -> HarnessResult<()> {
    sidebar
        .focus(|client| async move {
            for id in ["register-but", "delete-but"] {
                let button = client.find(Locator::Id(id)).await?;
                if button.is_displayed().await? {
                    return Err(HarnessError::Structural(format!(
                        "{id} visible on the reader's home page"
                    )));
                }
            }
            Ok(())
        })
        .await
}

async fn registered_names(sidebar: &SidebarController) -> HarnessResult<Vec<String>> {
    let mut names = Vec::new();
    for item in sidebar.get_registered().await? {
        names.push(item.name().await?);
    }
    Ok(names)
}

async fn run_scenario(
    name: &str,
    controller: &SessionController,
    driver: &dyn ReaderDriver,
    policy: &RetryPolicy,
) -> HarnessResult<()> {
    match name {
        // The injected frame must be present with a sane geometry on a
        // freshly loaded page.
        "widget-loads" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            let (width, height) = sidebar.size().await?;
            if width <= 0.0 || height <= 0.0 {
                return Err(HarnessError::Structural(format!(
                    "degenerate widget geometry {width}x{height}"
                )));
            }
            Ok(())
        }
        // Collapse and re-expand round-trips through the toggle button.
        "widget-toggle" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            sidebar.toggle().await?;
            if !sidebar.hidden().await? {
                return Err(HarnessError::Structural(
                    "widget did not collapse".to_string(),
                ));
            }
            sidebar.toggle().await?;
            if sidebar.hidden().await? {
                return Err(HarnessError::Structural(
                    "widget did not expand".to_string(),
                ));
            }
            // Expanded, the toggle button shows the collapse arrow.
            sidebar.wait_for_text("hide-but", "<").await
        }
        // One step back and one step forward land on the same comic and
        // chapter.
        "reader-navigation" => {
            controller
                .open_on_random_page(driver, policy, Some(&WithPrevPage))
                .await?;
            let before = (driver.comic_name().await?, driver.chapter().await?);
            driver.prev_page().await?;
            driver.next_page().await?;
            let after = (driver.comic_name().await?, driver.chapter().await?);
            if before != after {
                return Err(HarnessError::Structural(format!(
                    "navigation did not return to the origin: {before:?} became {after:?}"
                )));
            }
            Ok(())
        }
        // The register/delete buttons stay hidden on the reader's home
        // page, collapsed or expanded; there is nothing to track there.
        "homepage-buttons" => {
            driver.home().await?;
            controller.refresh().await;
            let sidebar = controller.sidebar().await?;
            if !sidebar.hidden().await? {
                return Err(HarnessError::Structural(
                    "widget expanded by default on the home page".to_string(),
                ));
            }
            check_home_buttons_hidden(&sidebar).await?;
            sidebar.toggle().await?;
            check_home_buttons_hidden(&sidebar).await
        }
        // A registered comic shows up exactly once in the list and no
        // error is displayed.
        "register" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            let before = sidebar.get_registered().await?.len();
            let name = unique_name("sample");
            controller.register(&name, false).await?;
            sidebar.check_registration_error(false).await?;
            let names = registered_names(&sidebar).await?;
            if names.len() != before + 1
                || names.iter().filter(|entry| **entry == name).count() != 1
            {
                return Err(HarnessError::Structural(format!(
                    "'{name}' not registered exactly once: {names:?}"
                )));
            }
            Ok(())
        }
        // Cancelling a registration leaves the list untouched and
        // clears the name input.
        "register-cancel" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            let before = sidebar.get_registered().await?.len();
            sidebar
                .focus(|client| async move {
                    client.find(Locator::Css(REGISTER_BUTTON)).await?.click().await?;
                    let input = client.find(Locator::Css(ADDER_NAME_INPUT)).await?;
                    input.send_keys("to-be-cancelled").await?;
                    client.find(Locator::Css(ADDER_CANCEL)).await?.click().await?;
                    Ok(())
                })
                .await?;
            if sidebar.get_registered().await?.len() != before {
                return Err(HarnessError::Structural(
                    "cancelled registration changed the list".to_string(),
                ));
            }
            sidebar
                .focus(|client| async move {
                    client.find(Locator::Css(REGISTER_BUTTON)).await?.click().await?;
                    let input = client.find(Locator::Css(ADDER_NAME_INPUT)).await?;
                    let leftover = input.prop("value").await?.unwrap_or_default();
                    if leftover.is_empty() {
                        Ok(())
                    } else {
                        Err(HarnessError::Structural(format!(
                            "cancelled name survived in the input: '{leftover}'"
                        )))
                    }
                })
                .await
        }
        // Re-using a taken name on a different comic must surface the
        // error display and leave the list unchanged.
        "register-duplicate" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let name = unique_name("eexist");
            controller.register(&name, false).await?;
            let registered_comic = driver.comic_name().await?;
            let sidebar = controller.sidebar().await?;
            let count_after_first = sidebar.get_registered().await?.len();

            // Some readers swallow clicks under the expanded widget.
            if !sidebar.hidden().await? {
                sidebar.toggle().await?;
            }
            let predicate = registered_comic.map(DifferentComic);
            controller
                .open_on_random_page(
                    driver,
                    policy,
                    predicate
                        .as_ref()
                        .map(|p| p as &dyn NavigationPredicate),
                )
                .await?;
            controller.register(&name, true).await?;

            let sidebar = controller.sidebar().await?;
            sidebar.check_registration_error(true).await?;
            sidebar
                .focus(|client| async move {
                    client.find(Locator::Css(ADDER_CANCEL)).await?.click().await?;
                    Ok(())
                })
                .await?;
            let names = registered_names(&sidebar).await?;
            if names.len() != count_after_first
                || names.iter().filter(|entry| **entry == name).count() != 1
            {
                return Err(HarnessError::Structural(format!(
                    "duplicate registration changed the list: {names:?}"
                )));
            }
            Ok(())
        }
        // A storage write runs one full notification cycle on the
        // toggle button.
        "register-notification" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            sidebar.reset_notification().await?;
            let name = unique_name("notif");
            let name_ref = name.as_str();
            sidebar
                .focus(|client| async move {
                    client.find(Locator::Css(REGISTER_BUTTON)).await?.click().await?;
                    let input = wait_displayed(
                        &client,
                        Locator::Css(ADDER_NAME_INPUT),
                        std::time::Duration::from_secs(5),
                        "registration form",
                    )
                    .await?;
                    input.send_keys(name_ref).await?;
                    client.find(Locator::Css(ADDER_CONFIRM)).await?.click().await?;
                    Ok(())
                })
                .await?;
            sidebar.wait_notification_done().await
        }
        // The search box narrows the visible entries to name matches:
        // with totow/zaza/bobo registered, "o" keeps 2, "a" keeps 1,
        // "x" keeps 0, "tw" keeps 1.
        "list-filter" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let mut visited = Vec::new();
            for name in ["totow", "zaza", "bobo"] {
                if !visited.is_empty() {
                    let predicate = ExcludedComics(visited.clone());
                    controller
                        .open_on_random_page(driver, policy, Some(&predicate))
                        .await?;
                }
                controller.register(name, false).await?;
                if let Some(comic) = driver.comic_name().await? {
                    visited.push(comic);
                }
            }
            let sidebar = controller.sidebar().await?;
            for (needle, expected) in [("o", 2usize), ("a", 1), ("x", 0), ("tw", 1)] {
                sidebar.filter(needle).await?;
                let visible = sidebar.visible_entries().await?;
                if visible != expected {
                    return Err(HarnessError::Structural(format!(
                        "filter '{needle}' kept {visible} entries, expected {expected}"
                    )));
                }
            }
            Ok(())
        }
        // Clicking the stored source brings the host tab back to the
        // tracked page.
        "load-registered" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let name = unique_name("loadme");
            controller.register(&name, false).await?;
            let sidebar = controller.sidebar().await?;
            if !sidebar.hidden().await? {
                sidebar.toggle().await?;
            }
            driver.home().await?;
            controller.refresh().await;
            let sidebar = controller.sidebar().await?;
            if sidebar.hidden().await? {
                sidebar.toggle().await?;
            }
            sidebar.load(&name, true).await
        }
        // The hover-revealed trash button removes the whole entry.
        "delete-entry" => {
            controller.open_on_random_page(driver, policy, None).await?;
            let sidebar = controller.sidebar().await?;
            let before = sidebar.get_registered().await?.len();
            let name = unique_name("trashme");
            controller.register(&name, false).await?;

            let items = sidebar.get_registered().await?;
            let mut selected = Vec::new();
            for item in items {
                if item.name().await? == name {
                    selected.push(item);
                }
            }
            if selected.len() != 1 {
                return Err(HarnessError::Structural(format!(
                    "expected one entry named '{name}', found {}",
                    selected.len()
                )));
            }
            selected[0].delete().await?;
            // The storage write behind the deletion raises the
            // notification marker.
            sidebar.wait_notification().await?;
            selected[0].wait_for_removal().await?;
            controller.refresh().await;
            let sidebar = controller.sidebar().await?;
            if sidebar.get_registered().await?.len() != before {
                return Err(HarnessError::Structural(
                    "entry still listed after deletion".to_string(),
                ));
            }
            Ok(())
        }
        other => Err(HarnessError::Configuration(format!(
            "unknown scenario: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_are_unique() {
        let mut names = SCENARIOS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
    }

    #[test]
    fn unique_names_carry_their_prefix() {
        let name = unique_name("sample");
        assert!(name.starts_with("sample-"));
        assert_ne!(unique_name("sample"), unique_name("sample"));
    }
}
