//! End-to-end flows against a real browser. These need a geckodriver
//! or chromedriver binary on PATH, the packaged extension under
//! `build/`, and the reference website's server script; they are
//! ignored by default and run explicitly in CI.

use std::sync::Arc;

use bmc_core::{
    entries_equivalent, load_entries, load_harness_config, reader_by_name, save_entries,
    snapshot_downloads, wait_for_download, EngineKind, ExtensionBundle, HarnessConfig,
    OptionsController, ReferenceWebsite, RetryPolicy, SessionController, SessionRegistry,
    SourceInfo, TrackingEntry, TrackingSource,
};

async fn localhost_roundtrip(kind: EngineKind) {
    let config: HarnessConfig = load_harness_config("bmc.toml").unwrap();
    let bundle = ExtensionBundle::load(&config.extension).unwrap();
    let website = ReferenceWebsite::start(&config.website).await.unwrap();

    let session = SessionRegistry::global()
        .get(kind, &config, &bundle)
        .await
        .unwrap();
    let controller = SessionController::new(Arc::clone(&session), config.timeouts.clone());
    let driver = reader_by_name("localhost", Arc::clone(&session), &config).unwrap();
    let policy = RetryPolicy::new(&config.retry);

    controller
        .open_on_random_page(driver.as_ref(), &policy, None)
        .await
        .unwrap();
    let sidebar = controller.sidebar().await.unwrap();
    assert!(sidebar.loaded().await.unwrap());
    assert!(!sidebar.hidden().await.unwrap());

    let before = sidebar.get_registered().await.unwrap().len();
    controller.register("live-roundtrip", false).await.unwrap();
    sidebar.check_registration_error(false).await.unwrap();

    let items = sidebar.get_registered().await.unwrap();
    assert_eq!(items.len(), before + 1);
    let mut found = None;
    for item in items {
        if item.name().await.unwrap() == "live-roundtrip" {
            found = Some(item);
        }
    }
    let item = found.expect("registered entry missing from the list");
    assert_eq!(item.sources().await.unwrap().len(), 1);

    item.delete().await.unwrap();
    item.wait_for_removal().await.unwrap();
    controller.refresh().await;
    let sidebar = controller.sidebar().await.unwrap();
    assert_eq!(sidebar.get_registered().await.unwrap().len(), before);

    controller.reset().await.unwrap();
    SessionRegistry::global().release_all().await;
    website.stop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires geckodriver, the packaged extension, and the reference website"]
async fn firefox_localhost_roundtrip() {
    localhost_roundtrip(EngineKind::Firefox).await;
}

#[tokio::test]
#[ignore = "requires chromedriver, the unpacked extension, and the reference website"]
async fn chrome_localhost_roundtrip() {
    localhost_roundtrip(EngineKind::Chrome).await;
}

fn tracking_payload() -> Vec<TrackingEntry> {
    ["LABEL1", "LABEL2", "LABEL3"]
        .iter()
        .enumerate()
        .map(|(idx, label)| TrackingEntry {
            id: None,
            label: label.to_string(),
            chapter: vec![(idx + 2).to_string()],
            page: None,
            sources: vec![TrackingSource {
                name: format!("a{idx}"),
                reader: "localhost".to_string(),
                info: SourceInfo {
                    id: format!("a{idx}"),
                    has_updates: true,
                },
            }],
        })
        .collect()
}

#[tokio::test]
#[ignore = "requires geckodriver, the packaged extension, and the reference website"]
async fn firefox_options_import_export_roundtrip() {
    let config: HarnessConfig = load_harness_config("bmc.toml").unwrap();
    let bundle = ExtensionBundle::load(&config.extension).unwrap();
    let website = ReferenceWebsite::start(&config.website).await.unwrap();

    let session = SessionRegistry::global()
        .get(EngineKind::Firefox, &config, &bundle)
        .await
        .unwrap();
    let controller = SessionController::new(Arc::clone(&session), config.timeouts.clone());
    let driver = reader_by_name("localhost", Arc::clone(&session), &config).unwrap();
    let policy = RetryPolicy::new(&config.retry);

    // The options page origin is resolved from the widget frame, so a
    // host page must be loaded before opening it.
    controller
        .open_on_random_page(driver.as_ref(), &policy, None)
        .await
        .unwrap();

    let payload = tracking_payload();
    let dir = tempfile::tempdir().unwrap();
    let import_path = dir.path().join("tracking-import.json");
    save_entries(&import_path, &payload).unwrap();

    let options = OptionsController::new(Arc::clone(&session), config.timeouts.clone());
    options.open().await.unwrap();
    options.import_payload(&import_path).await.unwrap();

    // The imported entries are visible from the widget on a host page.
    driver.home().await.unwrap();
    controller.refresh().await;
    let sidebar = controller.sidebar().await.unwrap();
    assert_eq!(
        sidebar.get_registered().await.unwrap().len(),
        payload.len()
    );

    options.open().await.unwrap();
    let before = snapshot_downloads(&config.downloads).unwrap();
    options.trigger_export().await.unwrap();
    let exported = wait_for_download(&config.downloads, &before).await.unwrap();
    let entries = load_entries(&exported).unwrap();
    assert!(entries_equivalent(entries, payload));

    // The reset needs the widget frame, which only host pages carry.
    driver.home().await.unwrap();
    controller.refresh().await;
    controller.reset().await.unwrap();
    SessionRegistry::global().release_all().await;
    website.stop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires geckodriver and the packaged extension"]
async fn firefox_collapsed_widget_keeps_a_small_footprint() {
    let config: HarnessConfig = load_harness_config("bmc.toml").unwrap();
    let bundle = ExtensionBundle::load(&config.extension).unwrap();
    let website = ReferenceWebsite::start(&config.website).await.unwrap();

    let session = SessionRegistry::global()
        .get(EngineKind::Firefox, &config, &bundle)
        .await
        .unwrap();
    let controller = SessionController::new(Arc::clone(&session), config.timeouts.clone());
    let driver = reader_by_name("localhost", Arc::clone(&session), &config).unwrap();
    let policy = RetryPolicy::new(&config.retry);

    controller
        .open_on_random_page(driver.as_ref(), &policy, None)
        .await
        .unwrap();
    let sidebar = controller.sidebar().await.unwrap();
    let (expanded_width, _) = sidebar.size().await.unwrap();

    sidebar.toggle().await.unwrap();
    assert!(sidebar.hidden().await.unwrap());
    let (collapsed_width, collapsed_height) = sidebar.size().await.unwrap();
    // Collapsed, the frame shrinks to the toggle button's footprint.
    assert!(collapsed_width <= expanded_width);
    assert!(collapsed_height < 100.0);

    SessionRegistry::global().release_all().await;
    website.stop().await.unwrap();
}
