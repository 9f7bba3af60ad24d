use bmc_core::{resolve_engines, resolve_readers, EngineKind, HarnessError, READER_NAMES};

#[test]
fn default_selection_covers_every_engine_and_reader() {
    let engines = resolve_engines(&[]).unwrap();
    assert_eq!(engines, EngineKind::ALL.to_vec());

    let readers = resolve_readers(&[]).unwrap();
    assert_eq!(readers.len(), READER_NAMES.len());
    assert!(readers.iter().any(|name| name == "localhost"));
}

#[test]
fn engine_selection_is_normalized() {
    let twice = resolve_engines(&["chrome".into(), "chrome".into(), "firefox".into()]).unwrap();
    assert_eq!(twice.len(), 2);

    let reordered = resolve_engines(&["firefox".into(), "chrome".into()]).unwrap();
    assert_eq!(twice, reordered);
}

#[test]
fn unknown_names_fail_before_any_session_exists() {
    assert!(matches!(
        resolve_engines(&["safari".into()]),
        Err(HarnessError::Configuration(_))
    ));
    assert!(matches!(
        resolve_readers(&["mangapile".into()]),
        Err(HarnessError::Configuration(_))
    ));
}

#[tokio::test]
async fn registry_teardown_is_idempotent() {
    let registry = bmc_core::SessionRegistry::global();
    assert_eq!(registry.live_count().await, 0);
    registry.release_all().await;
    registry.release_all().await;
    assert_eq!(registry.live_count().await, 0);
}
