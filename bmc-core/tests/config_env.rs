use std::path::PathBuf;

use bmc_core::HarnessConfig;

// Environment variables are process-wide, so every override is probed
// from a single test body.
#[test]
fn environment_overrides_apply_in_order() {
    std::env::set_var("WEBEXT_DIR", "/srv/webext-build");
    std::env::set_var("BMC_WEBSITE_CMD", "python3 server.py --port 5000");
    std::env::set_var("HOME", "/home/ci");

    let mut config = HarnessConfig::default();
    config.apply_env();

    assert_eq!(
        config.extension.archive_dir,
        Some(PathBuf::from("/srv/webext-build"))
    );
    assert_eq!(
        config.website.command,
        vec!["python3", "server.py", "--port", "5000"]
    );
    assert_eq!(
        config.downloads.dir,
        Some(PathBuf::from("/home/ci/Downloads"))
    );
    assert_eq!(config.downloads.poll_secs, 120);

    // A configured download dir survives the HOME fallback.
    let mut configured = HarnessConfig::default();
    configured.downloads.dir = Some(PathBuf::from("/data/exports"));
    configured.apply_env();
    assert_eq!(configured.downloads.dir, Some(PathBuf::from("/data/exports")));

    std::env::remove_var("WEBEXT_DIR");
    std::env::remove_var("BMC_WEBSITE_CMD");
}
