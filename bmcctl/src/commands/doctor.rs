use std::path::Path;

use bmc_core::{resolve_engines, resolve_readers, ExtensionBundle, HarnessConfig};
use tracing::info;

use crate::{AppError, Result};

/// Checks that everything a run would need is actually present,
/// without launching a browser.
pub fn execute(config: HarnessConfig) -> Result<()> {
    let mut problems = Vec::new();

    match resolve_engines(&config.selection.browsers) {
        Ok(engines) => {
            for kind in engines {
                let binary = kind.driver_binary();
                if find_in_path(binary) {
                    info!(driver = binary, "webdriver binary found");
                } else {
                    problems.push(format!("{binary} not found in PATH"));
                }
            }
        }
        Err(err) => problems.push(err.to_string()),
    }

    if let Err(err) = resolve_readers(&config.selection.readers) {
        problems.push(err.to_string());
    }

    match ExtensionBundle::load(&config.extension) {
        Ok(bundle) => {
            info!(
                name = bundle.name(),
                version = bundle.version(),
                "extension bundle resolved"
            );
            if !bundle.packed_path().exists() {
                problems.push(format!(
                    "packaged extension missing: {}",
                    bundle.packed_path().display()
                ));
            }
        }
        Err(err) => problems.push(format!("extension bundle: {err}")),
    }

    match config.website.command.first() {
        Some(program) if find_in_path(program) || Path::new(program).exists() => {
            info!(program, "reference website command found");
        }
        Some(program) => problems.push(format!("website command not found: {program}")),
        None => problems.push("reference website command is empty".to_string()),
    }

    match config.downloads.dir.as_deref() {
        Some(dir) if dir.is_dir() => info!(dir = %dir.display(), "download directory present"),
        Some(dir) => problems.push(format!("download directory missing: {}", dir.display())),
        None => problems.push("download directory not configured".to_string()),
    }

    if problems.is_empty() {
        info!("environment looks ready");
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("problem: {problem}");
        }
        Err(AppError::Doctor(format!(
            "{} problem(s) found",
            problems.len()
        )))
    }
}

fn find_in_path(binary: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
}
