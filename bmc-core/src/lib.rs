pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod extension;
pub mod options;
pub mod readers;
pub mod retry;
pub mod session;
pub mod sidebar;
pub mod storage;
pub mod website;

pub use config::{
    load_harness_config, DownloadSection, ExtensionSection, HarnessConfig, RetrySection,
    SelectionSection, TimeoutSection, WebsiteSection,
};
pub use controller::SessionController;
pub use diagnostics::DiagnosticsSink;
pub use error::{HarnessError, HarnessResult};
pub use extension::ExtensionBundle;
pub use options::OptionsController;
pub use readers::{
    check_predicate, load_random_retrying, reader_by_name, resolve_readers, DifferentComic,
    ExcludedComics, NavigationPredicate, ReaderDriver, WithNextPage, WithPrevPage, READER_NAMES,
};
pub use retry::RetryPolicy;
pub use session::{resolve_engines, BrowserSession, EngineKind, SessionRegistry};
pub use sidebar::{
    FrameScope, ItemSource, RegisteredItem, SidebarController, SIDEPANEL_ID,
};
pub use storage::{
    entries_equivalent, load_entries, normalized, save_entries, snapshot_downloads,
    wait_for_download, SourceInfo, TrackingEntry, TrackingSource,
};
pub use website::{ReferenceWebsite, WebsiteOutput};
