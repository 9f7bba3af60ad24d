mod browser;
mod engine;
mod registry;
pub mod wait;
mod webdriver;

pub use browser::BrowserSession;
pub use engine::{resolve_engines, EngineKind};
pub use registry::SessionRegistry;
pub use webdriver::WebDriverServer;

pub use fantoccini::elements::Element;
pub use fantoccini::Locator;
