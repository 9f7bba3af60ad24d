use std::fmt;

use serde::Deserialize;

use crate::error::HarnessError;

/// One native browser-automation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Firefox,
    Chrome,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Firefox, EngineKind::Chrome];

    pub fn driver_binary(&self) -> &'static str {
        match self {
            EngineKind::Firefox => "geckodriver",
            EngineKind::Chrome => "chromedriver",
        }
    }

    pub fn driver_port(&self) -> u16 {
        match self {
            EngineKind::Firefox => 4444,
            EngineKind::Chrome => 9515,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EngineKind::Firefox => "firefox",
            EngineKind::Chrome => "chrome",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for EngineKind {
    type Err = HarnessError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "firefox" => Ok(EngineKind::Firefox),
            "chrome" | "chromium" => Ok(EngineKind::Chrome),
            other => Err(HarnessError::Configuration(format!(
                "unknown browser kind: {other}"
            ))),
        }
    }
}

/// Resolves the `--browser` selection: empty means every known kind,
/// duplicates collapse, order is normalized.
pub fn resolve_engines(names: &[String]) -> Result<Vec<EngineKind>, HarnessError> {
    if names.is_empty() {
        return Ok(EngineKind::ALL.to_vec());
    }
    let mut kinds = Vec::new();
    for name in names {
        let kind: EngineKind = name.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds.sort_by_key(|kind| *kind as u8);
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("Firefox".parse::<EngineKind>().unwrap(), EngineKind::Firefox);
        assert_eq!("chromium".parse::<EngineKind>().unwrap(), EngineKind::Chrome);
        assert!("safari".parse::<EngineKind>().is_err());
    }

    #[test]
    fn empty_selection_means_all_kinds() {
        assert_eq!(resolve_engines(&[]).unwrap(), EngineKind::ALL.to_vec());
    }

    #[test]
    fn selection_is_deduped_and_order_independent() {
        let a = resolve_engines(&["chrome".into(), "firefox".into(), "chrome".into()]).unwrap();
        let b = resolve_engines(&["firefox".into(), "chrome".into()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }
}
