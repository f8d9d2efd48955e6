use serde::{Deserialize, Serialize};

/// Supported server platforms — strongly typed, no magic strings.
///
/// Every variant maps to a project slug on the download registry
/// (`/projects/<slug>`), which is also the prefix of cached jar names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Paper,
    Folia,
    Velocity,
    Waterfall,
}

impl Platform {
    /// Project slug as the registry spells it.
    pub fn slug(&self) -> &'static str {
        match self {
            Platform::Paper => "paper",
            Platform::Folia => "folia",
            Platform::Velocity => "velocity",
            Platform::Waterfall => "waterfall",
        }
    }

    /// Reverse of [`Platform::slug`], used when parsing directory names.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "paper" => Some(Platform::Paper),
            "folia" => Some(Platform::Folia),
            "velocity" => Some(Platform::Velocity),
            "waterfall" => Some(Platform::Waterfall),
            _ => None,
        }
    }

    /// All platforms the bench knows about, in UI order.
    pub fn all() -> &'static [Platform] {
        &[
            Platform::Paper,
            Platform::Folia,
            Platform::Velocity,
            Platform::Waterfall,
        ]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_roundtrip() {
        for platform in Platform::all() {
            assert_eq!(Platform::from_slug(platform.slug()), Some(*platform));
        }
        assert_eq!(Platform::from_slug("purpur"), None);
        assert_eq!(Platform::from_slug(""), None);
    }

    #[test]
    fn serde_uses_lowercase_slugs() {
        assert_eq!(serde_json::to_string(&Platform::Paper).unwrap(), "\"paper\"");
        let parsed: Platform = serde_json::from_str("\"waterfall\"").unwrap();
        assert_eq!(parsed, Platform::Waterfall);
    }
}
