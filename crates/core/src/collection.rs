//! Collection configuration records and tag naming.

use serde::{Deserialize, Serialize};

/// Prefix for every tag this system owns. Tags without it are never touched.
pub const TAG_PREFIX: &str = "KAI-";

/// Configuration for one AI-managed collection, extracted from a
/// `=== KOMETA-AI ===` comment block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub slug: String,
    pub enabled: bool,
    pub prompt: String,
    pub confidence_threshold: f64,
    pub priority: i32,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub use_iterative_refinement: bool,
    /// Half-width of the confidence band around the threshold in which a
    /// decision counts as borderline (re-asked next run, refined this run).
    pub refinement_threshold: f64,
    pub example_inclusions: Vec<String>,
    pub example_exclusions: Vec<String>,
}

impl CollectionConfig {
    /// Create a config with defaults for everything but the name.
    pub fn new(name: &str) -> Self {
        CollectionConfig {
            name: name.to_string(),
            slug: slugify(name),
            enabled: false,
            prompt: String::new(),
            confidence_threshold: 0.7,
            priority: 0,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            use_iterative_refinement: false,
            refinement_threshold: 0.15,
            example_inclusions: Vec::new(),
            example_exclusions: Vec::new(),
        }
    }

    /// The Radarr tag this collection owns: `KAI-<slug>`.
    pub fn tag(&self) -> String {
        format!("{}{}", TAG_PREFIX, self.slug)
    }

    /// Whether `confidence` lies inside the borderline band around the
    /// threshold.
    pub fn is_borderline(&self, confidence: f64) -> bool {
        (confidence - self.confidence_threshold).abs() < self.refinement_threshold
    }
}

/// Convert a collection name to its tag slug: lowercase, non-alphanumeric
/// runs collapse to a single hyphen, leading/trailing hyphens trimmed.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_was_hyphen = false;

    for c in text.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen && !slug.is_empty() {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Film Noir"), "film-noir");
        assert_eq!(slugify("Action Movies"), "action-movies");
    }

    #[test]
    fn test_slugify_collapses_and_trims() {
        assert_eq!(slugify(" A  B! "), "a-b");
        assert_eq!(slugify("80s -- Sci-Fi!!"), "80s-sci-fi");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_slugify_idempotent() {
        for name in ["Film Noir", " A  B! ", "Heist & Caper", "80s Sci-Fi"] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_tag_uses_prefix() {
        let config = CollectionConfig::new("Film Noir");
        assert_eq!(config.tag(), "KAI-film-noir");
    }

    #[test]
    fn test_borderline_band() {
        let mut config = CollectionConfig::new("Test");
        config.confidence_threshold = 0.7;
        config.refinement_threshold = 0.15;
        assert!(config.is_borderline(0.74));
        assert!(config.is_borderline(0.56));
        assert!(!config.is_borderline(0.85));
        assert!(!config.is_borderline(0.55));
        assert!(!config.is_borderline(0.95));
    }
}
