//! Place extraction rules

use serde::{Deserialize, Serialize};

use crate::osm::Tags;

/// Maps OSM features carrying `key` (with one of `values`) onto a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceRule {
    pub category: String,
    pub key: String,
    /// Accepted values; empty accepts any value
    #[serde(default)]
    pub values: Vec<String>,
}

impl PlaceRule {
    pub fn new(category: &str, key: &str, values: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        match tags.get(&self.key) {
            Some(value) => self.values.is_empty() || self.values.iter().any(|v| v == value),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    /// Tried in order, first match wins
    pub rules: Vec<PlaceRule>,
    /// Places farther than this from any junction are dropped
    pub max_snap_distance_miles: Option<f64>,
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                PlaceRule::new(
                    "education",
                    "amenity",
                    &["school", "university", "college", "kindergarten"],
                ),
                PlaceRule::new("shopping", "shop", &[]),
                PlaceRule::new(
                    "leisure",
                    "amenity",
                    &["restaurant", "cafe", "pub", "bar", "fast_food", "cinema", "theatre"],
                ),
                PlaceRule::new(
                    "leisure",
                    "leisure",
                    &["park", "sports_centre", "fitness_centre", "swimming_pool", "pitch"],
                ),
                PlaceRule::new("work", "office", &[]),
                PlaceRule::new("work", "craft", &[]),
                PlaceRule::new(
                    "work",
                    "building",
                    &["commercial", "office", "industrial", "retail", "warehouse"],
                ),
                PlaceRule::new(
                    "home",
                    "building",
                    &[
                        "house",
                        "residential",
                        "apartments",
                        "detached",
                        "terrace",
                        "semidetached_house",
                        "bungalow",
                        "dormitory",
                    ],
                ),
            ],
            max_snap_distance_miles: Some(1.0),
        }
    }
}

impl PlacesConfig {
    /// Default rules without a snapping limit
    pub fn original() -> Self {
        Self {
            max_snap_distance_miles: None,
            ..Self::default()
        }
    }

    /// Category of the first matching rule
    pub fn classify(&self, tags: &Tags) -> Option<&str> {
        if tags.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.matches(tags))
            .map(|rule| rule.category.as_str())
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.rules.iter().any(|r| r.category == category)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for rule in &self.rules {
            if rule.category.is_empty() || rule.key.is_empty() {
                return Err(format!("place rule {:?} needs a category and a key", rule));
            }
        }
        if let Some(limit) = self.max_snap_distance_miles {
            if !limit.is_finite() || limit < 0.0 {
                return Err(format!("max_snap_distance_miles must be >= 0, got {}", limit));
            }
        }
        Ok(())
    }
}
