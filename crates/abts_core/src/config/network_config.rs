//! Road network formation parameters

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `highway=*` values that always mark a network node
const JUNCTION_TAGS: [&str; 4] = [
    "traffic_signals",
    "crossing",
    "turning_circle",
    "motorway_junction",
];

/// Travel speed per highway type, in miles per hour
const ORIGINAL_SPEEDS: [(&str, f64); 8] = [
    ("residential", 20.0),
    ("primary", 40.0),
    ("primary_link", 40.0),
    ("secondary", 35.0),
    ("tertiary", 30.0),
    ("footway", 35.0),
    ("service", 35.0),
    ("motorway", 70.0),
];

/// Common highway types missing from the base table
const EXTRA_SPEEDS: [(&str, f64); 8] = [
    ("trunk", 55.0),
    ("trunk_link", 45.0),
    ("motorway_link", 50.0),
    ("secondary_link", 35.0),
    ("tertiary_link", 30.0),
    ("unclassified", 25.0),
    ("living_street", 10.0),
    ("road", 25.0),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// `highway` tag values that make a raw node a junction
    pub junction_tags: Vec<String>,
    /// Travel speed per highway type (mph)
    pub speeds_mph: BTreeMap<String, f64>,
    /// Speed for highway types missing from the table, `None` rejects them
    pub default_speed_mph: Option<f64>,
    /// Nodes shared by several roads become junctions
    pub split_at_shared_nodes: bool,
    /// First and last nodes of a road become junctions (dead ends)
    pub split_at_way_ends: bool,
    /// Drop junctions that ended up without any edge
    pub prune_isolated_nodes: bool,
    /// Let a parseable `maxspeed` tag override the table
    pub honor_maxspeed: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let mut cfg = Self::original();
        cfg.speeds_mph
            .extend(EXTRA_SPEEDS.iter().map(|(k, v)| (k.to_string(), *v)));
        cfg.split_at_shared_nodes = true;
        cfg.split_at_way_ends = true;
        cfg.prune_isolated_nodes = true;
        cfg
    }
}

impl NetworkConfig {
    /// Junctions from tags only, base speed table, strict highway types
    pub fn original() -> Self {
        Self {
            junction_tags: JUNCTION_TAGS.iter().map(|t| t.to_string()).collect(),
            speeds_mph: ORIGINAL_SPEEDS
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            default_speed_mph: None,
            split_at_shared_nodes: false,
            split_at_way_ends: false,
            prune_isolated_nodes: false,
            honor_maxspeed: false,
        }
    }

    /// Table speed for a highway type, falling back to the default speed
    pub fn speed_for(&self, highway: &str) -> Option<f64> {
        self.speeds_mph
            .get(highway)
            .copied()
            .or(self.default_speed_mph)
    }

    pub fn is_junction_tag(&self, highway: &str) -> bool {
        self.junction_tags.iter().any(|t| t == highway)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        for (highway, speed) in &self.speeds_mph {
            if !speed.is_finite() || *speed <= 0.0 {
                return Err(format!("speed for '{}' must be positive, got {}", highway, speed));
            }
        }
        if let Some(speed) = self.default_speed_mph {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(format!("default_speed_mph must be positive, got {}", speed));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_original_table() {
        let cfg = NetworkConfig::original();
        assert_eq!(cfg.speeds_mph.len(), 8);
        assert_eq!(cfg.speed_for("motorway"), Some(70.0));
        assert_eq!(cfg.speed_for("trunk"), None);
        assert!(cfg.is_junction_tag("crossing"));
        assert!(!cfg.is_junction_tag("stop"));
    }

    #[test]
    fn test_default_extends_original() {
        let cfg = NetworkConfig::default();
        assert_eq!(cfg.speed_for("residential"), Some(20.0));
        assert_eq!(cfg.speed_for("trunk"), Some(55.0));
        assert!(cfg.split_at_shared_nodes && cfg.split_at_way_ends);
    }

    #[test]
    fn test_default_speed_fallback() {
        let mut cfg = NetworkConfig::default();
        assert_eq!(cfg.speed_for("busway"), None);
        cfg.default_speed_mph = Some(15.0);
        assert_eq!(cfg.speed_for("busway"), Some(15.0));
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let mut cfg = NetworkConfig::default();
        cfg.speeds_mph.insert("path".to_string(), 0.0);
        assert!(cfg.validate().is_err());
    }
}
