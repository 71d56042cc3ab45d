//! # Simulation Configuration
//!
//! 모든 튜닝 상수를 중앙에서 관리하는 설정 시스템.
//!
//! Every constant that shapes a run (junction detection, highway speeds,
//! place rules, traveller preferences, trip templates, the seed) lives here
//! so a simulation is fully described by one JSON or YAML document.
//!
//! ## 사용법
//! ```rust
//! use abts_core::config::SimulationConfig;
//!
//! let config = SimulationConfig::default();
//! let original = SimulationConfig::original();
//! assert!(!original.network.split_at_shared_nodes);
//! ```

mod network_config;
mod places_config;
mod traveller_config;

pub use network_config::NetworkConfig;
pub use places_config::{PlaceRule, PlacesConfig};
pub use traveller_config::TravellerConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::trips::{default_trips, Location, TripTemplate};

/// Activity templates the trips are generated from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TripsConfig {
    pub templates: Vec<TripTemplate>,
}

impl Default for TripsConfig {
    fn default() -> Self {
        Self {
            templates: default_trips(),
        }
    }
}

/// Complete description of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed of the ChaCha8 stream all random draws come from
    pub seed: u64,
    pub network: NetworkConfig,
    pub places: PlacesConfig,
    pub travellers: TravellerConfig,
    pub trips: TripsConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            network: NetworkConfig::default(),
            places: PlacesConfig::default(),
            travellers: TravellerConfig::default(),
            trips: TripsConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Tag-only junctions, base speed table, no snapping limit
    pub fn original() -> Self {
        Self {
            network: NetworkConfig::original(),
            places: PlacesConfig::original(),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads and validates a `.json`, `.yaml` or `.yml` file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("json") => Self::from_json(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded simulation config");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate().map_err(ConfigError::Invalid)?;
        self.places.validate().map_err(ConfigError::Invalid)?;
        self.travellers.validate().map_err(ConfigError::Invalid)?;

        for category in [&self.travellers.home_category, &self.travellers.work_category] {
            if !self.places.has_category(category) {
                return Err(ConfigError::Invalid(format!(
                    "no place rule produces category '{}'",
                    category
                )));
            }
        }

        for template in &self.trips.templates {
            template.validate().map_err(ConfigError::Invalid)?;
            for location in [&template.origin, &template.destination] {
                if let Location::Favourite(category) = location {
                    if !self.places.has_category(category) {
                        return Err(ConfigError::Invalid(format!(
                            "trip '{}' refers to unknown category '{}'",
                            template.name, category
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ========== Tests ==========

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trips::Frequency;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_default_config_is_valid() {
        SimulationConfig::default().validate().unwrap();
        SimulationConfig::original().validate().unwrap();
    }

    #[test]
    fn test_original_preset() {
        let cfg = SimulationConfig::original();
        assert!(!cfg.network.split_at_shared_nodes);
        assert!(!cfg.network.split_at_way_ends);
        assert!(cfg.places.max_snap_distance_miles.is_none());
        assert_eq!(cfg.seed, SimulationConfig::default().seed);
    }

    #[test]
    fn test_config_serialization() {
        let cfg = SimulationConfig::default().with_seed(7);
        let json = cfg.to_json_pretty().unwrap();
        let parsed = SimulationConfig::from_json(&json).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.trips.templates.len(), cfg.trips.templates.len());
        assert_eq!(parsed.network.speeds_mph, cfg.network.speeds_mph);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "seed: 99\nnetwork:\n  default_speed_mph: 12.5\n";
        let cfg = SimulationConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.seed, 99);
        assert_eq!(cfg.network.default_speed_mph, Some(12.5));
        assert!(cfg.network.split_at_shared_nodes);
        assert_eq!(cfg.travellers.home_category, "home");
    }

    #[test]
    fn test_unknown_favourite_category_rejected() {
        let mut cfg = SimulationConfig::default();
        cfg.trips.templates.push(TripTemplate {
            name: "gym".to_string(),
            origin: Location::Home,
            destination: Location::Favourite("gym".to_string()),
            frequency: Frequency::Fixed { per_week: 1 },
            round_trip: true,
        });
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_path_by_extension() {
        let mut file = Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "seed: 5").unwrap();
        assert_eq!(SimulationConfig::from_path(file.path()).unwrap().seed, 5);

        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "seed = 5").unwrap();
        assert!(matches!(
            SimulationConfig::from_path(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
