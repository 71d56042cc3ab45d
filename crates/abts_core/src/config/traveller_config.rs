//! Traveller generation parameters

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TravellerConfig {
    /// Category the home is drawn from (기본: "home")
    pub home_category: String,
    /// Category the workplace is drawn from (기본: "work")
    pub work_category: String,
    /// Favourite places kept per remaining category (기본: 3)
    pub favourites_per_category: usize,
    /// Distance scale of the preference for nearby places (기본: 2.0 mi)
    pub proximity_decay_miles: f64,
}

impl Default for TravellerConfig {
    fn default() -> Self {
        Self {
            home_category: "home".to_string(),
            work_category: "work".to_string(),
            favourites_per_category: 3,
            proximity_decay_miles: 2.0,
        }
    }
}

impl TravellerConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.favourites_per_category == 0 {
            return Err("favourites_per_category must be at least 1".to_string());
        }
        if !self.proximity_decay_miles.is_finite() || self.proximity_decay_miles <= 0.0 {
            return Err(format!(
                "proximity_decay_miles must be positive, got {}",
                self.proximity_decay_miles
            ));
        }
        if self.home_category == self.work_category {
            return Err("home and work categories must differ".to_string());
        }
        Ok(())
    }
}
