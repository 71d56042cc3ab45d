//! Trip generation
//!
//! Activities are described by [`TripTemplate`]s: where a trip starts, where
//! it goes and how often per week it happens. For every week of the
//! simulated span each template is expanded into concrete origin and
//! destination junctions of a traveller.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimError};
use crate::osm::OsmId;
use crate::travellers::Traveller;

/// End of a trip, relative to a traveller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Home,
    Work,
    /// One of the traveller's favourite places of a category
    Favourite(String),
}

/// How many times per week an activity takes place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frequency {
    Fixed { per_week: u32 },
    Poisson { mean_per_week: f64 },
}

impl Frequency {
    pub fn mean(&self) -> f64 {
        match self {
            Frequency::Fixed { per_week } => *per_week as f64,
            Frequency::Poisson { mean_per_week } => *mean_per_week,
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            Frequency::Fixed { per_week } => *per_week,
            Frequency::Poisson { mean_per_week } => match Poisson::new(*mean_per_week) {
                Ok(poisson) => {
                    let draw: f64 = poisson.sample(rng);
                    draw as u32
                }
                Err(_) => 0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripTemplate {
    pub name: String,
    pub origin: Location,
    pub destination: Location,
    pub frequency: Frequency,
    /// Emit the way back right after the way out
    #[serde(default = "default_round_trip")]
    pub round_trip: bool,
}

fn default_round_trip() -> bool {
    true
}

impl TripTemplate {
    pub fn new(name: &str, origin: Location, destination: Location, frequency: Frequency) -> Self {
        Self {
            name: name.to_string(),
            origin,
            destination,
            frequency,
            round_trip: true,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("trip templates need a name".to_string());
        }
        if let Frequency::Poisson { mean_per_week } = self.frequency {
            if !mean_per_week.is_finite() || mean_per_week <= 0.0 {
                return Err(format!(
                    "trip '{}' needs a positive mean frequency, got {}",
                    self.name, mean_per_week
                ));
            }
        }
        if self.origin == self.destination && !matches!(self.origin, Location::Favourite(_)) {
            return Err(format!("trip '{}' starts and ends at the same place", self.name));
        }
        Ok(())
    }
}

/// The weekly routine of an average traveller
pub fn default_trips() -> Vec<TripTemplate> {
    vec![
        TripTemplate::new(
            "commute",
            Location::Home,
            Location::Work,
            Frequency::Fixed { per_week: 5 },
        ),
        TripTemplate::new(
            "shopping",
            Location::Home,
            Location::Favourite("shopping".to_string()),
            Frequency::Poisson { mean_per_week: 2.0 },
        ),
        TripTemplate::new(
            "leisure",
            Location::Home,
            Location::Favourite("leisure".to_string()),
            Frequency::Poisson { mean_per_week: 1.5 },
        ),
        TripTemplate::new(
            "education",
            Location::Home,
            Location::Favourite("education".to_string()),
            Frequency::Poisson { mean_per_week: 0.5 },
        ),
    ]
}

/// One journey between two junctions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub traveller: usize,
    /// Index of the template in the list the trips were generated from
    pub template: usize,
    pub week: u32,
    pub origin: OsmId,
    pub destination: OsmId,
}

/// Generates the trips of one traveller over `time_span` weeks
///
/// Templates pointing at a favourite category the traveller has no place
/// for are skipped.
pub fn gen_trips<R: Rng + ?Sized>(
    time_span: u32,
    templates: &[TripTemplate],
    traveller: &Traveller,
    rng: &mut R,
) -> Result<Vec<Trip>> {
    if time_span == 0 {
        return Err(SimError::InvalidParameter(
            "the time span must be at least one week".to_string(),
        ));
    }

    let usable: Vec<bool> = templates
        .iter()
        .map(|t| is_reachable(&t.origin, traveller) && is_reachable(&t.destination, traveller))
        .collect();
    for (template, usable) in templates.iter().zip(&usable) {
        if !usable {
            debug!(
                traveller = traveller.id,
                template = %template.name,
                "Traveller has no place for this activity"
            );
        }
    }

    let mut trips = Vec::new();
    for week in 0..time_span {
        for (index, template) in templates.iter().enumerate() {
            if !usable[index] {
                continue;
            }
            for _ in 0..template.frequency.sample(rng) {
                let (Some(origin), Some(destination)) = (
                    resolve(&template.origin, traveller, rng),
                    resolve(&template.destination, traveller, rng),
                ) else {
                    continue;
                };
                trips.push(Trip {
                    traveller: traveller.id,
                    template: index,
                    week,
                    origin,
                    destination,
                });
                if template.round_trip {
                    trips.push(Trip {
                        traveller: traveller.id,
                        template: index,
                        week,
                        origin: destination,
                        destination: origin,
                    });
                }
            }
        }
    }
    Ok(trips)
}

fn is_reachable(location: &Location, traveller: &Traveller) -> bool {
    match location {
        Location::Home | Location::Work => true,
        Location::Favourite(category) => !traveller.favourites(category).is_empty(),
    }
}

fn resolve<R: Rng + ?Sized>(location: &Location, traveller: &Traveller, rng: &mut R) -> Option<OsmId> {
    match location {
        Location::Home => Some(traveller.home),
        Location::Work => Some(traveller.work),
        Location::Favourite(category) => traveller.favourites(category).choose(rng).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn traveller() -> Traveller {
        let mut favourites = BTreeMap::new();
        favourites.insert("shopping".to_string(), vec![5, 20]);
        Traveller {
            id: 7,
            home: 1,
            work: 3,
            favourites,
        }
    }

    #[test]
    fn test_fixed_commute() {
        let templates = &default_trips()[..1];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let trips = gen_trips(3, templates, &traveller(), &mut rng).unwrap();

        assert_eq!(trips.len(), 3 * 5 * 2);
        for pair in trips.chunks(2) {
            assert_eq!((pair[0].origin, pair[0].destination), (1, 3));
            assert_eq!((pair[1].origin, pair[1].destination), (3, 1));
            assert_eq!(pair[0].week, pair[1].week);
        }
        assert!(trips.iter().all(|t| t.traveller == 7 && t.template == 0));
        assert_eq!(trips.iter().filter(|t| t.week == 2).count(), 10);
    }

    #[test]
    fn test_poisson_mean() {
        let templates = vec![default_trips()[1].clone()];
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let trips = gen_trips(200, &templates, &traveller(), &mut rng).unwrap();

        let outbound = trips.iter().filter(|t| t.origin == 1).count();
        // mean 2 per week over 200 weeks
        assert!((320..=480).contains(&outbound), "{} outbound trips", outbound);
        assert!(trips
            .iter()
            .filter(|t| t.origin == 1)
            .all(|t| t.destination == 5 || t.destination == 20));
    }

    #[test]
    fn test_missing_favourites_are_skipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let trips = gen_trips(10, &default_trips(), &traveller(), &mut rng).unwrap();
        // no leisure or education favourites
        assert!(trips.iter().all(|t| t.template <= 1));
        assert!(trips.iter().any(|t| t.template == 0));
    }

    #[test]
    fn test_one_way_template() {
        let mut template = default_trips()[0].clone();
        template.round_trip = false;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let trips = gen_trips(1, &[template], &traveller(), &mut rng).unwrap();
        assert_eq!(trips.len(), 5);
        assert!(trips.iter().all(|t| t.origin == 1 && t.destination == 3));
    }

    #[test]
    fn test_zero_weeks_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = gen_trips(0, &default_trips(), &traveller(), &mut rng).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));
    }

    #[test]
    fn test_same_seed_same_trips() {
        let a = gen_trips(
            4,
            &default_trips(),
            &traveller(),
            &mut ChaCha8Rng::seed_from_u64(8),
        )
        .unwrap();
        let b = gen_trips(
            4,
            &default_trips(),
            &traveller(),
            &mut ChaCha8Rng::seed_from_u64(8),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_template_validation() {
        for template in default_trips() {
            template.validate().unwrap();
        }
        let zero = TripTemplate::new(
            "never",
            Location::Home,
            Location::Work,
            Frequency::Poisson { mean_per_week: 0.0 },
        );
        assert!(zero.validate().is_err());
        let circular = TripTemplate::new(
            "stay",
            Location::Home,
            Location::Home,
            Frequency::Fixed { per_week: 1 },
        );
        assert!(circular.validate().is_err());
    }

    #[test]
    fn test_template_json_shape() {
        let json = r#"{
            "name": "gym",
            "origin": "work",
            "destination": {"favourite": "leisure"},
            "frequency": {"kind": "poisson", "mean_per_week": 1.0}
        }"#;
        let template: TripTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.origin, Location::Work);
        assert_eq!(template.destination, Location::Favourite("leisure".to_string()));
        assert_eq!(template.frequency.mean(), 1.0);
        assert!(template.round_trip);
    }
}
