//! Travellers, the agents of the simulation
//!
//! Every traveller gets a home and a workplace drawn from the matching
//! place categories, and for each remaining category a short list of
//! favourite places. Favourites are drawn without replacement with a weight
//! decaying exponentially with the distance from home, so people mostly shop
//! and go out close to where they live.

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TravellerConfig;
use crate::error::{Result, SimError};
use crate::geo::haversine_miles;
use crate::network::RoadNetwork;
use crate::osm::OsmId;
use crate::places::Places;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Traveller {
    pub id: usize,
    pub home: OsmId,
    pub work: OsmId,
    /// Favourite junctions per activity category
    pub favourites: BTreeMap<String, Vec<OsmId>>,
}

/// Selection weight of every candidate place, per category
type CategoryWeights = Vec<(String, Vec<f64>)>;

impl Traveller {
    /// Generates one traveller
    pub fn generate<R: Rng + ?Sized>(
        id: usize,
        network: &RoadNetwork,
        places: &Places,
        config: &TravellerConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let home = draw_from(places, &config.home_category, rng)?;
        let work = draw_from(places, &config.work_category, rng)?;
        let weights = favourite_weights(home, network, places, config)?;
        Ok(Self::with_weights(id, home, work, &weights, places, config, rng))
    }

    /// Favourite junctions of a category, empty if the traveller has none
    pub fn favourites(&self, category: &str) -> &[OsmId] {
        self.favourites
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn with_weights<R: Rng + ?Sized>(
        id: usize,
        home: OsmId,
        work: OsmId,
        weights: &CategoryWeights,
        places: &Places,
        config: &TravellerConfig,
        rng: &mut R,
    ) -> Self {
        let mut favourites = BTreeMap::new();
        for (category, category_weights) in weights {
            let picked = pick_distinct(
                places.get(category),
                category_weights,
                config.favourites_per_category,
                rng,
            );
            if !picked.is_empty() {
                favourites.insert(category.clone(), picked);
            }
        }
        Self {
            id,
            home,
            work,
            favourites,
        }
    }
}

/// Generates `number` travellers
///
/// Proximity weights only depend on the home junction, so they are computed
/// once per distinct home.
pub fn form_travellers<R: Rng + ?Sized>(
    number: usize,
    network: &RoadNetwork,
    places: &Places,
    config: &TravellerConfig,
    rng: &mut R,
) -> Result<Vec<Traveller>> {
    if number == 0 {
        return Err(SimError::InvalidParameter(
            "at least one traveller is needed".to_string(),
        ));
    }

    let mut weight_cache: FxHashMap<OsmId, CategoryWeights> = FxHashMap::default();
    let mut travellers = Vec::with_capacity(number);

    for id in 0..number {
        let home = draw_from(places, &config.home_category, rng)?;
        let work = draw_from(places, &config.work_category, rng)?;
        if !weight_cache.contains_key(&home) {
            let weights = favourite_weights(home, network, places, config)?;
            weight_cache.insert(home, weights);
        }
        let weights = &weight_cache[&home];
        travellers.push(Traveller::with_weights(
            id, home, work, weights, places, config, rng,
        ));
    }

    info!(
        travellers = travellers.len(),
        distinct_homes = weight_cache.len(),
        "Formed travellers"
    );
    Ok(travellers)
}

fn draw_from<R: Rng + ?Sized>(places: &Places, category: &str, rng: &mut R) -> Result<OsmId> {
    places
        .get(category)
        .choose(rng)
        .copied()
        .ok_or_else(|| SimError::NoPlaces {
            category: category.to_string(),
        })
}

fn favourite_weights(
    home: OsmId,
    network: &RoadNetwork,
    places: &Places,
    config: &TravellerConfig,
) -> Result<CategoryWeights> {
    let home_coord = network.coord(home).ok_or(SimError::UnknownNode(home))?;

    Ok(places
        .categories()
        .filter(|c| *c != config.home_category && *c != config.work_category)
        .map(|category| {
            let weights = places
                .get(category)
                .iter()
                .map(|node| match network.coord(*node) {
                    Some(coord) => {
                        let d = haversine_miles(home_coord, coord);
                        (-d / config.proximity_decay_miles)
                            .exp()
                            .max(f64::MIN_POSITIVE)
                    }
                    None => 0.0,
                })
                .collect();
            (category.to_string(), weights)
        })
        .collect())
}

/// Weighted draw of up to `k` distinct junctions
fn pick_distinct<R: Rng + ?Sized>(
    candidates: &[OsmId],
    weights: &[f64],
    k: usize,
    rng: &mut R,
) -> Vec<OsmId> {
    let mut weights = weights.to_vec();
    let mut picked = Vec::with_capacity(k);

    while picked.len() < k {
        // fails once every weight is zero
        let Ok(dist) = WeightedIndex::new(&weights) else {
            break;
        };
        let node = candidates[dist.sample(rng)];
        picked.push(node);
        for (candidate, weight) in candidates.iter().zip(weights.iter_mut()) {
            if *candidate == node {
                *weight = 0.0;
            }
        }
    }
    picked
}
