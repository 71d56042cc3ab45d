//! Places of interest
//!
//! Tagged OSM features (point nodes and building outlines) are classified
//! by the ordered [`PlaceRule`](crate::config::PlaceRule)s and rounded to
//! the nearest junction of the road network, so every place is a node the
//! router can reach.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PlacesConfig;
use crate::error::{Result, SimError};
use crate::geo::{centroid, distance_miles, Coord};
use crate::network::RoadNetwork;
use crate::osm::{OsmId, RawOsm, Way};

/// Category name to junctions, one entry per place
///
/// Several places can round to the same junction; the duplicates stay, so a
/// busy junction is proportionally more likely in uniform draws.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Places {
    by_category: BTreeMap<String, Vec<OsmId>>,
}

impl Places {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: &str, node: OsmId) {
        self.by_category
            .entry(category.to_string())
            .or_default()
            .push(node);
    }

    /// Junctions of a category, empty when the category is unknown
    pub fn get(&self, category: &str) -> &[OsmId] {
        self.by_category
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.by_category.keys().map(String::as_str)
    }

    pub fn count(&self, category: &str) -> usize {
        self.get(category).len()
    }

    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.by_category
            .iter()
            .map(|(k, v)| (k.clone(), v.len()))
            .collect()
    }
}

/// Forms the places of interest and rounds them onto the network
pub fn form_places_from_osm(
    raw: &RawOsm,
    network: &RoadNetwork,
    config: &PlacesConfig,
) -> Result<Places> {
    if network.is_empty() {
        return Err(SimError::InvalidParameter(
            "the network has no junction to round places to".to_string(),
        ));
    }

    // (category, location) of every classified feature, nodes first
    let mut features: Vec<(&str, Coord)> = Vec::new();
    for node in raw.nodes.values() {
        if let Some(category) = config.classify(&node.tags) {
            features.push((category, node.coord));
        }
    }
    for (way_id, way) in &raw.ways {
        let Some(category) = config.classify(&way.tags) else {
            continue;
        };
        match way_location(raw, way) {
            Some(coord) => features.push((category, coord)),
            None => debug!(way = way_id, "Place outline has no resolvable node"),
        }
    }

    let index = network.spatial_index();
    let snapped: Vec<Option<(&str, OsmId)>> = features
        .par_iter()
        .map(|&(category, coord)| {
            let node = index.nearest(coord)?;
            if let Some(limit) = config.max_snap_distance_miles {
                let junction = network.coord(node)?;
                if distance_miles(coord, junction) > limit {
                    return None;
                }
            }
            Some((category, node))
        })
        .collect();

    let mut places = Places::new();
    let mut dropped = 0usize;
    for entry in snapped {
        match entry {
            Some((category, node)) => places.insert(category, node),
            None => dropped += 1,
        }
    }

    for (category, count) in places.counts() {
        debug!(category = %category, count, "Places per category");
    }
    info!(places = places.total(), dropped, "Formed places");
    Ok(places)
}

/// Centroid of the way's nodes, the closing node counted once
fn way_location(raw: &RawOsm, way: &Way) -> Option<Coord> {
    let refs = if way.is_closed() {
        &way.nodes[..way.nodes.len() - 1]
    } else {
        &way.nodes[..]
    };
    let coords: Vec<Coord> = refs
        .iter()
        .filter_map(|id| raw.node(*id).map(|n| n.coord))
        .collect();
    centroid(&coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::osm::Node;
    use crate::test_support::{small_town, small_town_places};

    #[test]
    fn test_places_on_fixture() {
        let (_, places) = small_town_places();
        assert_eq!(places.get("home"), &[1, 7, 9]);
        assert_eq!(places.get("work"), &[3]);
        assert_eq!(places.get("shopping"), &[5, 20]);
        assert_eq!(places.get("leisure"), &[8]);
        assert_eq!(places.get("education"), &[4]);
        assert_eq!(places.total(), 8);
        assert!(places.get("gym").is_empty());
    }

    #[test]
    fn test_snap_limit_drops_far_places() {
        let raw = small_town();
        let (network, _) = small_town_places();
        let mut config = SimulationConfig::default().places;
        // a couple of metres: only the apartment block sits on its junction
        config.max_snap_distance_miles = Some(0.001);

        let places = form_places_from_osm(&raw, &network, &config).unwrap();
        assert_eq!(places.get("home"), &[9]);
        assert_eq!(places.total(), 1);
    }

    #[test]
    fn test_way_centroid_ignores_closing_node() {
        let mut raw = RawOsm::new();
        raw.insert_node(1, Node::new(0.0, 0.0));
        raw.insert_node(2, Node::new(0.0, 2.0));
        raw.insert_node(3, Node::new(2.0, 2.0));
        raw.insert_node(4, Node::new(2.0, 0.0));
        let way = Way::new(vec![1, 2, 3, 4, 1]);
        assert_eq!(way_location(&raw, &way), Some(Coord::new(1.0, 1.0)));

        let broken = Way::new(vec![77, 78]);
        assert_eq!(way_location(&raw, &broken), None);
    }

    #[test]
    fn test_empty_network_rejected() {
        let err = form_places_from_osm(
            &small_town(),
            &RoadNetwork::new(),
            &SimulationConfig::default().places,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter(_)));
    }

    #[test]
    fn test_counts() {
        let mut places = Places::new();
        places.insert("home", 1);
        places.insert("home", 1);
        places.insert("work", 2);
        assert_eq!(places.count("home"), 2);
        assert_eq!(places.counts().get("work"), Some(&1));
        assert_eq!(places.categories().collect::<Vec<_>>(), vec!["home", "work"]);
    }
}
