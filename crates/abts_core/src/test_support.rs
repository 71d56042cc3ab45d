//! Shared fixtures for unit tests

use crate::config::SimulationConfig;
use crate::network::{form_network_from_osm, RoadNetwork};
use crate::osm::{parse_osm_str, RawOsm};
use crate::places::{form_places_from_osm, Places};

/// A 3x3 street grid with a detached farm lane and a handful of places
pub const SMALL_TOWN_OSM: &str = include_str!("../fixtures/small_town.osm");

pub fn small_town() -> RawOsm {
    parse_osm_str(SMALL_TOWN_OSM).expect("fixture parses")
}

pub fn small_town_network() -> RoadNetwork {
    form_network_from_osm(&small_town(), &SimulationConfig::default().network)
        .expect("fixture network forms")
}

pub fn small_town_places() -> (RoadNetwork, Places) {
    let raw = small_town();
    let config = SimulationConfig::default();
    let network = form_network_from_osm(&raw, &config.network).expect("fixture network forms");
    let places =
        form_places_from_osm(&raw, &network, &config.places).expect("fixture places form");
    (network, places)
}
