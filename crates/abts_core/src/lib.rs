//! # abts_core - Activity-Based Traffic Simulation on OpenStreetMap data
//!
//! This library turns an OpenStreetMap XML export into a road network,
//! populates it with travellers who go about their weekly activities, and
//! measures how long they spend on the road.
//!
//! ## Pipeline
//! 1. [`osm`] parses the XML export into raw nodes and ways
//! 2. [`network`] abstracts the junction-to-junction road graph
//! 3. [`places`] rounds homes, workplaces, shops... to their nearest junction
//! 4. [`travellers`] generates the agents
//! 5. [`trips`] expands activity templates into concrete trips
//! 6. [`paths`] routes every trip over the fastest path
//!
//! [`model::Model`] drives the stages in order and is the main entry point.
//! Every random draw comes from a single seeded ChaCha8 stream, so the same
//! seed always reproduces the same simulation.
//!
//! ```no_run
//! use abts_core::{Model, SimulationConfig};
//!
//! let mut model = Model::new("town.osm", SimulationConfig::default())?;
//! let report = model.run(1000, 4)?;
//! println!("{:.1} minutes per trip", report.mean_trip_time_minutes);
//! # Ok::<(), abts_core::SimError>(())
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod network;
pub mod osm;
pub mod paths;
pub mod places;
pub mod report;
pub mod snapshot;
pub mod spatial;
pub mod travellers;
pub mod trips;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    NetworkConfig, PlaceRule, PlacesConfig, SimulationConfig, TravellerConfig, TripsConfig,
};
pub use error::{ConfigError, NetworkError, OsmError, Result, SimError, SnapshotError, Stage};
pub use geo::Coord;
pub use model::Model;
pub use network::{form_network_from_osm, Edge, NetworkStats, RoadNetwork};
pub use osm::{parse_osm_str, read_osm, Node, OsmId, RawOsm, Tags, Way};
pub use paths::{compute_paths, shortest_path, PathSet, Route, ShortestPath};
pub use places::{form_places_from_osm, Places};
pub use report::{SimulationReport, TemplateSummary};
pub use snapshot::ModelSnapshot;
pub use travellers::{form_travellers, Traveller};
pub use trips::{default_trips, gen_trips, Frequency, Location, Trip, TripTemplate};
