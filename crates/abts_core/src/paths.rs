//! Fastest routes for the generated trips
//!
//! Routing runs Dijkstra over integer millisecond costs (see
//! [`Edge::cost`]). Trips sharing an origin are served by a single search
//! from that origin, and the searches of different origins run in parallel.
//! Trips with identical endpoints share one [`Route`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use pathfinding::prelude::{build_path, dijkstra, dijkstra_all};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SimError};
use crate::network::{Edge, RoadNetwork};
use crate::osm::OsmId;
use crate::trips::Trip;

/// Junction sequence between two junctions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub origin: OsmId,
    pub destination: OsmId,
    /// Both ends included
    pub nodes: Vec<OsmId>,
    /// Miles
    pub distance: f64,
    /// Hours
    pub travel_time: f64,
}

impl Route {
    fn from_nodes(network: &RoadNetwork, nodes: Vec<OsmId>) -> Self {
        let (distance, travel_time) = nodes
            .windows(2)
            .filter_map(|pair| network.edge_between(pair[0], pair[1]))
            .fold((0.0, 0.0), |(d, t), edge| (d + edge.distance, t + edge.travel_time));
        Self {
            origin: nodes[0],
            destination: nodes[nodes.len() - 1],
            nodes,
            distance,
            travel_time,
        }
    }

    /// Number of edges travelled
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Route taken by one trip
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    /// Index of the trip in the routed trip list
    pub trip: usize,
    pub route: Arc<Route>,
}

/// Routing outcome of a trip list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSet {
    /// Routed trips, in trip order
    pub paths: Vec<ShortestPath>,
    /// Indices of the trips with no connecting path
    pub unreachable: Vec<usize>,
}

impl PathSet {
    pub fn reachable(&self) -> usize {
        self.paths.len()
    }

    /// Hours spent on the road over all routed trips
    pub fn total_travel_time(&self) -> f64 {
        self.paths.iter().map(|p| p.route.travel_time).sum()
    }

    pub fn total_distance(&self) -> f64 {
        self.paths.iter().map(|p| p.route.distance).sum()
    }

    /// Mean hours per routed trip, `None` when nothing was routed
    pub fn mean_travel_time(&self) -> Option<f64> {
        if self.paths.is_empty() {
            None
        } else {
            Some(self.total_travel_time() / self.paths.len() as f64)
        }
    }
}

fn successors(network: &RoadNetwork, node: OsmId) -> impl Iterator<Item = (OsmId, u64)> + '_ {
    network
        .neighbours(node)
        .map(|(next, edge): (OsmId, &Edge)| (next, edge.cost()))
}

fn check_node(network: &RoadNetwork, node: OsmId) -> Result<()> {
    if network.contains(node) {
        Ok(())
    } else {
        Err(SimError::UnknownNode(node))
    }
}

/// Fastest route between two junctions
pub fn shortest_path(network: &RoadNetwork, origin: OsmId, destination: OsmId) -> Result<Route> {
    check_node(network, origin)?;
    check_node(network, destination)?;

    let (nodes, _) = dijkstra(
        &origin,
        |n| successors(network, *n),
        |n| *n == destination,
    )
    .ok_or(SimError::NoPath {
        origin,
        destination,
    })?;
    Ok(Route::from_nodes(network, nodes))
}

/// Routes every trip over its fastest path
///
/// Fails with [`SimError::UnknownNode`] when a trip starts or ends outside
/// the network.
pub fn compute_paths(network: &RoadNetwork, trips: &[Trip]) -> Result<PathSet> {
    let mut targets: BTreeMap<OsmId, BTreeSet<OsmId>> = BTreeMap::new();
    for trip in trips {
        check_node(network, trip.origin)?;
        check_node(network, trip.destination)?;
        targets
            .entry(trip.origin)
            .or_default()
            .insert(trip.destination);
    }

    let searches: Vec<(OsmId, BTreeSet<OsmId>)> = targets.into_iter().collect();
    let routes: FxHashMap<(OsmId, OsmId), Option<Arc<Route>>> = searches
        .par_iter()
        .flat_map_iter(|(origin, destinations)| routes_from(network, *origin, destinations))
        .collect();

    let mut set = PathSet::default();
    for (index, trip) in trips.iter().enumerate() {
        match routes.get(&(trip.origin, trip.destination)).cloned().flatten() {
            Some(route) => set.paths.push(ShortestPath { trip: index, route }),
            None => set.unreachable.push(index),
        }
    }

    info!(
        trips = trips.len(),
        origins = searches.len(),
        routes = routes.len(),
        unreachable = set.unreachable.len(),
        "Computed paths"
    );
    Ok(set)
}

/// Routes from one origin to each destination, `None` where unreachable
fn routes_from(
    network: &RoadNetwork,
    origin: OsmId,
    destinations: &BTreeSet<OsmId>,
) -> Vec<((OsmId, OsmId), Option<Arc<Route>>)> {
    // a single target is cheaper with an early-exit search
    if destinations.len() == 1 {
        let destination = *destinations.iter().next().unwrap_or(&origin);
        let route = shortest_path(network, origin, destination).ok().map(Arc::new);
        return vec![((origin, destination), route)];
    }

    let parents = dijkstra_all(&origin, |n| successors(network, *n));
    destinations
        .iter()
        .map(|&destination| {
            let route = if destination == origin || parents.contains_key(&destination) {
                Some(Arc::new(Route::from_nodes(
                    network,
                    build_path(&destination, &parents),
                )))
            } else {
                debug!(origin, destination, "No path between junctions");
                None
            };
            ((origin, destination), route)
        })
        .collect()
}
