//! Road network formation
//!
//! Abstracts a junction-to-junction road graph out of the raw OSM data.
//!
//! ## Nodes
//! Traffic junctions and dead ends of the road system, keyed by their raw
//! OSM id and carrying their coordinate. A raw node becomes a junction when
//! its `highway` tag is a junction tag, when several roads share it, or when
//! a road starts or ends there (the last two are configurable).
//!
//! ## Edges
//! Undirected road segments between consecutive junctions of a way, with the
//! road name, the along-road distance and the time a common traveller needs
//! to cover it (distance / speed of the highway type).

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::geo::{distance_miles, Coord};
use crate::osm::{OsmId, RawOsm, Way};
use crate::spatial::SpatialIndex;

const KMH_TO_MPH: f64 = 0.621_371;
const MILLIS_PER_HOUR: f64 = 3_600_000.0;
/// Slowest `maxspeed` accepted, lower values are treated as bad tagging
const MIN_MAXSPEED_MPH: f64 = 1.0;
/// Upper bound of a single edge cost, keeps path sums far from overflow
const MAX_EDGE_COST: u64 = u32::MAX as u64;

/// Road segment between two junctions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: OsmId,
    pub b: OsmId,
    /// Road name, empty when the way has none
    pub name: String,
    /// `highway` tag of the way
    pub highway: String,
    /// Along-road length in miles
    pub distance: f64,
    /// Traversal time in hours
    pub travel_time: f64,
}

impl Edge {
    /// Endpoint opposite to `node`
    pub fn other(&self, node: OsmId) -> OsmId {
        if self.a == node {
            self.b
        } else {
            self.a
        }
    }

    /// Travel time in whole milliseconds, the integer weight used for routing
    ///
    /// Capped at `u32::MAX` so summing costs along any path stays in range.
    pub fn cost(&self) -> u64 {
        let millis = (self.travel_time * MILLIS_PER_HOUR).round();
        if millis.is_nan() {
            return MAX_EDGE_COST;
        }
        (millis.max(0.0) as u64).min(MAX_EDGE_COST)
    }

    fn key(&self) -> (OsmId, OsmId) {
        pair_key(self.a, self.b)
    }
}

fn pair_key(a: OsmId, b: OsmId) -> (OsmId, OsmId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Summary figures of a network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub nodes: usize,
    pub edges: usize,
    pub components: usize,
    pub largest_component: usize,
    pub dead_ends: usize,
    pub total_length_miles: f64,
}

/// Undirected road graph with travel-time weights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "NetworkParts")]
pub struct RoadNetwork {
    nodes: BTreeMap<OsmId, Coord>,
    edges: Vec<Edge>,
    #[serde(skip)]
    adjacency: FxHashMap<OsmId, Vec<usize>>,
    #[serde(skip)]
    pair_index: FxHashMap<(OsmId, OsmId), usize>,
}

#[derive(Deserialize)]
struct NetworkParts {
    nodes: BTreeMap<OsmId, Coord>,
    edges: Vec<Edge>,
}

impl From<NetworkParts> for RoadNetwork {
    fn from(parts: NetworkParts) -> Self {
        let mut network = RoadNetwork {
            nodes: parts.nodes,
            edges: Vec::new(),
            adjacency: FxHashMap::default(),
            pair_index: FxHashMap::default(),
        };
        for edge in parts.edges {
            network.add_edge(edge);
        }
        network
    }
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: OsmId, coord: Coord) {
        self.nodes.insert(id, coord);
    }

    /// Adds an edge between two known nodes
    ///
    /// Self loops and edges touching unknown nodes are refused. Between a
    /// pair of nodes only the fastest edge is kept. Returns whether the edge
    /// was stored.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if edge.a == edge.b || !self.contains(edge.a) || !self.contains(edge.b) {
            return false;
        }

        let key = edge.key();
        if let Some(&existing) = self.pair_index.get(&key) {
            if edge.travel_time < self.edges[existing].travel_time {
                self.edges[existing] = edge;
                return true;
            }
            return false;
        }

        let idx = self.edges.len();
        self.adjacency.entry(edge.a).or_default().push(idx);
        self.adjacency.entry(edge.b).or_default().push(idx);
        self.pair_index.insert(key, idx);
        self.edges.push(edge);
        true
    }

    pub fn contains(&self, id: OsmId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn coord(&self, id: OsmId) -> Option<Coord> {
        self.nodes.get(&id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Junctions in id order
    pub fn nodes(&self) -> impl Iterator<Item = (OsmId, Coord)> + '_ {
        self.nodes.iter().map(|(id, c)| (*id, *c))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Adjacent junctions together with the connecting edge
    pub fn neighbours(&self, id: OsmId) -> impl Iterator<Item = (OsmId, &Edge)> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flatten()
            .map(move |&idx| {
                let edge = &self.edges[idx];
                (edge.other(id), edge)
            })
    }

    pub fn degree(&self, id: OsmId) -> usize {
        self.adjacency.get(&id).map_or(0, Vec::len)
    }

    pub fn edge_between(&self, a: OsmId, b: OsmId) -> Option<&Edge> {
        self.pair_index
            .get(&pair_key(a, b))
            .map(|&idx| &self.edges[idx])
    }

    /// Grid index over all junctions, for bulk nearest-node queries
    pub fn spatial_index(&self) -> SpatialIndex {
        SpatialIndex::build(self.nodes())
    }

    /// Junction closest to `coord` (linear scan, use [`Self::spatial_index`]
    /// for many queries)
    pub fn nearest_node(&self, coord: Coord) -> Option<OsmId> {
        self.nodes()
            .map(|(id, c)| (distance_miles(coord, c), id))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    /// Removes junctions without any edge, returns how many were removed
    pub fn prune_isolated(&mut self) -> usize {
        let before = self.nodes.len();
        let adjacency = &self.adjacency;
        self.nodes
            .retain(|id, _| adjacency.get(id).is_some_and(|edges| !edges.is_empty()));
        before - self.nodes.len()
    }

    /// Connected components, largest first (ties by smallest member id)
    pub fn components(&self) -> Vec<Vec<OsmId>> {
        let mut seen: FxHashSet<OsmId> = FxHashSet::default();
        let mut components = Vec::new();

        for &start in self.nodes.keys() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for (next, _) in self.neighbours(current) {
                    if seen.insert(next) {
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }

        components.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        components
    }

    pub fn stats(&self) -> NetworkStats {
        let components = self.components();
        NetworkStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            components: components.len(),
            largest_component: components.first().map_or(0, Vec::len),
            dead_ends: self.nodes.keys().filter(|id| self.degree(**id) == 1).count(),
            total_length_miles: self.edges.iter().map(|e| e.distance).sum(),
        }
    }
}

/// Forms the road network from raw OSM data
pub fn form_network_from_osm(
    raw: &RawOsm,
    config: &NetworkConfig,
) -> Result<RoadNetwork, NetworkError> {
    let table = config
        .speeds_mph
        .iter()
        .map(|(highway, speed)| (highway.as_str(), *speed));
    let fallback = config.default_speed_mph.map(|speed| ("<default>", speed));
    for (highway, speed) in table.chain(fallback) {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(NetworkError::InvalidSpeed {
                highway: highway.to_string(),
                speed,
            });
        }
    }

    // anything with a highway tag is a road, the rest are buildings and such
    let roads: Vec<(OsmId, &Way, &str)> = raw
        .ways
        .iter()
        .filter_map(|(id, way)| way.tag("highway").map(|h| (*id, way, h)))
        .collect();

    let mut usage: FxHashMap<OsmId, u32> = FxHashMap::default();
    let mut ends: FxHashSet<OsmId> = FxHashSet::default();
    for (_, way, _) in &roads {
        for node_id in &way.nodes {
            *usage.entry(*node_id).or_insert(0) += 1;
        }
        if let (Some(first), Some(last)) = (way.nodes.first(), way.nodes.last()) {
            ends.insert(*first);
            ends.insert(*last);
        }
    }

    let mut network = RoadNetwork::new();
    for (id, node) in &raw.nodes {
        let tagged = node
            .tag("highway")
            .is_some_and(|h| config.is_junction_tag(h));
        let shared = config.split_at_shared_nodes && usage.get(id).is_some_and(|n| *n >= 2);
        let end = config.split_at_way_ends && ends.contains(id);
        if tagged || shared || end {
            network.add_node(*id, node.coord);
        }
    }

    let mut missing_refs = 0usize;
    for (way_id, way, highway) in &roads {
        let mut speed: Option<f64> = None;
        let mut prev_junction: Option<OsmId> = None;
        let mut prev_coord: Option<Coord> = None;
        let mut distance = 0.0;

        for node_id in &way.nodes {
            let Some(node) = raw.node(*node_id) else {
                missing_refs += 1;
                continue;
            };

            if let Some(prev) = prev_coord {
                distance += distance_miles(prev, node.coord);
            }
            prev_coord = Some(node.coord);

            if !network.contains(*node_id) {
                continue;
            }

            if let Some(prev_id) = prev_junction {
                let mph = match speed {
                    Some(mph) => mph,
                    None => {
                        let mph = way_speed(*way_id, way, highway, config)?;
                        speed = Some(mph);
                        mph
                    }
                };
                network.add_edge(Edge {
                    a: prev_id,
                    b: *node_id,
                    name: way.tag("name").unwrap_or_default().to_string(),
                    highway: highway.to_string(),
                    distance,
                    travel_time: distance / mph,
                });
            }
            // restart from this junction whether or not an edge was added
            prev_junction = Some(*node_id);
            distance = 0.0;
        }
    }

    if missing_refs > 0 {
        warn!(missing_refs, "Ways reference nodes absent from the export, skipped them");
    }

    if config.prune_isolated_nodes {
        let pruned = network.prune_isolated();
        if pruned > 0 {
            debug!(pruned, "Pruned junctions without roads");
        }
    }

    info!(
        nodes = network.node_count(),
        edges = network.edge_count(),
        "Formed road network"
    );
    Ok(network)
}

fn way_speed(
    way_id: OsmId,
    way: &Way,
    highway: &str,
    config: &NetworkConfig,
) -> Result<f64, NetworkError> {
    if config.honor_maxspeed {
        if let Some(mph) = way.tag("maxspeed").and_then(parse_maxspeed) {
            return Ok(mph);
        }
    }
    config
        .speed_for(highway)
        .ok_or_else(|| NetworkError::UnknownHighway {
            way: way_id,
            highway: highway.to_string(),
        })
}

/// Parses a `maxspeed` value into mph; bare numbers are km/h
///
/// Values below 1 mph or not finite are rejected.
pub fn parse_maxspeed(value: &str) -> Option<f64> {
    let value = value.trim();
    let mph = match value.strip_suffix("mph") {
        Some(mph) => mph.trim().parse::<f64>().ok()?,
        None => {
            let kmh = value
                .strip_suffix("km/h")
                .or_else(|| value.strip_suffix("kmh"))
                .unwrap_or(value);
            kmh.trim().parse::<f64>().ok()? * KMH_TO_MPH
        }
    };
    Some(mph).filter(|s| s.is_finite() && *s >= MIN_MAXSPEED_MPH)
}
