use std::fmt;

use thiserror::Error;

use crate::osm::OsmId;

/// Errors raised while reading an OSM XML export
#[derive(Error, Debug)]
pub enum OsmError {
    #[error("Input file {path} unable to be opened: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parsing failure at byte {position} of {source_name}: {source}")]
    Xml {
        source_name: String,
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Unrecognized XML element <{0}>")]
    UnrecognizedElement(String),

    #[error("Element <{element}> is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    #[error("Element <{element}> has invalid {attribute}='{value}'")]
    InvalidAttribute { element: String, attribute: String, value: String },

    #[error("Mismatched closing element </{0}>")]
    Unbalanced(String),
}

/// Errors raised while abstracting the road network
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Unknown highway type '{highway}' on way {way}")]
    UnknownHighway { way: OsmId, highway: String },

    #[error("Invalid speed {speed} mph for highway type '{highway}'")]
    InvalidSpeed { highway: String, speed: f64 },
}

/// Errors raised while loading or validating a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config extension for {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors raised by the snapshot format
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Decompression error")]
    Decompression,

    #[error("Corrupted data")]
    Corrupted,

    #[error("Version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

/// Simulation stages, in the order they have to be formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    RawData,
    Network,
    Places,
    Travellers,
    Trips,
    Paths,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Stage::RawData => "Raw OSM data",
            Stage::Network => "Network",
            Stage::Places => "Places",
            Stage::Travellers => "Travellers",
            Stage::Trips => "Trips",
            Stage::Paths => "Paths",
        };
        f.write_str(name)
    }
}

/// Top level error of the simulation
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Osm(#[from] OsmError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("{stage} unavailable for {operation}")]
    MissingStage { stage: Stage, operation: &'static str },

    #[error("No places of category '{category}' available")]
    NoPlaces { category: String },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No path from node {origin} to node {destination}")]
    NoPath { origin: OsmId, destination: OsmId },

    #[error("Node {0} is not part of the network")]
    UnknownNode(OsmId),

    #[error("No trip could be routed, mean travel time is undefined")]
    NoReachablePaths,
}

pub type Result<T> = std::result::Result<T, SimError>;
