//! Prepared-model snapshots
//!
//! Parsing a large OSM export and abstracting its network is by far the
//! slowest part of a run. A snapshot stores the formed network and places
//! together with the configuration that produced them, so later runs can
//! skip straight to the travellers.
//!
//! ## Format
//! 1. MessagePack with field names
//! 2. LZ4 compression, uncompressed size prepended
//! 3. SHA-256 of the compressed payload appended

use std::fs::{rename, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::SimulationConfig;
use crate::error::SnapshotError;
use crate::network::RoadNetwork;
use crate::places::Places;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

const CHECKSUM_LEN: usize = 32;
const SIZE_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Format version for compatibility checks
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Name of the OSM export the model was formed from, when known
    #[serde(default)]
    pub source: Option<String>,
    pub config: SimulationConfig,
    pub network: RoadNetwork,
    pub places: Places,
}

impl ModelSnapshot {
    pub fn new(config: SimulationConfig, network: RoadNetwork, places: Places) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            source: None,
            config,
            network,
            places,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Every place has to sit on a junction of the stored network
    pub fn validate(&self) -> Result<(), SnapshotError> {
        for category in self.places.categories() {
            if self
                .places
                .get(category)
                .iter()
                .any(|node| !self.network.contains(*node))
            {
                return Err(SnapshotError::Corrupted);
            }
        }
        Ok(())
    }

    /// Serialize and compress
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        self.validate()?;

        let msgpack = to_vec_named(self)?;
        let compressed = compress_prepend_size(&msgpack);

        let mut hasher = Sha256::new();
        hasher.update(&compressed);
        let checksum = hasher.finalize();

        let mut bytes = compressed;
        bytes.extend_from_slice(&checksum);
        Ok(bytes)
    }

    /// Verify, decompress and deserialize
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < SIZE_PREFIX_LEN + CHECKSUM_LEN {
            return Err(SnapshotError::Corrupted);
        }

        let (payload, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let mut hasher = Sha256::new();
        hasher.update(payload);
        if hasher.finalize()[..] != *checksum {
            return Err(SnapshotError::ChecksumMismatch);
        }

        let msgpack = decompress_size_prepended(payload).map_err(|_| SnapshotError::Decompression)?;
        let snapshot: ModelSnapshot = from_slice(&msgpack)?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Writes the snapshot atomically (temp file, then rename)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = self.to_bytes()?;
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.flush()?;
            file.sync_all()?;
        }
        rename(&temp_path, path)?;

        debug!(bytes = data.len(), path = %path.display(), "Saved snapshot");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SnapshotError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        let snapshot = Self::from_bytes(&data)?;

        debug!(bytes = data.len(), path = %path.display(), "Loaded snapshot");
        Ok(snapshot)
    }
}
