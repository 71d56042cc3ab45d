//! The simulation model
//!
//! [`Model`] owns every stage of the pipeline and enforces their order:
//! raw OSM data, network, places, travellers, trips, paths. A stage can only
//! be formed once its predecessors exist, and forming a stage again throws
//! away everything built on top of it.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::SimulationConfig;
use crate::error::{Result, SimError, Stage};
use crate::network::{form_network_from_osm, RoadNetwork};
use crate::osm::{read_osm, RawOsm};
use crate::paths::{self, PathSet};
use crate::places::{form_places_from_osm, Places};
use crate::report::{summarize_templates, SimulationReport};
use crate::snapshot::ModelSnapshot;
use crate::travellers::{self, Traveller};
use crate::trips::{self, Trip, TripTemplate};

#[derive(Debug, Clone)]
pub struct Model {
    config: SimulationConfig,
    rng: ChaCha8Rng,
    source: Option<String>,

    raw_osm: Option<RawOsm>,
    network: Option<RoadNetwork>,
    places: Option<Places>,
    travellers: Option<Vec<Traveller>>,
    trips: Option<Vec<Trip>>,
    paths: Option<PathSet>,

    /// Weeks covered by the generated trips
    time_span: u32,
    /// Templates the trips were generated from, indexed by `Trip::template`
    templates: Vec<TripTemplate>,
}

fn require<'a, T>(slot: &'a Option<T>, stage: Stage, operation: &'static str) -> Result<&'a T> {
    slot.as_ref()
        .ok_or(SimError::MissingStage { stage, operation })
}

impl Model {
    /// Reads an OSM XML export into a fresh model
    pub fn new<P: AsRef<Path>>(osm_file: P, config: SimulationConfig) -> Result<Self> {
        let path = osm_file.as_ref();
        let raw = read_osm(path)?;
        let mut model = Self::from_raw(raw, config)?;
        model.source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(model)
    }

    pub fn from_raw(raw: RawOsm, config: SimulationConfig) -> Result<Self> {
        let mut model = Self::empty(config)?;
        model.raw_osm = Some(raw);
        Ok(model)
    }

    /// Restores a model with its network and places already formed
    pub fn from_snapshot(snapshot: ModelSnapshot) -> Result<Self> {
        let mut model = Self::empty(snapshot.config)?;
        model.source = snapshot.source;
        model.network = Some(snapshot.network);
        model.places = Some(snapshot.places);
        Ok(model)
    }

    fn empty(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            source: None,
            raw_osm: None,
            network: None,
            places: None,
            travellers: None,
            trips: None,
            paths: None,
            time_span: 0,
            templates: Vec::new(),
        })
    }

    /// Captures the formed network and places
    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        let network = require(&self.network, Stage::Network, "snapshot")?;
        let places = require(&self.places, Stage::Places, "snapshot")?;
        let snapshot = ModelSnapshot::new(self.config.clone(), network.clone(), places.clone());
        Ok(match &self.source {
            Some(source) => snapshot.with_source(source.clone()),
            None => snapshot,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Restarts the random stream; formed stages are kept
    pub fn reseed(&mut self, seed: u64) {
        self.config.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn raw_osm(&self) -> Option<&RawOsm> {
        self.raw_osm.as_ref()
    }

    pub fn network(&self) -> Option<&RoadNetwork> {
        self.network.as_ref()
    }

    pub fn places(&self) -> Option<&Places> {
        self.places.as_ref()
    }

    pub fn travellers(&self) -> Option<&[Traveller]> {
        self.travellers.as_deref()
    }

    pub fn trips(&self) -> Option<&[Trip]> {
        self.trips.as_deref()
    }

    pub fn paths(&self) -> Option<&PathSet> {
        self.paths.as_ref()
    }

    pub fn time_span(&self) -> u32 {
        self.time_span
    }

    pub fn templates(&self) -> &[TripTemplate] {
        &self.templates
    }

    /// Drops every stage built on top of `stage`
    fn invalidate_after(&mut self, stage: Stage) {
        if stage < Stage::Places {
            self.places = None;
        }
        if stage < Stage::Travellers {
            self.travellers = None;
        }
        if stage < Stage::Trips {
            self.trips = None;
            self.time_span = 0;
            self.templates.clear();
        }
        if stage < Stage::Paths {
            self.paths = None;
        }
    }

    pub fn form_network(&mut self) -> Result<&RoadNetwork> {
        let raw = require(&self.raw_osm, Stage::RawData, "form_network")?;
        let network = form_network_from_osm(raw, &self.config.network)?;
        self.invalidate_after(Stage::Network);
        Ok(self.network.insert(network))
    }

    pub fn form_places(&mut self) -> Result<&Places> {
        let raw = require(&self.raw_osm, Stage::RawData, "form_places")?;
        let network = require(&self.network, Stage::Network, "form_places")?;
        let places = form_places_from_osm(raw, network, &self.config.places)?;
        self.invalidate_after(Stage::Places);
        Ok(self.places.insert(places))
    }

    pub fn form_travellers(&mut self, number: usize) -> Result<&[Traveller]> {
        let network = require(&self.network, Stage::Network, "form_travellers")?;
        let places = require(&self.places, Stage::Places, "form_travellers")?;
        let travellers = travellers::form_travellers(
            number,
            network,
            places,
            &self.config.travellers,
            &mut self.rng,
        )?;
        self.invalidate_after(Stage::Travellers);
        Ok(self.travellers.insert(travellers))
    }

    /// Generates the trips of every traveller over `time_span` weeks
    ///
    /// `None` uses the configured templates.
    pub fn gen_trips(
        &mut self,
        time_span: u32,
        templates: Option<&[TripTemplate]>,
    ) -> Result<&[Trip]> {
        let travellers = require(&self.travellers, Stage::Travellers, "gen_trips")?;
        let templates = match templates {
            Some(templates) => {
                for template in templates {
                    template.validate().map_err(SimError::InvalidParameter)?;
                }
                templates.to_vec()
            }
            None => self.config.trips.templates.clone(),
        };

        let mut generated = Vec::new();
        for traveller in travellers {
            generated.extend(trips::gen_trips(
                time_span,
                &templates,
                traveller,
                &mut self.rng,
            )?);
        }
        info!(
            trips = generated.len(),
            weeks = time_span,
            templates = templates.len(),
            "Generated trips"
        );

        self.invalidate_after(Stage::Trips);
        self.time_span = time_span;
        self.templates = templates;
        Ok(self.trips.insert(generated))
    }

    pub fn compute_paths(&mut self) -> Result<&PathSet> {
        let network = require(&self.network, Stage::Network, "compute_paths")?;
        let trips = require(&self.trips, Stage::Trips, "compute_paths")?;
        let paths = paths::compute_paths(network, trips)?;
        Ok(self.paths.insert(paths))
    }

    /// Mean hours per routed trip, divided by the number of weeks
    pub fn compute_mean_time(&self) -> Result<f64> {
        let paths = require(&self.paths, Stage::Paths, "compute_mean_time")?;
        let mean = paths.mean_travel_time().ok_or(SimError::NoReachablePaths)?;
        Ok(mean / self.time_span as f64)
    }

    /// Hours a traveller spends on the road in an average week
    pub fn mean_weekly_time_per_traveller(&self) -> Result<f64> {
        const OPERATION: &str = "mean_weekly_time_per_traveller";
        let paths = require(&self.paths, Stage::Paths, OPERATION)?;
        let travellers = require(&self.travellers, Stage::Travellers, OPERATION)?;
        Ok(paths.total_travel_time() / travellers.len() as f64 / self.time_span as f64)
    }

    /// Runs every remaining stage and reports
    ///
    /// The random stream restarts from the configured seed, so repeated runs
    /// with the same arguments give the same report. Network and places are
    /// only formed when missing.
    pub fn run(&mut self, travellers: usize, weeks: u32) -> Result<SimulationReport> {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        if self.network.is_none() {
            self.form_network()?;
        }
        if self.places.is_none() {
            self.form_places()?;
        }
        self.form_travellers(travellers)?;
        self.gen_trips(weeks, None)?;
        self.compute_paths()?;

        let report = self.report()?;
        info!(
            trips = report.trips,
            unreachable = report.unreachable_trips,
            mean_minutes = report.mean_trip_time_minutes,
            "Simulation finished"
        );
        Ok(report)
    }

    /// Summary of the current paths
    pub fn report(&self) -> Result<SimulationReport> {
        let network = require(&self.network, Stage::Network, "report")?;
        let places = require(&self.places, Stage::Places, "report")?;
        let travellers = require(&self.travellers, Stage::Travellers, "report")?;
        let trips = require(&self.trips, Stage::Trips, "report")?;
        let paths = require(&self.paths, Stage::Paths, "report")?;

        let mean_trip_hours = paths.mean_travel_time().unwrap_or(0.0);
        Ok(SimulationReport {
            seed: self.config.seed,
            travellers: travellers.len(),
            weeks: self.time_span,
            network: network.stats(),
            places: places.counts(),
            trips: trips.len(),
            reachable_trips: paths.reachable(),
            unreachable_trips: paths.unreachable.len(),
            total_travel_time_hours: paths.total_travel_time(),
            total_distance_miles: paths.total_distance(),
            mean_time: self.compute_mean_time().unwrap_or(0.0),
            mean_trip_time_minutes: mean_trip_hours * 60.0,
            mean_weekly_time_per_traveller_hours: self.mean_weekly_time_per_traveller()?,
            templates: summarize_templates(&self.templates, trips, paths),
        })
    }
}
