//! Summary of a completed simulation run

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::NetworkStats;
use crate::paths::PathSet;
use crate::trips::{Trip, TripTemplate};

const MINUTES_PER_HOUR: f64 = 60.0;

/// Per-activity breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    pub name: String,
    pub trips: usize,
    pub unreachable: usize,
    pub total_travel_time_hours: f64,
    pub mean_trip_time_minutes: f64,
    pub mean_distance_miles: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub travellers: usize,
    pub weeks: u32,
    pub network: NetworkStats,
    pub places: BTreeMap<String, usize>,
    pub trips: usize,
    pub reachable_trips: usize,
    pub unreachable_trips: usize,
    pub total_travel_time_hours: f64,
    pub total_distance_miles: f64,
    /// Mean hours per routed trip, divided by the number of weeks
    pub mean_time: f64,
    pub mean_trip_time_minutes: f64,
    pub mean_weekly_time_per_traveller_hours: f64,
    pub templates: Vec<TemplateSummary>,
}

impl SimulationReport {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Per-template figures over a routed trip list
pub(crate) fn summarize_templates(
    templates: &[TripTemplate],
    trips: &[Trip],
    paths: &PathSet,
) -> Vec<TemplateSummary> {
    let mut summaries: Vec<TemplateSummary> = templates
        .iter()
        .map(|t| TemplateSummary {
            name: t.name.clone(),
            trips: 0,
            unreachable: 0,
            total_travel_time_hours: 0.0,
            mean_trip_time_minutes: 0.0,
            mean_distance_miles: 0.0,
        })
        .collect();
    let mut distances = vec![0.0; templates.len()];

    for trip in trips {
        if let Some(summary) = summaries.get_mut(trip.template) {
            summary.trips += 1;
        }
    }
    for &index in &paths.unreachable {
        if let Some(summary) = summaries.get_mut(trips[index].template) {
            summary.unreachable += 1;
        }
    }
    for path in &paths.paths {
        let template = trips[path.trip].template;
        if let Some(summary) = summaries.get_mut(template) {
            summary.total_travel_time_hours += path.route.travel_time;
            distances[template] += path.route.distance;
        }
    }

    for (summary, distance) in summaries.iter_mut().zip(distances) {
        let routed = summary.trips - summary.unreachable;
        if routed > 0 {
            summary.mean_trip_time_minutes =
                summary.total_travel_time_hours / routed as f64 * MINUTES_PER_HOUR;
            summary.mean_distance_miles = distance / routed as f64;
        }
    }
    summaries
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Seed:        {}", self.seed)?;
        writeln!(f, "Travellers:  {}", self.travellers)?;
        writeln!(f, "Weeks:       {}", self.weeks)?;
        writeln!(
            f,
            "Network:     {} junctions, {} roads, {:.1} mi",
            self.network.nodes, self.network.edges, self.network.total_length_miles
        )?;
        let places: Vec<String> = self
            .places
            .iter()
            .map(|(category, count)| format!("{} {}", count, category))
            .collect();
        writeln!(f, "Places:      {}", places.join(", "))?;
        writeln!(
            f,
            "Trips:       {} ({} unreachable)",
            self.trips, self.unreachable_trips
        )?;
        writeln!(
            f,
            "Mean trip:   {:.1} min ({:.4} h per week)",
            self.mean_trip_time_minutes, self.mean_time
        )?;
        writeln!(
            f,
            "On the road: {:.2} h per traveller per week",
            self.mean_weekly_time_per_traveller_hours
        )?;
        for t in &self.templates {
            writeln!(
                f,
                "  {:<12} {:>7} trips {:>7.1} min {:>6.2} mi",
                t.name, t.trips, t.mean_trip_time_minutes, t.mean_distance_miles
            )?;
        }
        Ok(())
    }
}
