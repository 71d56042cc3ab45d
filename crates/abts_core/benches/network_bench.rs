// Benchmarks for network formation and routing
// Runs on synthetic street grids of growing size

use abts_core::{
    compute_paths, form_network_from_osm, NetworkConfig, Node, OsmId, RawOsm, Trip, Way,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// `size` x `size` junctions, one residential way per row and column
fn grid(size: i64) -> RawOsm {
    let id = |row: i64, col: i64| row * size + col + 1;
    let mut raw = RawOsm::new();
    for row in 0..size {
        for col in 0..size {
            let lat = 51.5 + row as f64 * 0.002;
            let lon = -0.1 + col as f64 * 0.003;
            raw.insert_node(id(row, col), Node::new(lat, lon));
        }
    }

    let mut way_id = 1_000_000;
    for row in 0..size {
        let nodes = (0..size).map(|col| id(row, col)).collect();
        raw.insert_way(way_id, Way::new(nodes).with_tag("highway", "residential"));
        way_id += 1;
    }
    for col in 0..size {
        let nodes = (0..size).map(|row| id(row, col)).collect();
        raw.insert_way(way_id, Way::new(nodes).with_tag("highway", "secondary"));
        way_id += 1;
    }
    raw
}

fn bench_form_network(c: &mut Criterion) {
    let config = NetworkConfig::default();
    let mut group = c.benchmark_group("form_network");
    for size in [10, 30, 60] {
        let raw = grid(size);
        group.bench_with_input(BenchmarkId::from_parameter(size * size), &raw, |b, raw| {
            b.iter(|| form_network_from_osm(black_box(raw), &config))
        });
    }
    group.finish();
}

fn bench_compute_paths(c: &mut Criterion) {
    let size = 40;
    let network = match form_network_from_osm(&grid(size), &NetworkConfig::default()) {
        Ok(network) => network,
        Err(e) => panic!("grid network failed to form: {}", e),
    };
    let nodes: Vec<OsmId> = network.nodes().map(|(id, _)| id).collect();

    let mut group = c.benchmark_group("compute_paths");
    for origins in [1usize, 10, 50] {
        let trips: Vec<Trip> = (0..origins * 20)
            .map(|i| Trip {
                traveller: i,
                template: 0,
                week: 0,
                origin: nodes[(i % origins) * 7 % nodes.len()],
                destination: nodes[(i * 31) % nodes.len()],
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("origins", origins), &trips, |b, trips| {
            b.iter(|| compute_paths(&network, black_box(trips)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_form_network, bench_compute_paths);
criterion_main!(benches);
