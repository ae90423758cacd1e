//! Synthetic supply data shared by the demos and benchmarks, so neither has
//! to hand-roll a toy transit network inline. No file parsing: every table
//! is built in memory, matching `hyperpath::Supply`'s read-only contract.

use std::collections::HashMap;

use hyperpath::in_memory::InMemorySupply;
use hyperpath::path::PathSpecification;
use hyperpath::supply::{
    AccessEgressLink, DemandModeType, StopTimeRecord, TripInfo, ZoneId,
};

pub const ORIGIN_ZONE: ZoneId = 1;
pub const DEST_ZONE: ZoneId = 2;

fn weights(ivt: f64, wait: f64, walk: f64, fare: f64) -> HashMap<String, f64> {
    let mut w = HashMap::new();
    w.insert("in_vehicle_time_min".to_string(), ivt);
    w.insert("wait_time_min".to_string(), wait);
    w.insert("walk_time_min".to_string(), walk);
    w.insert("transfer_penalty".to_string(), 5.0);
    w.insert("fare".to_string(), fare);
    w
}

/// Builds the scenario from the end-to-end test "Outbound, deterministic,
/// no transfers": stops 10 and 11, access A->10 (5 min), a trip 10->11
/// departing 8:00 arriving 8:10, egress 11->B (3 min), queried for an
/// 8:15 preferred arrival.
pub fn build_small_scenario() -> (InMemorySupply, PathSpecification) {
    let mut supply = InMemorySupply::new();

    supply.add_access_egress_link(
        "walk",
        AccessEgressLink { zone: ORIGIN_ZONE, supply_mode: 0, stop: 10, start_time: 0.0, end_time: 1440.0, time: 5.0, dist: 0.4, attributes: HashMap::new() },
    );
    supply.add_access_egress_link(
        "walk",
        AccessEgressLink { zone: DEST_ZONE, supply_mode: 0, stop: 11, start_time: 0.0, end_time: 1440.0, time: 3.0, dist: 0.2, attributes: HashMap::new() },
    );

    supply.add_trip(
        1,
        TripInfo { supply_mode: 1, route: "R1".to_string(), attributes: HashMap::new() },
        vec![
            StopTimeRecord { trip_id: 1, seq: 1, stop_id: 10, arrive_time: 480.0, depart_time: 480.0 },
            StopTimeRecord { trip_id: 1, seq: 2, stop_id: 11, arrive_time: 490.0, depart_time: 490.0 },
        ],
    );

    supply.set_weights("default", DemandModeType::Access, "walk", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.set_weights("default", DemandModeType::Egress, "walk", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.set_weights("default", DemandModeType::Transit, "transit", 1, weights(1.0, 1.5, 0.0, 0.0));
    supply.set_weights("default", DemandModeType::Transfer, "transfer", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.build();

    let spec = PathSpecification {
        iteration: 0,
        pathfinding_iteration: 0,
        outbound: true,
        hyperpath: false,
        orig_taz: ORIGIN_ZONE,
        dest_taz: DEST_ZONE,
        preferred_time: 495.0,
        value_of_time: 12.0,
        access_demand_mode: "walk".to_string(),
        transit_demand_mode: "transit".to_string(),
        egress_demand_mode: "walk".to_string(),
        user_class: "default".to_string(),
        purpose: "work".to_string(),
        trace: false,
        person_id: "p1".to_string(),
        person_trip_id: "p1-1".to_string(),
    };

    (supply, spec)
}

/// A wider synthetic network for benchmarking: `num_stops` stops in a loop,
/// served by `num_trips` instances of the same route, ten minutes apart.
/// Access/egress are available at every stop so a query can always resolve.
pub fn build_benchmark_scenario(num_stops: u32, num_trips: u32) -> (InMemorySupply, PathSpecification) {
    let mut supply = InMemorySupply::new();
    let mut rng = fastrand::Rng::with_seed(42);

    for stop in 0..num_stops {
        supply.add_access_egress_link(
            "walk",
            AccessEgressLink { zone: ORIGIN_ZONE, supply_mode: 0, stop, start_time: 0.0, end_time: 1440.0, time: 2.0 + rng.f64() * 8.0, dist: 0.5, attributes: HashMap::new() },
        );
        supply.add_access_egress_link(
            "walk",
            AccessEgressLink { zone: DEST_ZONE, supply_mode: 0, stop, start_time: 0.0, end_time: 1440.0, time: 2.0 + rng.f64() * 8.0, dist: 0.5, attributes: HashMap::new() },
        );
    }

    for trip in 0..num_trips {
        let offset = trip as f64 * 10.0;
        let mut stop_times = Vec::with_capacity(num_stops as usize);
        for (seq, stop) in (0..num_stops).enumerate() {
            let t = offset + seq as f64 * 3.0;
            stop_times.push(StopTimeRecord { trip_id: trip, seq: seq as i32 + 1, stop_id: stop, arrive_time: t, depart_time: t });
        }
        supply.add_trip(trip, TripInfo { supply_mode: 1, route: format!("R{trip}"), attributes: HashMap::new() }, stop_times);
    }

    supply.set_weights("default", DemandModeType::Access, "walk", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.set_weights("default", DemandModeType::Egress, "walk", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.set_weights("default", DemandModeType::Transit, "transit", 1, weights(1.0, 1.5, 0.0, 0.0));
    supply.set_weights("default", DemandModeType::Transfer, "transfer", 0, weights(0.0, 0.0, 2.0, 0.0));
    supply.build();

    let spec = PathSpecification {
        iteration: 0,
        pathfinding_iteration: 0,
        outbound: true,
        hyperpath: true,
        orig_taz: ORIGIN_ZONE,
        dest_taz: DEST_ZONE,
        preferred_time: 500.0,
        value_of_time: 12.0,
        access_demand_mode: "walk".to_string(),
        transit_demand_mode: "transit".to_string(),
        egress_demand_mode: "walk".to_string(),
        user_class: "default".to_string(),
        purpose: "work".to_string(),
        trace: false,
        person_id: "bench".to_string(),
        person_trip_id: "bench-1".to_string(),
    };

    (supply, spec)
}
