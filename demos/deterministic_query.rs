//! Runs the deterministic end-to-end scenario from the design notes: a
//! single access/trip/egress chain with no transfers.

use hyperpath::trace::NullTraceSink;
use hyperpath::{PathfinderParams, Pathfinder};

fn main() {
    env_logger::init();

    let (supply, spec) = dev_utils::build_small_scenario();
    let params = PathfinderParams::default();
    let pathfinder = Pathfinder::new(&supply, params);

    let mut trace = NullTraceSink;
    let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");

    match result.chosen_path() {
        Some(path) => {
            println!("Found a path with {} link(s), cost {:.2}, fare {:.2}", path.len(), path.cost, path.fare);
            for (stop_id, ss) in path.links() {
                println!("  -> stop {stop_id:>3} via {:?} (trip {}), deparr {:.1}, arrdep {:.1}", ss.deparr_mode(), ss.trip_id(), ss.deparr_time, ss.arrdep_time);
            }
        }
        None => println!("No path found."),
    }
}
