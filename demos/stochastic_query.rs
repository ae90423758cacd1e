//! Runs a hyperpath query over a wider synthetic network and reports the
//! distribution of sampled itineraries.

use hyperpath::trace::NullTraceSink;
use hyperpath::{PathfinderParams, Pathfinder};

fn main() {
    env_logger::init();

    let (supply, mut spec) = dev_utils::build_benchmark_scenario(12, 4);
    spec.hyperpath = true;

    let mut params = PathfinderParams::default();
    params.time_window = 45.0;
    params.stoch_dispersion = 3.0;
    params.stoch_pathset_size = 200;

    let pathfinder = Pathfinder::new(&supply, params);
    let mut trace = NullTraceSink;
    let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");

    println!("Sampled {} distinct path(s) out of {} attempt(s).", result.path_set.len(), params.stoch_pathset_size);

    for (idx, (path, info)) in result.path_set.iter().zip(&result.path_info).enumerate() {
        let chain: Vec<u32> = path.links().iter().map(|(_, ss)| ss.trip_id()).collect();
        let marker = if Some(idx) == result.chosen { " (chosen)" } else { "" };
        println!("  trips {chain:?}: {} sample(s), p={:.3}, cost={:.2}{marker}", info.count, info.probability, info.cost);
    }
}
