//! Global pathfinding parameters, carried explicitly rather than as process
//! globals (see design notes: "Global parameters").

use crate::time::Minutes;

/// Immutable configuration shared by every query a [`crate::pathfinder::Pathfinder`]
/// runs. Constructed once by the host before any query executes.
#[derive(Debug, Clone, Copy)]
pub struct PathfinderParams {
    /// Half-width, in minutes, of the admission window around a stop's
    /// most-extreme labeled time.
    pub time_window: Minutes,
    /// Extra buffer added when a capacity bump forces an earlier arrival.
    pub bump_buffer: Minutes,
    /// Number of concrete paths the enumeration pass attempts to sample.
    pub stoch_pathset_size: u32,
    /// Dispersion parameter (theta) of the exponential choice model. Higher
    /// values sharpen preference toward the cheapest link.
    pub stoch_dispersion: f64,
    /// Optional cap on how many times a single `(stop, is_trip)` key may be
    /// relaxed in one query. `None` disables the cap.
    pub stoch_max_stop_process_count: Option<u32>,
    /// Bypass fare-transfer adjustment while labeling.
    pub transfer_fare_ignore_pathfinding: bool,
    /// Bypass fare-transfer adjustment while enumerating concrete paths.
    pub transfer_fare_ignore_pathenum: bool,
    /// Minimum retained probability mass for a labeling-mode candidate,
    /// expressed directly rather than via a platform `RAND_MAX` (see design
    /// notes, Open Question (b)).
    pub min_probability_mass: f64,
}

impl PathfinderParams {
    pub fn new(
        time_window: Minutes,
        bump_buffer: Minutes,
        stoch_pathset_size: u32,
        stoch_dispersion: f64,
        stoch_max_stop_process_count: Option<u32>,
        transfer_fare_ignore_pathfinding: bool,
        transfer_fare_ignore_pathenum: bool,
    ) -> Self {
        Self {
            time_window,
            bump_buffer,
            stoch_pathset_size,
            stoch_dispersion,
            stoch_max_stop_process_count,
            transfer_fare_ignore_pathfinding,
            transfer_fare_ignore_pathenum,
            min_probability_mass: 1e-6,
        }
    }
}

impl Default for PathfinderParams {
    /// Deterministic-mode-friendly defaults: a generous time window, no
    /// capacity buffer, a single enumerated path, and a dispersion sharp
    /// enough that stochastic mode still concentrates on the cheapest link.
    fn default() -> Self {
        Self::new(30.0, 0.0, 1, 1.0, None, false, false)
    }
}
