//! StopState (C3): the link-state record carried by hyperlinks, the label
//! queue, and enumerated paths.

use std::cmp::Ordering;

use crate::cost::Cost;
use crate::path::Path;
use crate::supply::{FarePeriodId, StopId, TripId};
use crate::time::Minutes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeparrMode {
    Access,
    Egress,
    Transfer,
    Transit,
}

impl DeparrMode {
    pub fn is_trip(self) -> bool {
        matches!(self, DeparrMode::Transit)
    }
}

/// The five fields that identify a StopState: two StopStates are equal iff
/// these match, and ordering over StopStates is lexicographic over these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StopStateKey {
    pub deparr_mode: DeparrMode,
    /// Trip number when `deparr_mode == Transit`; supply-mode number otherwise.
    pub trip_id: TripId,
    /// The stop at the other end of the link: successor when labeling
    /// outbound, predecessor when labeling inbound.
    pub stop_succpred: StopId,
    /// Position on the trip, -1 for non-trip links.
    pub seq: i32,
    pub seq_succpred: i32,
}

/// A single candidate link into or out of a stop.
#[derive(Debug)]
pub struct StopState {
    pub key: StopStateKey,
    /// Departure time (outbound) / arrival time (inbound). May fall outside
    /// `[0, 1440)` when the link crosses midnight.
    pub deparr_time: Minutes,
    /// The complementary time to `deparr_time`.
    pub arrdep_time: Minutes,
    pub link_time: Minutes,
    pub link_fare: f64,
    pub link_cost: Cost,
    pub link_dist: f64,
    /// In-vehicle-time weight, memoized so fare-adjustment arithmetic
    /// doesn't need to re-look-up the weight table.
    pub link_ivtwt: f64,
    /// Cumulative hyperpath cost at this link.
    pub cost: Cost,
    pub iteration: u32,
    pub probability: f64,
    /// Integerized cumulative probability; -1 means invalid/unset.
    pub cum_prob_i: i64,
    pub fare_period: Option<FarePeriodId>,
    /// A seed path kept only during labeling (see design notes on ownership);
    /// freed the moment this StopState is replaced or the LinkSet is cleared.
    pub low_cost_path: Option<Box<Path>>,
}

impl StopState {
    pub fn deparr_mode(&self) -> DeparrMode {
        self.key.deparr_mode
    }

    pub fn trip_id(&self) -> TripId {
        self.key.trip_id
    }

    pub fn stop_succpred(&self) -> StopId {
        self.key.stop_succpred
    }

    pub fn seq(&self) -> i32 {
        self.key.seq
    }

    pub fn seq_succpred(&self) -> i32 {
        self.key.seq_succpred
    }

    pub fn is_trip(&self) -> bool {
        self.key.deparr_mode.is_trip()
    }
}

impl PartialEq for StopState {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StopState {}

impl PartialOrd for StopState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StopState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}
