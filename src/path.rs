//! PathSpecification (C3) and Path (C4): the immutable query descriptor and
//! the owned, growable link chain built up while labeling or enumerating.

use std::collections::HashMap;

use crate::cost::Cost;
use crate::stop_state::{DeparrMode, StopState};
use crate::supply::{FarePeriodId, StopId, ZoneId};
use crate::time::{Minutes, MINUTES_PER_DAY};

/// One itinerary request. Immutable for the lifetime of a query; a host
/// builds one of these per person-trip.
#[derive(Debug, Clone)]
pub struct PathSpecification {
    pub iteration: u32,
    pub pathfinding_iteration: u32,
    pub outbound: bool,
    pub hyperpath: bool,
    pub orig_taz: ZoneId,
    pub dest_taz: ZoneId,
    pub preferred_time: Minutes,
    pub value_of_time: f64,
    pub access_demand_mode: String,
    pub transit_demand_mode: String,
    pub egress_demand_mode: String,
    pub user_class: String,
    pub purpose: String,
    pub trace: bool,
    pub person_id: String,
    pub person_trip_id: String,
}

/// A chronologically-ordered chain of links from origin to destination.
/// Grown one link at a time by [`Path::add_link`] while labeling (in reverse
/// chronological order) or enumerating (forward); recosted once by
/// [`Path::calculate_cost`], after which a host should treat it as read-only.
#[derive(Debug)]
pub struct Path {
    links: Vec<(StopId, StopState)>,
    pub fare: f64,
    pub cost: Cost,
    pub initial_fare: f64,
    pub initial_cost: Cost,
    pub capacity_problem: bool,
    boardings_in_fare_period: HashMap<FarePeriodId, u32>,
    cost_calculated: bool,
}

impl Path {
    pub fn new() -> Self {
        Self {
            links: Vec::new(),
            fare: 0.0,
            cost: 0.0,
            initial_fare: 0.0,
            initial_cost: 0.0,
            capacity_problem: false,
            boardings_in_fare_period: HashMap::new(),
            cost_calculated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn links(&self) -> &[(StopId, StopState)] {
        &self.links
    }

    pub fn last_link(&self) -> Option<&StopState> {
        self.links.last().map(|(_, ss)| ss)
    }

    pub fn boardings_in_fare_period(&self, period: FarePeriodId) -> u32 {
        self.boardings_in_fare_period.get(&period).copied().unwrap_or(0)
    }

    /// Shifts `time` by whole days so it falls on the correct side of
    /// `anchor` for the path's growth direction, undoing the day-ambiguity
    /// that `deparr_time`s computed modulo a service day can introduce when
    /// a trip crosses midnight.
    fn day_wrap(outbound: bool, anchor: Minutes, time: Minutes) -> Minutes {
        let mut t = time;
        if outbound {
            while t < anchor {
                t += MINUTES_PER_DAY;
            }
        } else {
            while t > anchor {
                t -= MINUTES_PER_DAY;
            }
        }
        t
    }

    /// Appends `ss` (the link arriving at/departing `stop_id`) to the chain,
    /// reconciling its times against the previously added link so adjoining
    /// legs meet at a single, consistent clock time at the stop they share.
    ///
    /// A TRANSIT link's own times are authoritative (they come straight off
    /// the schedule), so reconciliation either folds the preceding walk-type
    /// link's connecting time onto it (when that link is the anchor-zone
    /// boundary — the rider simply left home/the prior stop at whatever time
    /// makes the trip) or, when a transfer/trip already intervenes, checks
    /// that the trip hasn't already left before the rider could get there.
    /// A non-trip (TRANSFER/ACCESS/EGRESS) link has no schedule of its own,
    /// so it is always pinned to depart the instant the previous link
    /// arrives.
    ///
    /// Returns `false` (leaving the chain unchanged) if reconciliation would
    /// place the new link's trip before its vehicle actually leaves — a
    /// physical impossibility that means this enumeration attempt must be
    /// discarded.
    pub fn add_link(&mut self, stop_id: StopId, outbound: bool, mut ss: StopState) -> bool {
        let sign = if outbound { 1.0 } else { -1.0 };
        if let Some((_, previous)) = self.links.last_mut() {
            if ss.is_trip() {
                let anchor = previous.arrdep_time;
                let shifted = Self::day_wrap(outbound, anchor, ss.deparr_time);
                let shift = shifted - ss.deparr_time;
                ss.deparr_time += shift;
                ss.arrdep_time += shift;

                let boundary_before_trip = if outbound { DeparrMode::Access } else { DeparrMode::Egress };
                if previous.deparr_mode() == boundary_before_trip {
                    previous.arrdep_time = ss.deparr_time;
                    previous.deparr_time = previous.arrdep_time - previous.link_time * sign;
                } else {
                    let infeasible = if outbound { ss.deparr_time < previous.arrdep_time } else { ss.deparr_time > previous.arrdep_time };
                    if infeasible {
                        return false;
                    }
                    ss.link_time = (ss.arrdep_time - previous.arrdep_time) * sign;
                }
            } else {
                ss.deparr_time = previous.arrdep_time;
                ss.arrdep_time = ss.deparr_time + ss.link_time * sign;
            }
        }
        if ss.is_trip() {
            if let Some(period) = ss.fare_period {
                *self.boardings_in_fare_period.entry(period).or_insert(0) += 1;
            }
        }
        self.links.push((stop_id, ss));
        true
    }

    /// Reverses link order in place. Enumeration walks inward from whichever
    /// zone finalization completed against, which is the *last* chronological
    /// leg for an inbound query (EGRESS) — so an inbound path is assembled
    /// latest-leg-first and must be flipped once complete to read in true
    /// chronological order, matching an outbound path's natural build order.
    pub(crate) fn reverse_links(&mut self) {
        self.links.reverse();
    }

    /// Sums each link's `link_cost`/`link_fare` into the path total. The
    /// first call snapshots the result as `initial_cost`/`initial_fare`
    /// (the pre-capacity-adjustment baseline); later calls (e.g. after a
    /// fare engine pass revises per-link fares) update `cost`/`fare` only.
    pub fn calculate_cost(&mut self) {
        let mut cost = 0.0;
        let mut fare = 0.0;
        for (_, ss) in &self.links {
            cost += ss.link_cost;
            fare += ss.link_fare;
        }
        self.cost = cost;
        self.fare = fare;
        if !self.cost_calculated {
            self.initial_cost = cost;
            self.initial_fare = fare;
            self.cost_calculated = true;
        }
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop_state::{DeparrMode, StopStateKey};

    fn ss(mode: DeparrMode, deparr_time: Minutes, link_time: Minutes, link_cost: Cost) -> StopState {
        StopState {
            key: StopStateKey { deparr_mode: mode, trip_id: 1, stop_succpred: 1, seq: -1, seq_succpred: -1 },
            deparr_time,
            arrdep_time: deparr_time + link_time,
            link_time,
            link_fare: 0.0,
            link_cost,
            link_dist: 0.0,
            link_ivtwt: 0.0,
            cost: link_cost,
            iteration: 0,
            probability: 1.0,
            cum_prob_i: 1,
            fare_period: None,
            low_cost_path: None,
        }
    }

    #[test]
    fn add_link_reconciles_midnight_wrap() {
        let mut path = Path::new();
        assert!(path.add_link(1, true, ss(DeparrMode::Access, 1430.0, 20.0, 1.0))); // arrdep 1450
        // Next link's raw deparr_time (10) looks like it is *before* the
        // prior arrival only because it wrapped past midnight; reconciliation
        // should push it a day forward before stitching.
        assert!(path.add_link(2, true, ss(DeparrMode::Transit, 10.0, 10.0, 1.0)));
        let (_, second) = &path.links()[1];
        assert!(second.deparr_time >= path.links()[0].1.arrdep_time);
        // The access link's own connecting time is retroactively pinned to
        // the (now day-wrapped) trip departure, with no wait injected.
        assert_eq!(path.links()[0].1.arrdep_time, second.deparr_time);
    }

    #[test]
    fn add_link_stitches_walk_type_link_to_previous_arrival() {
        let mut path = Path::new();
        assert!(path.add_link(1, true, ss(DeparrMode::Transit, 480.0, 10.0, 10.0)));
        assert!(path.add_link(2, true, ss(DeparrMode::Egress, 492.0, 3.0, 3.0)));
        let (_, egress) = &path.links()[1];
        // Egress departs the instant the trip arrives (490), not at its own
        // originally-seeded estimate (492) — the 2-minute gap was priced
        // separately as preferred delay during labeling, not baked in here.
        assert_eq!(egress.deparr_time, 490.0);
        assert_eq!(egress.arrdep_time, 493.0);
    }

    #[test]
    fn add_link_rejects_trip_departing_before_prior_leg_arrives() {
        let mut path = Path::new();
        assert!(path.add_link(1, true, ss(DeparrMode::Transfer, 480.0, 5.0, 1.0))); // arrives stop at 485
        // A trip that left at 482 already departed before this transfer
        // could get the rider there.
        assert!(!path.add_link(2, true, ss(DeparrMode::Transit, 482.0, 10.0, 1.0)));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn calculate_cost_sums_links_and_freezes_initial_once() {
        let mut path = Path::new();
        path.add_link(1, true, ss(DeparrMode::Access, 0.0, 5.0, 2.0));
        path.add_link(2, true, ss(DeparrMode::Transit, 5.0, 10.0, 3.0));
        path.calculate_cost();
        assert_eq!(path.cost, 5.0);
        assert_eq!(path.initial_cost, 5.0);

        // A later fare-engine pass can change per-link cost without moving
        // the frozen initial baseline.
        path.links[1].1.link_cost = 10.0;
        path.calculate_cost();
        assert_eq!(path.cost, 12.0);
        assert_eq!(path.initial_cost, 5.0);
    }
}
