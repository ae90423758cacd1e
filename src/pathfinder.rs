//! Pathfinder (C8): orchestrates labeling (alternating transfer-relaxation
//! and trip-relaxation over a [`LabelQueue`]) and path enumeration/sampling
//! against a [`Supply`].
//!
//! Search direction. Outbound queries anchor on a desired arrival time and
//! search backward from the destination zone; inbound queries anchor on a
//! desired departure and search forward from the origin zone. `dir_factor`
//! is `+1.0` outbound, `-1.0` inbound. Two zone-facing boundaries exist:
//! *seeding* happens once, up front, at the anchor zone (destination
//! outbound / origin inbound) using EGRESS/ACCESS-tagged links inserted into
//! the ordinary per-stop non-trip `LinkSet` so trip-relaxation can extend
//! them; *finalization* happens once, after the queue drains, at the
//! opposite zone. Finalization's candidates are already complete
//! end-to-end paths, so rather than landing in any one stop's own LinkSet
//! they accumulate in a single merged `destination` LinkSet — enumeration
//! needs to choose among candidates contributed by every frontier stop at
//! once, not just the last one processed.

use std::collections::HashMap;

use crate::config::PathfinderParams;
use crate::cost::{Cost, CostEngine};
use crate::error::{PathfindingError, PathfindingResult};
use crate::fare::FareEngine;
use crate::hyperlink::{choose_state, Hyperlink, PROB_SCALE};
use crate::path::{Path, PathSpecification};
use crate::queue::LabelQueue;
use crate::stop_state::{DeparrMode, StopState, StopStateKey};
use crate::supply::{DemandModeType, StopId, Supply, TripId};
use crate::trace::{PathSetEntry, TraceEvent, TraceSink};

/// A cooperative cancellation check, polled at the top of the labeling loop
/// and inside the path-enumeration attempt loop. An external driver
/// enforcing a wall-clock budget flips the underlying flag between calls;
/// the engine never blocks waiting for it.
pub type Cancellation<'a> = &'a (dyn Fn() -> bool + Sync);

fn no_cancellation() -> bool {
    false
}

/// §6's `PathInfo`: `{count, probability, prob_i, cost, capacity_problem}`
/// for one distinct path in the enumerated set.
#[derive(Debug, Clone, Copy)]
pub struct PathInfo {
    /// Number of enumeration attempts that sampled this exact link sequence.
    pub count: u32,
    /// `count / successful_attempts`.
    pub probability: f64,
    /// `probability` integerized against [`PROB_SCALE`].
    pub prob_i: i64,
    pub cost: Cost,
    pub capacity_problem: bool,
}

/// Lightweight counters a host can use to judge a query's work, distinct
/// from the trace stream (which records individual events, not totals).
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceInfo {
    pub labeling_iterations: u32,
    pub stops_labeled: usize,
    pub enumeration_attempts: u32,
    pub enumeration_successes: u32,
}

/// The result of a query (§6): the distinct enumerated paths and their
/// [`PathInfo`], the probability-weighted draw selecting one of them as
/// `chosen` (C8's "choice" responsibility, §2), and [`PerformanceInfo`].
/// `path_set`/`path_info` hold exactly one entry in deterministic mode.
#[derive(Debug)]
pub struct PathResult {
    /// Distinct sampled itineraries, aligned index-for-index with `path_info`.
    pub path_set: Vec<Path>,
    pub path_info: Vec<PathInfo>,
    /// Index into `path_set`/`path_info` of the probability-weighted draw.
    /// `None` iff `path_set` is empty (no path found).
    pub chosen: Option<usize>,
    pub performance: PerformanceInfo,
}

impl PathResult {
    fn empty(performance: PerformanceInfo) -> Self {
        Self { path_set: Vec::new(), path_info: Vec::new(), chosen: None, performance }
    }

    pub fn is_empty(&self) -> bool {
        self.path_set.is_empty()
    }

    pub fn chosen_path(&self) -> Option<&Path> {
        self.chosen.map(|i| &self.path_set[i])
    }

    pub fn chosen_info(&self) -> Option<&PathInfo> {
        self.chosen.map(|i| &self.path_info[i])
    }
}

struct LabelState {
    hyperlinks: HashMap<StopId, Hyperlink>,
    /// The merged, zone-level non-trip LinkSet finalization writes
    /// completed candidates into; enumeration starts here.
    destination: Hyperlink,
    labeling_iterations: u32,
}

pub struct Pathfinder<'s, S: Supply> {
    supply: &'s S,
    params: PathfinderParams,
    cost_engine: CostEngine,
    /// Per-(trip, sequence, stop) latest board time, set by a host from a
    /// prior iteration's crowding observations (the bump-wait capacity
    /// feedback loop). Computing these waits is a host concern; this engine
    /// only consumes what [`Pathfinder::set_bump_wait`] gives it.
    bump_wait: HashMap<(TripId, i32, StopId), f64>,
}

impl<'s, S: Supply> Pathfinder<'s, S> {
    pub fn new(supply: &'s S, params: PathfinderParams) -> Self {
        Self { supply, params, cost_engine: CostEngine::default(), bump_wait: HashMap::new() }
    }

    pub fn set_bump_wait(&mut self, trip: TripId, seq: i32, stop: StopId, latest_board_time: f64) {
        self.bump_wait.insert((trip, seq, stop), latest_board_time);
    }

    pub fn clear_bump_wait(&mut self) {
        self.bump_wait.clear();
    }

    /// Runs labeling to exhaustion, then samples up to `stoch_pathset_size`
    /// concrete paths (one path, deterministically, when `hyperpath` is
    /// false). Returns `Ok` with an empty path set when no itinerary exists;
    /// `Err` is reserved for invariant violations.
    pub fn find_path(&self, spec: &PathSpecification, trace: &mut dyn TraceSink) -> PathfindingResult<PathResult> {
        self.find_path_cancellable(spec, trace, &no_cancellation)
    }

    /// As [`Pathfinder::find_path`], but checks `cancel` at the top of the
    /// labeling loop and inside the enumeration attempt loop; a cancelled
    /// query returns an empty [`PathResult`] rather than a partial one.
    pub fn find_path_cancellable(&self, spec: &PathSpecification, trace: &mut dyn TraceSink, cancel: Cancellation) -> PathfindingResult<PathResult> {
        let mut state = self.label(spec, trace, cancel)?;
        let performance = PerformanceInfo { labeling_iterations: state.labeling_iterations, stops_labeled: state.hyperlinks.len(), ..Default::default() };
        if cancel() {
            log::info!("query for {} cancelled before enumeration", spec.person_trip_id);
            return Ok(PathResult::empty(performance));
        }
        self.finalize(spec, &mut state);
        if state.destination.linkset_nontrip.is_empty() {
            log::info!("no path found for person_trip {}", spec.person_trip_id);
            return Ok(PathResult::empty(performance));
        }
        self.enumerate(spec, &mut state, trace, cancel, performance)
    }

    /// As [`Pathfinder::find_path`], but surfaces the no-path outcome as
    /// `Err(PathfindingError::NoPath)` for hosts that want `Result`-style
    /// signaling all the way through instead of inspecting an empty
    /// `PathResult`.
    pub fn find_path_strict(&self, spec: &PathSpecification, trace: &mut dyn TraceSink) -> PathfindingResult<PathResult> {
        let result = self.find_path(spec, trace)?;
        if result.is_empty() {
            return Err(PathfindingError::NoPath);
        }
        Ok(result)
    }

    fn weights_for(&self, spec: &PathSpecification, demand_mode_type: DemandModeType, demand_mode: &str, supply_mode: u32) -> crate::supply::NamedWeights {
        self.supply
            .weights(&spec.user_class, demand_mode_type, demand_mode, supply_mode)
            .cloned()
            .unwrap_or_default()
    }

    /// §4.6: given a boarding candidate at `(trip, seq, stop)` whose
    /// unconstrained boarding time is `deparr_time` and in-vehicle time
    /// `link_time`, consults the injected bump-wait map. Returns `None` to
    /// reject the candidate outright (it falls outside the admission window
    /// even after accounting for the bump); otherwise returns the (possibly
    /// earlier) time the rider must arrive at the boarding stop to queue
    /// ahead of the bumped passenger, plus the cost penalty for doing so.
    fn capacity_check(&self, trip: TripId, seq: i32, stop: StopId, deparr_time: f64, link_time: f64) -> Option<(f64, Cost)> {
        match self.bump_wait.get(&(trip, seq, stop)) {
            None => Some((deparr_time, 0.0)),
            Some(&latest_board_time) => {
                if deparr_time - self.params.time_window > latest_board_time {
                    None
                } else {
                    let shifted = latest_board_time - link_time - self.params.bump_buffer;
                    let penalty = (deparr_time - latest_board_time) + self.params.bump_buffer;
                    Some((shifted, penalty))
                }
            }
        }
    }

    /// Initialization (§4.3): seeds the non-trip LinkSet of every stop
    /// reachable from the anchor zone (destination outbound, origin inbound)
    /// with an EGRESS/ACCESS-tagged candidate, then drains the LabelQueue
    /// alternating trip-relaxation and transfer-relaxation until fixed
    /// point.
    fn label(&self, spec: &PathSpecification, trace: &mut dyn TraceSink, cancel: Cancellation) -> PathfindingResult<LabelState> {
        let mut state = LabelState { hyperlinks: HashMap::new(), destination: Hyperlink::new(), labeling_iterations: 0 };
        let mut queue = LabelQueue::new();

        let (anchor_zone, anchor_mode) = if spec.outbound {
            (spec.dest_taz, spec.egress_demand_mode.as_str())
        } else {
            (spec.orig_taz, spec.access_demand_mode.as_str())
        };
        let anchor_mode_type = if spec.outbound { DemandModeType::Egress } else { DemandModeType::Access };
        let anchor_deparr_mode = if spec.outbound { DeparrMode::Egress } else { DeparrMode::Access };
        let dir_factor = if spec.outbound { 1.0 } else { -1.0 };

        for link in self.supply.access_egress_links(anchor_zone, anchor_mode) {
            if !link.covers(spec.preferred_time) {
                continue;
            }
            let mut attrs = link.attributes.clone();
            attrs.insert("walk_time_min".to_string(), link.time);
            let weights = self.weights_for(spec, anchor_mode_type, anchor_mode, link.supply_mode);
            let Some(travel_cost) = self.cost_engine.tally_link_cost(link.supply_mode, &weights, &attrs) else { continue };
            let deparr_time = spec.preferred_time - link.time * dir_factor;
            let ss = StopState {
                key: StopStateKey {
                    deparr_mode: anchor_deparr_mode,
                    trip_id: link.supply_mode,
                    stop_succpred: anchor_zone,
                    seq: -1,
                    seq_succpred: -1,
                },
                deparr_time,
                arrdep_time: spec.preferred_time,
                link_time: link.time,
                link_fare: 0.0,
                link_cost: travel_cost,
                link_dist: link.dist,
                link_ivtwt: 0.0,
                cost: travel_cost,
                iteration: spec.iteration,
                probability: 0.0,
                cum_prob_i: -1,
                fare_period: None,
                low_cost_path: None,
            };
            let hyperlink = state.hyperlinks.entry(link.stop).or_insert_with(Hyperlink::new);
            let outcome = hyperlink.linkset_nontrip.add_link(spec.outbound, spec.hyperpath, &self.params, ss);
            if !outcome.rejected {
                queue.push(hyperlink.linkset_nontrip.hyperpath_cost(), link.stop, false);
            }
        }

        // §4.3 step 2: a pop identical to the one processed immediately
        // before it (same label, stop, and trip/non-trip half) is skipped
        // outright rather than relaxed again.
        let mut last_popped: Option<(Cost, StopId, bool)> = None;

        while !queue.is_empty() {
            if cancel() {
                log::info!("labeling for {} cancelled mid-flight", spec.person_trip_id);
                break;
            }
            let popped = queue.pop_min().inspect_err(|e| log::error!("label queue invariant violated: {e}"))?;
            if last_popped == Some(popped) {
                continue;
            }
            last_popped = Some(popped);
            let (label, stop_id, is_trip) = popped;

            // §4.3 step 2 / §7: STOCH_MAX_STOP_PROCESS_COUNT is a defensive
            // work bound, not an invariant — once a stop's half has been
            // relaxed that many times, further pops of it are skipped
            // (not processed, not an error), and labeling carries on with
            // whatever else remains in the queue.
            if let Some(cap) = self.params.stoch_max_stop_process_count {
                let at_cap = state.hyperlinks.get(&stop_id).map(|hl| hl.linkset(is_trip).process_count() >= cap).unwrap_or(false);
                if at_cap {
                    log::debug!("stop {stop_id} ({}) reached stoch_max_stop_process_count ({cap}), skipping", if is_trip { "trip" } else { "non-trip" });
                    continue;
                }
            }
            if let Some(hl) = state.hyperlinks.get_mut(&stop_id) {
                hl.linkset_mut(is_trip).increment_process_count();
            }

            state.labeling_iterations += 1;
            trace.record(TraceEvent::LabelPopped { stop_id, is_trip, label });
            if is_trip {
                self.transfer_relaxation(spec, stop_id, &mut state, &mut queue, trace);
            } else {
                self.trip_relaxation(spec, stop_id, &mut state, &mut queue, trace);
            }
        }

        log::info!("labeling for {} finished: {} stop(s) reached", spec.person_trip_id, state.hyperlinks.len());
        Ok(state)
    }

    /// Finalization (§4.3): a single post-pass, run once the queue has
    /// drained, mirroring initialization against the opposite zone. Every
    /// stop whose trip LinkSet is non-empty gets a chance to complete a
    /// path via access/egress to that zone; candidates accumulate in
    /// `state.destination` rather than the stop's own LinkSet, since
    /// enumeration needs to choose among candidates contributed by every
    /// frontier stop at once.
    fn finalize(&self, spec: &PathSpecification, state: &mut LabelState) {
        let (far_zone, far_mode) = if spec.outbound {
            (spec.orig_taz, spec.access_demand_mode.as_str())
        } else {
            (spec.dest_taz, spec.egress_demand_mode.as_str())
        };
        let far_mode_type = if spec.outbound { DemandModeType::Access } else { DemandModeType::Egress };
        let far_deparr_mode = if spec.outbound { DeparrMode::Access } else { DeparrMode::Egress };
        let dir_factor = if spec.outbound { 1.0 } else { -1.0 };

        let stops: Vec<StopId> = state.hyperlinks.keys().copied().collect();
        for stop_id in stops {
            let Some(hyperlink) = state.hyperlinks.get(&stop_id) else { continue };
            if hyperlink.linkset_trip.is_empty() {
                continue;
            }
            let pivot_cost = hyperlink.linkset_trip.hyperpath_cost();
            if !pivot_cost.is_finite() {
                continue;
            }
            let Some(pivot_time) = hyperlink.linkset_trip.extremum_time() else { continue };

            for link in self.supply.access_egress_links(far_zone, far_mode) {
                if link.stop != stop_id || !link.covers(pivot_time) {
                    continue;
                }
                let mut attrs = link.attributes.clone();
                attrs.insert("walk_time_min".to_string(), link.time);
                let weights = self.weights_for(spec, far_mode_type, far_mode, link.supply_mode);
                let Some(travel_cost) = self.cost_engine.tally_link_cost(link.supply_mode, &weights, &attrs) else { continue };
                let deparr_time = pivot_time - link.time * dir_factor;
                let ss = StopState {
                    key: StopStateKey { deparr_mode: far_deparr_mode, trip_id: link.supply_mode, stop_succpred: stop_id, seq: -1, seq_succpred: -1 },
                    deparr_time,
                    arrdep_time: pivot_time,
                    link_time: link.time,
                    link_fare: 0.0,
                    link_cost: travel_cost,
                    link_dist: link.dist,
                    link_ivtwt: 0.0,
                    cost: pivot_cost + travel_cost,
                    iteration: spec.iteration,
                    probability: 0.0,
                    cum_prob_i: -1,
                    fare_period: None,
                    low_cost_path: None,
                };
                state.destination.linkset_nontrip.add_link(spec.outbound, spec.hyperpath, &self.params, ss);
            }
        }
    }

    /// `transfer_relaxation`: from a stop whose trip LinkSet just changed,
    /// relax into transfer links (plus a zero-walk self-transfer, allowing
    /// trip-to-trip transfers without moving) to grow neighboring stops'
    /// non-trip LinkSets.
    fn transfer_relaxation(&self, spec: &PathSpecification, stop_id: StopId, state: &mut LabelState, queue: &mut LabelQueue, trace: &mut dyn TraceSink) {
        let Some(hyperlink) = state.hyperlinks.get(&stop_id) else { return };
        if hyperlink.linkset_trip.is_empty() {
            return;
        }
        let pivot_cost = hyperlink.linkset_trip.hyperpath_cost();
        let Some(pivot_time) = hyperlink.linkset_trip.extremum_time() else { return };

        let weights = self.weights_for(spec, DemandModeType::Transfer, "transfer", 0);
        let dir_factor = if spec.outbound { 1.0 } else { -1.0 };

        let mut links = if spec.outbound { self.supply.transfer_links_from(stop_id).to_vec() } else { self.supply.transfer_links_to(stop_id).to_vec() };
        links.push(crate::supply::TransferLink { from_stop: stop_id, to_stop: stop_id, time: 0.0, dist: 0.0, attributes: HashMap::new() });

        for link in links {
            let other_stop = if spec.outbound { link.to_stop } else { link.from_stop };
            let mut attrs = link.attributes.clone();
            attrs.insert("walk_time_min".to_string(), link.time);
            attrs.insert("transfer_penalty".to_string(), 1.0);
            let Some(travel_cost) = self.cost_engine.tally_link_cost(0, &weights, &attrs) else { continue };
            let deparr_time = pivot_time - link.time * dir_factor;
            let ss = StopState {
                key: StopStateKey { deparr_mode: DeparrMode::Transfer, trip_id: 0, stop_succpred: stop_id, seq: -1, seq_succpred: -1 },
                deparr_time,
                arrdep_time: pivot_time,
                link_time: link.time,
                link_fare: 0.0,
                link_cost: travel_cost,
                link_dist: link.dist,
                link_ivtwt: 0.0,
                cost: pivot_cost + travel_cost,
                iteration: spec.iteration,
                probability: 0.0,
                cum_prob_i: -1,
                fare_period: None,
                low_cost_path: None,
            };
            let other_hyperlink = state.hyperlinks.entry(other_stop).or_insert_with(Hyperlink::new);
            let key = ss.key;
            let outcome = other_hyperlink.linkset_nontrip.add_link(spec.outbound, spec.hyperpath, &self.params, ss);
            trace.record(if outcome.rejected {
                TraceEvent::LinkRejected { stop_id: other_stop, key }
            } else {
                TraceEvent::LinkAccepted { stop_id: other_stop, key, cost: other_hyperlink.linkset_nontrip.hyperpath_cost(), state_changed: outcome.state_changed }
            });
            if !outcome.rejected && outcome.state_changed {
                queue.push(other_hyperlink.linkset_nontrip.hyperpath_cost(), other_stop, false);
            }
        }
    }

    /// `trip_relaxation`: from a stop whose non-trip LinkSet just changed,
    /// board each compatible trip and relax to every other stop it calls at
    /// in the search direction (earlier stops outbound, later stops
    /// inbound), growing those stops' trip LinkSets.
    fn trip_relaxation(&self, spec: &PathSpecification, stop_id: StopId, state: &mut LabelState, queue: &mut LabelQueue, trace: &mut dyn TraceSink) {
        let (pivot_time, pivot_cost, prior_snapshot, best_guess_snapshot) = {
            let Some(hyperlink) = state.hyperlinks.get(&stop_id) else { return };
            if hyperlink.linkset_nontrip.is_empty() {
                return;
            }
            let Some(pivot_time) = hyperlink.linkset_nontrip.extremum_time() else { return };
            let prior_snapshot: Vec<(Option<u32>, f64)> =
                hyperlink.linkset_nontrip.iter_cost_order().map(|ss| (ss.fare_period, ss.probability.max(1e-9))).collect();
            let best_guess_snapshot = hyperlink.linkset_nontrip.snapshot_cost_order();
            (pivot_time, hyperlink.linkset_nontrip.hyperpath_cost(), prior_snapshot, best_guess_snapshot)
        };

        // The mode tag identifying "this wait is actually the final walk to
        // the anchor zone," not an ordinary transfer wait — the seeding mode
        // from initialization, which is not the same mode LinkSet's own
        // window-exemption logic uses for its unrelated bookkeeping purpose.
        let anchor_boundary_mode = if spec.outbound { DeparrMode::Egress } else { DeparrMode::Access };
        let (access_egress_mode_type, access_egress_demand_mode) =
            if spec.outbound { (DemandModeType::Egress, spec.egress_demand_mode.as_str()) } else { (DemandModeType::Access, spec.access_demand_mode.as_str()) };
        let dir_factor = if spec.outbound { 1.0 } else { -1.0 };

        let window = if spec.outbound {
            (pivot_time - self.params.time_window, pivot_time)
        } else {
            (pivot_time, pivot_time + self.params.time_window)
        };
        let visits = self.supply.trips_at_stop(stop_id, window);

        for visit in visits {
            let Some(trip_info) = self.supply.trip_info(visit.trip_id) else { continue };
            let stop_times = self.supply.trip_stop_times(visit.trip_id);
            let Some(pivot_idx) = stop_times.iter().position(|st| st.seq == visit.seq) else { continue };

            let candidates: Vec<&crate::supply::StopTimeRecord> =
                if spec.outbound { stop_times[..pivot_idx].iter().rev().collect() } else { stop_times[pivot_idx + 1..].iter().collect() };

            for cand in candidates {
                let pivot_rec = &stop_times[pivot_idx];
                let (board_rec, alight_rec) = if spec.outbound { (cand, pivot_rec) } else { (pivot_rec, cand) };

                // One of board/alight is the pivot stop, already anchored to
                // the rest of the chain via `visit.time`; the other may carry
                // a raw clock value on the wrong side of midnight relative to
                // it (a trip scheduled to depart 23:55 and arrive 0:05 stores
                // 1435 and 5, even though 5 is chronologically later). Shift
                // whichever one isn't the anchor by whole days until the
                // in-vehicle duration comes out non-negative.
                let (mut board_time, mut alight_time) = (board_rec.depart_time, alight_rec.arrive_time);
                if spec.outbound {
                    while board_time > alight_time {
                        board_time -= crate::time::MINUTES_PER_DAY;
                    }
                } else {
                    while alight_time < board_time {
                        alight_time += crate::time::MINUTES_PER_DAY;
                    }
                }
                let in_vehicle_time = alight_time - board_time;
                if in_vehicle_time < 0.0 {
                    log::warn!(
                        "trip {}: in_vehicle_time computed negative ({in_vehicle_time:.2}) between stop {} and {}, skipping",
                        visit.trip_id,
                        board_rec.stop_id,
                        alight_rec.stop_id
                    );
                    continue;
                }

                let best_guess = best_guess_from_snapshot(&best_guess_snapshot, visit.time, spec.outbound);
                let (wait_time, transfer_penalty, preferred_delay_cost) = match best_guess {
                    Some((bg_time, bg_mode, bg_supply_mode)) => {
                        let raw_wait = (bg_time - visit.time) * dir_factor;
                        if raw_wait < 0.0 {
                            log::warn!("trip {}: wait_time computed negative ({raw_wait:.2}) at stop {stop_id}, coercing to 0", visit.trip_id);
                        }
                        let wait = raw_wait.max(0.0);
                        if bg_mode == anchor_boundary_mode {
                            let mut pref_attrs: crate::supply::AttributeBag = HashMap::new();
                            pref_attrs.insert("preferred_delay_min".to_string(), wait);
                            let pref_weights = self.weights_for(spec, access_egress_mode_type, access_egress_demand_mode, bg_supply_mode);
                            let pref_cost = self.cost_engine.tally_link_cost(bg_supply_mode, &pref_weights, &pref_attrs).unwrap_or(0.0);
                            (0.0, 0.0, pref_cost)
                        } else {
                            (wait, 1.0, 0.0)
                        }
                    }
                    None => (0.0, 1.0, 0.0),
                };

                let mut attrs = trip_info.attributes.clone();
                attrs.insert("in_vehicle_time_min".to_string(), in_vehicle_time);
                attrs.insert("wait_time_min".to_string(), wait_time);
                attrs.insert("transfer_penalty".to_string(), transfer_penalty);

                let weights = self.weights_for(spec, DemandModeType::Transit, &spec.transit_demand_mode, trip_info.supply_mode);
                let Some(travel_cost) = self.cost_engine.tally_link_cost(trip_info.supply_mode, &weights, &attrs) else { continue };
                let link_ivtwt = weights.get("in_vehicle_time_min").copied().unwrap_or(1.0);

                let fare_ignore = self.params.transfer_fare_ignore_pathfinding;
                let fare_period = self.supply.fare_period_for(visit.trip_id, board_rec.stop_id, alight_rec.stop_id);
                let (fare, fare_cost_delta) = if fare_ignore {
                    (0.0, 0.0)
                } else if let Some(period) = fare_period {
                    let prior_iter = if prior_snapshot.is_empty() { vec![(None, 1.0)] } else { prior_snapshot.clone() };
                    FareEngine::fare_with_transfer(self.supply, period, spec.value_of_time, link_ivtwt, prior_iter.into_iter(), 0)
                } else {
                    (0.0, 0.0)
                };

                let Some((adjusted_board_time, capacity_penalty)) =
                    self.capacity_check(visit.trip_id, board_rec.seq, board_rec.stop_id, board_time, in_vehicle_time)
                else {
                    continue;
                };

                let there_stop = cand.stop_id;
                let (deparr_time, arrdep_time) = if spec.outbound { (adjusted_board_time, alight_time) } else { (alight_time, adjusted_board_time) };
                let per_link_cost = travel_cost + preferred_delay_cost + fare_cost_delta + capacity_penalty;

                let ss = StopState {
                    key: StopStateKey {
                        deparr_mode: DeparrMode::Transit,
                        trip_id: visit.trip_id,
                        stop_succpred: stop_id,
                        seq: cand.seq,
                        seq_succpred: pivot_rec.seq,
                    },
                    deparr_time,
                    arrdep_time,
                    link_time: in_vehicle_time,
                    link_fare: fare,
                    link_cost: per_link_cost,
                    link_dist: 0.0,
                    link_ivtwt,
                    cost: pivot_cost + per_link_cost,
                    iteration: spec.iteration,
                    probability: 0.0,
                    cum_prob_i: -1,
                    fare_period,
                    low_cost_path: None,
                };

                let there_hyperlink = state.hyperlinks.entry(there_stop).or_insert_with(Hyperlink::new);
                let key = ss.key;
                let outcome = there_hyperlink.linkset_trip.add_link(spec.outbound, spec.hyperpath, &self.params, ss);
                trace.record(if outcome.rejected {
                    TraceEvent::LinkRejected { stop_id: there_stop, key }
                } else {
                    TraceEvent::LinkAccepted { stop_id: there_stop, key, cost: there_hyperlink.linkset_trip.hyperpath_cost(), state_changed: outcome.state_changed }
                });
                if !outcome.rejected && outcome.state_changed {
                    queue.push(there_hyperlink.linkset_trip.hyperpath_cost(), there_stop, true);
                }
            }
        }
    }

    /// Samples up to `stoch_pathset_size` concrete paths from the labeled
    /// hyperpath, starting at the merged destination LinkSet and walking
    /// inward toward the anchor zone, choosing among each hyperlink's live
    /// candidates by cumulative probability (deterministic mode always
    /// takes the sole survivor). Identical attempts (same link-key sequence)
    /// are folded into one [`PathInfo`]-bearing entry in `path_set`, and a
    /// final probability-weighted draw over those counts selects `chosen`
    /// (C8's "choice" responsibility, §2).
    fn enumerate(
        &self,
        spec: &PathSpecification,
        state: &mut LabelState,
        trace: &mut dyn TraceSink,
        cancel: Cancellation,
        mut performance: PerformanceInfo,
    ) -> PathfindingResult<PathResult> {
        let attempts = if spec.hyperpath { self.params.stoch_pathset_size } else { 1 };
        let mut rng = fastrand::Rng::with_seed(path_seed(&spec.person_trip_id, spec.iteration));

        let mut path_set: Vec<Path> = Vec::new();
        let mut counts: Vec<u32> = Vec::new();
        let mut signature_to_index: HashMap<Vec<StopStateKey>, usize> = HashMap::new();

        for attempt in 0..attempts {
            if cancel() {
                log::info!("enumeration for {} cancelled after {attempt} attempt(s)", spec.person_trip_id);
                break;
            }
            performance.enumeration_attempts += 1;
            let Some(mut path) = self.enumerate_one(spec, state, &mut rng) else { continue };
            if !spec.outbound {
                path.reverse_links();
            }
            path.calculate_cost();
            performance.enumeration_successes += 1;

            let signature: Vec<StopStateKey> = path.links().iter().map(|(_, ss)| ss.key).collect();
            match signature_to_index.get(&signature) {
                Some(&idx) => counts[idx] += 1,
                None => {
                    signature_to_index.insert(signature, path_set.len());
                    counts.push(1);
                    path_set.push(path);
                }
            }
        }

        let successes = performance.enumeration_successes.max(1) as f64;
        let mut path_info = Vec::with_capacity(path_set.len());
        for (idx, path) in path_set.iter().enumerate() {
            let count = counts[idx];
            let probability = count as f64 / successes;
            let prob_i = (probability * PROB_SCALE as f64).round() as i64;
            path_info.push(PathInfo { count, probability, prob_i, cost: path.cost, capacity_problem: path.capacity_problem });
            trace.record(TraceEvent::PathEnumerated(PathSetEntry {
                path_id: idx as u32,
                cost: path.cost,
                fare: path.fare,
                probability,
                capacity_problem: path.capacity_problem,
            }));
        }

        // The choice operation (§2): a probability-weighted draw over the
        // distinct paths' attempt counts. With a single distinct path (always
        // true in deterministic mode) this trivially selects it.
        let chosen = if counts.is_empty() {
            None
        } else {
            let total: u32 = counts.iter().sum();
            let target = rng.u32(0..total);
            let mut cumulative = 0u32;
            let mut pick = counts.len() - 1;
            for (idx, &count) in counts.iter().enumerate() {
                cumulative += count;
                if target < cumulative {
                    pick = idx;
                    break;
                }
            }
            Some(pick)
        };

        Ok(PathResult { path_set, path_info, chosen, performance })
    }

    fn enumerate_one(&self, spec: &PathSpecification, state: &LabelState, rng: &mut fastrand::Rng) -> Option<Path> {
        let mut path = Path::new();
        let ignore_fare = self.params.transfer_fare_ignore_pathenum;
        let mut last_trip_period: Option<u32> = None;

        let dest_candidates: Vec<(StopStateKey, i64)> =
            state.destination.linkset_nontrip.iter_cost_order().map(|ss| (ss.key, ss.cum_prob_i.max(0))).collect();
        let chosen_key = if spec.hyperpath {
            choose_state(&dest_candidates, state.destination.linkset_nontrip.max_cum_prob_i(), rng)
        } else {
            dest_candidates.first().map(|(k, _)| *k)
        };
        let key_and_ss = chosen_key.and_then(|key| state.destination.linkset_nontrip.get(&key).map(|ss| (key, clone_stop_state(ss))));
        let (mut key, ss) = key_and_ss?;
        let mut current_stop = ss.key.stop_succpred;
        let far_zone = if spec.outbound { spec.orig_taz } else { spec.dest_taz };
        if !path.add_link(far_zone, spec.outbound, ss) {
            return None;
        }

        loop {
            let Some(hyperlink) = state.hyperlinks.get(&current_stop) else { break };
            let prior_was_trip = key.deparr_mode == DeparrMode::Transit;
            let next_linkset = if prior_was_trip { &hyperlink.linkset_nontrip } else { &hyperlink.linkset_trip };
            if next_linkset.is_empty() {
                break;
            }

            // §4.2's enumeration-mode candidate cost folds in the
            // fare-transfer adjustment against the path assembled so far,
            // unlike labeling's marginalized estimate over a distribution of
            // priors: by enumeration time the preceding trip (if any) is a
            // single concrete fare period, not a probability-weighted one.
            let (candidates, max_cum) = next_linkset.setup_probabilities_enumeration(spec.outbound, &path, |candidate| {
                self.enumeration_fare_adjusted_cost(spec, &path, ignore_fare, last_trip_period, candidate)
            });
            if candidates.is_empty() {
                break;
            }
            let cum_pairs: Vec<(StopStateKey, i64)> = candidates.iter().map(|c| (c.key, c.cum_prob_i)).collect();
            let chosen = if spec.hyperpath { choose_state(&cum_pairs, max_cum, rng) } else { cum_pairs.first().map(|(k, _)| *k) };
            let Some(next_key) = chosen else { break };
            let Some(mut next_ss) = next_linkset.get(&next_key).map(clone_stop_state) else { break };

            if next_ss.is_trip() {
                self.apply_exact_fare(spec, &path, ignore_fare, last_trip_period, &mut next_ss);
                last_trip_period = next_ss.fare_period;
            }

            let anchor_boundary_mode = if spec.outbound { DeparrMode::Egress } else { DeparrMode::Access };
            let reached_anchor = next_ss.key.deparr_mode == anchor_boundary_mode;
            current_stop = next_ss.key.stop_succpred;
            key = next_ss.key;
            if !path.add_link(current_stop, spec.outbound, next_ss) {
                return None;
            }
            if reached_anchor {
                break;
            }
        }

        Some(path)
    }

    /// The candidate-cost closure fed to `setup_probabilities_enumeration`:
    /// `candidate.cost` with its fare-derived component replaced by the
    /// exact fare against `last_trip_period`, the concrete fare period of
    /// the path's previous boarding (`None` before any boarding or when the
    /// prior leg carried no fare period).
    fn enumeration_fare_adjusted_cost(
        &self,
        spec: &PathSpecification,
        path: &Path,
        ignore_fare: bool,
        last_trip_period: Option<u32>,
        candidate: &StopState,
    ) -> Cost {
        if ignore_fare || !candidate.is_trip() {
            return candidate.cost;
        }
        let Some(period) = candidate.fare_period else { return candidate.cost };
        let boardings = path.boardings_in_fare_period(period);
        let (new_fare, _) = FareEngine::fare_with_transfer(self.supply, period, spec.value_of_time, candidate.link_ivtwt, std::iter::once((last_trip_period, 1.0)), boardings);
        let old_delta = FareEngine::fare_cost_delta(spec.value_of_time, candidate.link_ivtwt, candidate.link_fare);
        let new_delta = FareEngine::fare_cost_delta(spec.value_of_time, candidate.link_ivtwt, new_fare);
        candidate.cost + (new_delta - old_delta)
    }

    /// Rewrites a chosen Transit `StopState`'s `link_fare`/`link_cost` in
    /// place from the labeling-time marginalized estimate to the exact fare
    /// against `last_trip_period`, so `Path::calculate_cost` sums the real
    /// fare this concrete itinerary pays rather than the expected fare under
    /// hyperpath uncertainty.
    fn apply_exact_fare(&self, spec: &PathSpecification, path: &Path, ignore_fare: bool, last_trip_period: Option<u32>, ss: &mut StopState) {
        if ignore_fare {
            return;
        }
        let Some(period) = ss.fare_period else { return };
        let boardings = path.boardings_in_fare_period(period);
        let (new_fare, _) = FareEngine::fare_with_transfer(self.supply, period, spec.value_of_time, ss.link_ivtwt, std::iter::once((last_trip_period, 1.0)), boardings);
        let old_delta = FareEngine::fare_cost_delta(spec.value_of_time, ss.link_ivtwt, ss.link_fare);
        let new_delta = FareEngine::fare_cost_delta(spec.value_of_time, ss.link_ivtwt, new_fare);
        ss.link_cost += new_delta - old_delta;
        ss.link_fare = new_fare;
    }
}

/// Derives the enumeration RNG seed deterministically from `person_trip_id`'s
/// full content (not merely its length, which would collide every trip id of
/// the same length onto the same stream) and `iteration`, per §5's "seeded
/// deterministically from path_id" requirement. Plain FNV-1a: fast, stable
/// across runs, and dependency-free.
fn path_seed(person_trip_id: &str, iteration: u32) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in person_trip_id.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash ^ u64::from(iteration)
}

/// Replicates [`crate::hyperlink::LinkSet::best_guess_link`] over an owned
/// snapshot: the first cost-ordered link compatible with `arrdep_time`, or
/// the globally cheapest if none match.
fn best_guess_from_snapshot(
    snapshot: &[(f64, DeparrMode, crate::supply::SupplyModeId)],
    arrdep_time: f64,
    outbound: bool,
) -> Option<(f64, DeparrMode, crate::supply::SupplyModeId)> {
    for &(t, mode, supply_mode) in snapshot {
        let compatible = if outbound { t >= arrdep_time } else { t <= arrdep_time };
        if compatible {
            return Some((t, mode, supply_mode));
        }
    }
    snapshot.first().copied()
}

/// Enumeration reads a hyperlink's stored [`StopState`]s without consuming
/// them (labeling may still need them for other queries' path enumeration),
/// so it needs an owned copy to append to a [`Path`]. `StopState` carries no
/// `Clone` (see design notes on ownership); this narrow helper clones only
/// the fields enumeration actually threads forward, never the owned
/// `low_cost_path`.
fn clone_stop_state(ss: &StopState) -> StopState {
    StopState {
        key: ss.key,
        deparr_time: ss.deparr_time,
        arrdep_time: ss.arrdep_time,
        link_time: ss.link_time,
        link_fare: ss.link_fare,
        link_cost: ss.link_cost,
        link_dist: ss.link_dist,
        link_ivtwt: ss.link_ivtwt,
        cost: ss.cost,
        iteration: ss.iteration,
        probability: ss.probability,
        cum_prob_i: ss.cum_prob_i,
        fare_period: ss.fare_period,
        low_cost_path: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemorySupply;
    use crate::supply::{AccessEgressLink, StopTimeRecord, TripInfo};
    use crate::trace::NullTraceSink;

    fn small_outbound() -> (InMemorySupply, PathSpecification) {
        let mut supply = InMemorySupply::new();
        supply.add_access_egress_link(
            "walk",
            AccessEgressLink { zone: 1, supply_mode: 0, stop: 10, start_time: 0.0, end_time: 1440.0, time: 5.0, dist: 0.4, attributes: HashMap::new() },
        );
        supply.add_access_egress_link(
            "walk",
            AccessEgressLink { zone: 2, supply_mode: 0, stop: 11, start_time: 0.0, end_time: 1440.0, time: 3.0, dist: 0.2, attributes: HashMap::new() },
        );
        supply.add_trip(
            1,
            TripInfo { supply_mode: 1, route: "R1".into(), attributes: HashMap::new() },
            vec![
                StopTimeRecord { trip_id: 1, seq: 1, stop_id: 10, arrive_time: 480.0, depart_time: 480.0 },
                StopTimeRecord { trip_id: 1, seq: 2, stop_id: 11, arrive_time: 490.0, depart_time: 490.0 },
            ],
        );

        let mut weights = HashMap::new();
        weights.insert("walk_time_min".to_string(), 2.0);
        supply.set_weights("default", DemandModeType::Access, "walk", 0, weights.clone());
        supply.set_weights("default", DemandModeType::Egress, "walk", 0, weights);
        let mut transit_weights = HashMap::new();
        transit_weights.insert("in_vehicle_time_min".to_string(), 1.0);
        transit_weights.insert("wait_time_min".to_string(), 1.5);
        transit_weights.insert("transfer_penalty".to_string(), 5.0);
        supply.set_weights("default", DemandModeType::Transit, "transit", 1, transit_weights.clone());
        supply.set_weights("default", DemandModeType::Transfer, "transfer", 0, transit_weights);

        supply.build();
        let spec = PathSpecification {
            iteration: 0,
            pathfinding_iteration: 0,
            outbound: true,
            hyperpath: false,
            orig_taz: 1,
            dest_taz: 2,
            preferred_time: 495.0,
            value_of_time: 10.0,
            access_demand_mode: "walk".into(),
            transit_demand_mode: "transit".into(),
            egress_demand_mode: "walk".into(),
            user_class: "default".into(),
            purpose: "work".into(),
            trace: false,
            person_id: "p1".into(),
            person_trip_id: "p1_1".into(),
        };
        (supply, spec)
    }

    #[test]
    fn finds_single_transit_path_outbound() {
        let (supply, spec) = small_outbound();
        let params = PathfinderParams::default();
        let pathfinder = Pathfinder::new(&supply, params);
        let mut trace = NullTraceSink;
        let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");
        assert_eq!(result.path_set.len(), 1);
        let path = result.chosen_path().expect("a path was chosen");
        assert!(!path.is_empty());
        let trip_ids: Vec<u32> = path.links().iter().map(|(_, ss)| ss.trip_id()).collect();
        assert!(trip_ids.contains(&1));
    }

    #[test]
    fn inbound_search_finds_same_trip() {
        let (supply, mut spec) = small_outbound();
        spec.outbound = false;
        spec.preferred_time = 470.0;
        let params = PathfinderParams::default();
        let pathfinder = Pathfinder::new(&supply, params);
        let mut trace = NullTraceSink;
        let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");
        assert_eq!(result.path_set.len(), 1);
    }

    #[test]
    fn no_path_when_network_disconnected() {
        let mut supply = InMemorySupply::new();
        supply.build();
        let spec = PathSpecification {
            iteration: 0,
            pathfinding_iteration: 0,
            outbound: true,
            hyperpath: false,
            orig_taz: 1,
            dest_taz: 2,
            preferred_time: 495.0,
            value_of_time: 10.0,
            access_demand_mode: "walk".into(),
            transit_demand_mode: "transit".into(),
            egress_demand_mode: "walk".into(),
            user_class: "default".into(),
            purpose: "work".into(),
            trace: false,
            person_id: "p1".into(),
            person_trip_id: "p1_2".into(),
        };
        let params = PathfinderParams::default();
        let pathfinder = Pathfinder::new(&supply, params);
        let mut trace = NullTraceSink;
        let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");
        assert!(result.is_empty());
        assert!(matches!(pathfinder.find_path_strict(&spec, &mut trace), Err(PathfindingError::NoPath)));
    }

    #[test]
    fn capacity_bump_pushes_boarding_earlier_and_adds_cost() {
        let (supply, spec) = small_outbound();
        let params = PathfinderParams::default();
        let mut pathfinder = Pathfinder::new(&supply, params);
        pathfinder.set_bump_wait(1, 1, 10, 475.0);
        let mut trace = NullTraceSink;
        let result = pathfinder.find_path(&spec, &mut trace).expect("labeling invariant held");
        assert_eq!(result.path_set.len(), 1);
        assert!(result.chosen_info().expect("a path was chosen").cost > 0.0);
    }
}
