//! Hyperlink (C2): the per-stop aggregate of candidate links, split into a
//! trip `LinkSet` and a non-trip `LinkSet`, each holding a bounded,
//! cost-ordered, windowed set of [`StopState`]s with a running
//! sum-exponentiated cost and cumulative-probability partition.

use std::collections::HashMap;

use crate::config::PathfinderParams;
use crate::cost::Cost;
use crate::path::Path;
use crate::stop_state::{DeparrMode, StopState, StopStateKey};
use crate::time::Minutes;

/// Outcome of [`Hyperlink::add_link`]; the caller requeues the owning stop
/// on `state_changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLinkOutcome {
    pub rejected: bool,
    pub state_changed: bool,
}

impl AddLinkOutcome {
    fn rejected() -> Self {
        Self { rejected: true, state_changed: false }
    }

    fn accepted(state_changed: bool) -> Self {
        Self { rejected: false, state_changed }
    }
}

/// A live candidate surviving enumeration-mode filtering, carrying the
/// possibly fare-adjusted cost used to build the choice distribution.
#[derive(Debug, Clone, Copy)]
pub struct EnumerationCandidate {
    pub key: StopStateKey,
    pub adjusted_cost: Cost,
    pub cum_prob_i: i64,
}

const HYPERPATH_COST_TOLERANCE: f64 = 1e-4;
/// Integerized cumulative probability is scaled against this constant rather
/// than a platform `RAND_MAX` (see design notes, Open Question (b)).
pub const PROB_SCALE: i64 = 1_000_000_000;

pub struct LinkSet {
    is_trip_set: bool,
    entries: HashMap<StopStateKey, StopState>,
    /// Cost-ordered index; a multimap since ties on cost are expected.
    cost_order: Vec<(Cost, StopStateKey)>,
    extremum_time: Option<Minutes>,
    extremum_key: Option<StopStateKey>,
    sum_exp_cost: f64,
    hyperpath_cost: Cost,
    process_count: u32,
    max_cum_prob_i: i64,
}

impl LinkSet {
    fn new(is_trip_set: bool) -> Self {
        Self {
            is_trip_set,
            entries: HashMap::new(),
            cost_order: Vec::new(),
            extremum_time: None,
            extremum_key: None,
            sum_exp_cost: 0.0,
            hyperpath_cost: Cost::INFINITY,
            process_count: 0,
            max_cum_prob_i: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn hyperpath_cost(&self) -> Cost {
        self.hyperpath_cost
    }

    pub fn extremum_time(&self) -> Option<Minutes> {
        self.extremum_time
    }

    pub fn process_count(&self) -> u32 {
        self.process_count
    }

    pub fn increment_process_count(&mut self) {
        self.process_count += 1;
    }

    pub fn max_cum_prob_i(&self) -> i64 {
        self.max_cum_prob_i
    }

    pub fn get(&self, key: &StopStateKey) -> Option<&StopState> {
        self.entries.get(key)
    }

    /// Links in ascending-cost order.
    pub fn iter_cost_order(&self) -> impl Iterator<Item = &StopState> {
        self.cost_order.iter().filter_map(move |(_, key)| self.entries.get(key))
    }

    fn boundary_mode(&self, outbound: bool) -> Option<DeparrMode> {
        if self.is_trip_set {
            None
        } else if outbound {
            Some(DeparrMode::Access)
        } else {
            Some(DeparrMode::Egress)
        }
    }

    fn is_boundary(&self, outbound: bool, mode: DeparrMode) -> bool {
        self.boundary_mode(outbound) == Some(mode)
    }

    fn insert_cost_order(&mut self, cost: Cost, key: StopStateKey) {
        let pos = self.cost_order.partition_point(|(c, _)| *c < cost);
        self.cost_order.insert(pos, (cost, key));
    }

    fn remove_cost_order(&mut self, cost: Cost, key: StopStateKey) {
        let start = self.cost_order.partition_point(|(c, _)| *c < cost);
        if let Some(offset) = self.cost_order[start..].iter().position(|(_, k)| *k == key) {
            self.cost_order.remove(start + offset);
        }
    }

    fn extends_extremum(&self, outbound: bool, time: Minutes) -> bool {
        match self.extremum_time {
            None => true,
            Some(current) => {
                if outbound {
                    time > current
                } else {
                    time < current
                }
            }
        }
    }

    fn outside_window(&self, outbound: bool, time: Minutes, window: Minutes) -> bool {
        let Some(extremum) = self.extremum_time else { return false };
        if outbound {
            time < extremum - window
        } else {
            time > extremum + window
        }
    }

    fn recompute_extremum_by_scan(&mut self, outbound: bool) {
        let mut best: Option<(Minutes, StopStateKey)> = None;
        for (key, ss) in self.entries.iter() {
            let better = match best {
                None => true,
                Some((t, _)) => {
                    if outbound {
                        ss.deparr_time > t
                    } else {
                        ss.deparr_time < t
                    }
                }
            };
            if better {
                best = Some((ss.deparr_time, *key));
            }
        }
        self.extremum_time = best.map(|(t, _)| t);
        self.extremum_key = best.map(|(_, k)| k);
    }

    /// Evicts entries now outside the admission window around the current
    /// extremum and recomputes `sum_exp_cost` from the surviving set.
    fn prune_window(&mut self, outbound: bool, theta: f64, window: Minutes) {
        let Some(extremum) = self.extremum_time else { return };
        let mut to_remove = Vec::new();
        let mut sum_exp = 0.0;
        for (key, ss) in self.entries.iter() {
            let boundary = self.is_boundary(outbound, ss.deparr_mode());
            let keep = boundary
                || if outbound {
                    ss.deparr_time >= extremum - window
                } else {
                    ss.deparr_time <= extremum + window
                };
            if keep {
                sum_exp += (-ss.cost / theta).exp();
            } else {
                to_remove.push((*key, ss.cost));
            }
        }
        for (key, cost) in to_remove {
            self.entries.remove(&key);
            self.remove_cost_order(cost, key);
        }
        self.sum_exp_cost = sum_exp;
    }

    /// Refreshes `probability`/`cum_prob_i` on every stored link in cost
    /// order, skipping links whose integerized probability mass rounds
    /// below `min_probability_mass`. Returns `max_cum_prob_i`.
    fn setup_probabilities_labeling(&mut self, theta: f64, min_probability_mass: f64) -> i64 {
        let hyperpath_cost = self.hyperpath_cost;
        let mut cum = 0i64;
        let keys: Vec<StopStateKey> = self.cost_order.iter().map(|(_, k)| *k).collect();
        for key in keys {
            let Some(ss) = self.entries.get_mut(&key) else { continue };
            if !ss.cost.is_finite() {
                ss.probability = 0.0;
                ss.cum_prob_i = -1;
                continue;
            }
            let probability = (-(ss.cost - hyperpath_cost) / theta).exp();
            ss.probability = probability;
            let prob_i = (PROB_SCALE as f64 * probability).floor() as i64;
            if prob_i < (min_probability_mass * PROB_SCALE as f64).max(1.0) as i64 {
                ss.cum_prob_i = -1;
                continue;
            }
            cum += prob_i;
            ss.cum_prob_i = cum;
        }
        self.max_cum_prob_i = cum;
        cum
    }

    /// `addLink`: admits or rejects `new_ss` into this LinkSet.
    pub fn add_link(&mut self, outbound: bool, hyperpath: bool, params: &PathfinderParams, new_ss: StopState) -> AddLinkOutcome {
        if !hyperpath {
            return self.add_link_deterministic(new_ss);
        }

        if self.is_empty() {
            let key = new_ss.key;
            let cost = new_ss.cost;
            self.extremum_time = Some(new_ss.deparr_time);
            self.extremum_key = Some(key);
            self.sum_exp_cost = (-cost / params.stoch_dispersion).exp();
            self.hyperpath_cost = cost;
            self.entries.insert(key, new_ss);
            self.insert_cost_order(cost, key);
            self.setup_probabilities_labeling(params.stoch_dispersion, params.min_probability_mass);
            return AddLinkOutcome::accepted(true);
        }

        let boundary = self.is_boundary(outbound, new_ss.deparr_mode());
        if !boundary && self.outside_window(outbound, new_ss.deparr_time, params.time_window) {
            return AddLinkOutcome::rejected();
        }

        let key = new_ss.key;
        let new_cost = new_ss.cost;
        let mut removed_extremum = false;

        match self.entries.get(&key) {
            None => {
                self.sum_exp_cost += (-new_cost / params.stoch_dispersion).exp();
                self.insert_cost_order(new_cost, key);
                self.entries.insert(key, new_ss);
            }
            Some(existing) => {
                if !(new_cost < existing.cost) {
                    return AddLinkOutcome::rejected();
                }
                let old_cost = existing.cost;
                removed_extremum = self.extremum_key == Some(key);
                self.sum_exp_cost -= (-old_cost / params.stoch_dispersion).exp();
                self.remove_cost_order(old_cost, key);
                self.sum_exp_cost += (-new_cost / params.stoch_dispersion).exp();
                self.insert_cost_order(new_cost, key);
                self.entries.insert(key, new_ss);
            }
        }

        let mut extremum_moved = false;
        if removed_extremum {
            self.recompute_extremum_by_scan(outbound);
            self.prune_window(outbound, params.stoch_dispersion, params.time_window);
            extremum_moved = true;
        } else {
            let time = self.entries[&key].deparr_time;
            if self.extends_extremum(outbound, time) {
                self.extremum_time = Some(time);
                self.extremum_key = Some(key);
                self.prune_window(outbound, params.stoch_dispersion, params.time_window);
                extremum_moved = true;
            }
        }

        let old_hyperpath_cost = self.hyperpath_cost;
        self.hyperpath_cost = -params.stoch_dispersion * self.sum_exp_cost.ln();
        let cost_moved = (self.hyperpath_cost - old_hyperpath_cost).abs() > HYPERPATH_COST_TOLERANCE;

        self.setup_probabilities_labeling(params.stoch_dispersion, params.min_probability_mass);

        AddLinkOutcome::accepted(extremum_moved || cost_moved)
    }

    fn add_link_deterministic(&mut self, new_ss: StopState) -> AddLinkOutcome {
        let current_min = self.cost_order.first().map(|(c, _)| *c);
        let better = match current_min {
            None => true,
            Some(min_cost) => new_ss.cost < min_cost,
        };
        if !better {
            return AddLinkOutcome::rejected();
        }
        self.entries.clear();
        self.cost_order.clear();
        self.hyperpath_cost = new_ss.cost;
        self.extremum_time = Some(new_ss.deparr_time);
        self.extremum_key = Some(new_ss.key);
        let key = new_ss.key;
        let cost = new_ss.cost;
        self.entries.insert(key, new_ss);
        self.cost_order.push((cost, key));
        AddLinkOutcome::accepted(true)
    }

    /// From the non-trip LinkSet in cost order, the first link whose
    /// `deparr_time` is compatible with `arrdep_time`; falls back to the
    /// globally cheapest link if none match.
    pub fn best_guess_link(&self, arrdep_time: Minutes, outbound: bool) -> Option<&StopState> {
        for (_, key) in &self.cost_order {
            let ss = &self.entries[key];
            let compatible = if outbound { ss.deparr_time >= arrdep_time } else { ss.deparr_time <= arrdep_time };
            if compatible {
                return Some(ss);
            }
        }
        self.cost_order.first().map(|(_, key)| &self.entries[key])
    }

    /// An owned, cost-ordered snapshot of `(deparr_time, mode, trip_id)` for
    /// every live link. Lets a caller replicate [`LinkSet::best_guess_link`]
    /// after releasing the borrow on this `LinkSet` — trip relaxation needs
    /// the board stop's best guess while it still holds a mutable borrow of
    /// the surrounding stop map for the downstream stop it's growing.
    pub fn snapshot_cost_order(&self) -> Vec<(Minutes, DeparrMode, crate::supply::SupplyModeId)> {
        self.cost_order
            .iter()
            .map(|(_, key)| {
                let ss = &self.entries[key];
                (ss.deparr_time, ss.deparr_mode(), ss.trip_id())
            })
            .collect()
    }

    /// Enumeration-mode probability setup: filters out infinite-cost,
    /// time-order-violating, and same-trip-repeat candidates relative to
    /// `path_so_far`'s last link, then builds a cumulative distribution over
    /// `cost_fn`-adjusted costs (fare adjustment happens in `cost_fn`).
    pub fn setup_probabilities_enumeration(
        &self,
        outbound: bool,
        path_so_far: &Path,
        mut cost_fn: impl FnMut(&StopState) -> Cost,
    ) -> (Vec<EnumerationCandidate>, i64) {
        let last = path_so_far.last_link();
        let mut survivors: Vec<(StopStateKey, Cost)> = Vec::new();
        for (_, key) in &self.cost_order {
            let ss = &self.entries[key];
            if !ss.cost.is_finite() {
                continue;
            }
            if let Some(last) = last {
                let violates_order = if outbound {
                    ss.deparr_time < last.arrdep_time
                } else {
                    ss.deparr_time > last.arrdep_time
                };
                if violates_order {
                    continue;
                }
                if ss.is_trip() && last.is_trip() && ss.trip_id() == last.trip_id() {
                    continue;
                }
            }
            survivors.push((*key, cost_fn(ss)));
        }

        if survivors.len() == 1 {
            return (
                vec![EnumerationCandidate { key: survivors[0].0, adjusted_cost: survivors[0].1, cum_prob_i: 1 }],
                1,
            );
        }

        let sum_exp: f64 = survivors.iter().map(|(_, c)| (-c).exp()).sum();
        if sum_exp <= 0.0 || !sum_exp.is_finite() {
            return (Vec::new(), 0);
        }
        let mut cum = 0i64;
        let mut out = Vec::with_capacity(survivors.len());
        for (key, cost) in survivors {
            let probability = (-cost).exp() / sum_exp;
            let prob_i = (PROB_SCALE as f64 * probability).floor().max(0.0) as i64;
            cum += prob_i;
            out.push(EnumerationCandidate { key, adjusted_cost: cost, cum_prob_i: cum });
        }
        (out, cum)
    }
}

/// `chooseState`: samples a uniform integer in `[0, max_cum_prob_i)` and
/// returns the first candidate (in the order supplied, which callers pass
/// in cost order) whose `cum_prob_i` is at least `sample + 1` and nonzero.
pub fn choose_state(cum_prob_i: &[(StopStateKey, i64)], max_cum_prob_i: i64, rng: &mut fastrand::Rng) -> Option<StopStateKey> {
    if max_cum_prob_i <= 0 {
        return None;
    }
    let target = rng.i64(0..max_cum_prob_i) + 1;
    cum_prob_i.iter().find(|(_, cum)| *cum != 0 && *cum >= target).map(|(key, _)| *key)
}

pub struct Hyperlink {
    pub linkset_trip: LinkSet,
    pub linkset_nontrip: LinkSet,
}

impl Hyperlink {
    pub fn new() -> Self {
        Self { linkset_trip: LinkSet::new(true), linkset_nontrip: LinkSet::new(false) }
    }

    pub fn linkset(&self, is_trip: bool) -> &LinkSet {
        if is_trip {
            &self.linkset_trip
        } else {
            &self.linkset_nontrip
        }
    }

    pub fn linkset_mut(&mut self, is_trip: bool) -> &mut LinkSet {
        if is_trip {
            &mut self.linkset_trip
        } else {
            &mut self.linkset_nontrip
        }
    }

    pub fn add_link(&mut self, outbound: bool, hyperpath: bool, params: &PathfinderParams, new_ss: StopState) -> AddLinkOutcome {
        let is_trip = new_ss.is_trip();
        self.linkset_mut(is_trip).add_link(outbound, hyperpath, params, new_ss)
    }
}

impl Default for Hyperlink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stop_state::StopStateKey;

    fn make_ss(mode: DeparrMode, trip_id: u32, stop_succpred: u32, deparr_time: Minutes, cost: Cost) -> StopState {
        StopState {
            key: StopStateKey { deparr_mode: mode, trip_id, stop_succpred, seq: -1, seq_succpred: -1 },
            deparr_time,
            arrdep_time: deparr_time,
            link_time: 0.0,
            link_fare: 0.0,
            link_cost: cost,
            link_dist: 0.0,
            link_ivtwt: 0.0,
            cost,
            iteration: 0,
            probability: 0.0,
            cum_prob_i: -1,
            fare_period: None,
            low_cost_path: None,
        }
    }

    #[test]
    fn deterministic_mode_keeps_only_cheapest() {
        let params = PathfinderParams::default();
        let mut set = LinkSet::new(false);
        let a = make_ss(DeparrMode::Access, 1, 100, 10.0, 5.0);
        let b = make_ss(DeparrMode::Access, 2, 100, 10.0, 3.0);
        let c = make_ss(DeparrMode::Access, 3, 100, 10.0, 8.0);
        assert!(!set.add_link(true, false, &params, a).rejected);
        assert!(!set.add_link(true, false, &params, b).rejected);
        assert!(set.add_link(true, false, &params, c).rejected);
        assert_eq!(set.len(), 1);
        assert_eq!(set.hyperpath_cost(), 3.0);
    }

    #[test]
    fn linkset_coherence_after_inserts() {
        let mut params = PathfinderParams::default();
        params.stoch_dispersion = 10.0;
        params.time_window = 1000.0;
        let mut set = LinkSet::new(false);
        for i in 0..5u32 {
            let ss = make_ss(DeparrMode::Access, i, 100 + i, 10.0 + i as f64, 1.0 + i as f64);
            set.add_link(true, true, &params, ss);
        }
        assert_eq!(set.len(), set.cost_order.len());
        let expected_sum: f64 = set.entries.values().map(|ss| (-ss.cost / params.stoch_dispersion).exp()).sum();
        assert!((set.sum_exp_cost - expected_sum).abs() < 1e-9);
        let expected_hp = -params.stoch_dispersion * expected_sum.ln();
        assert!((set.hyperpath_cost() - expected_hp).abs() < 1e-4);
    }

    #[test]
    fn window_invariant_holds_after_extension() {
        let mut params = PathfinderParams::default();
        params.time_window = 5.0;
        params.stoch_dispersion = 10.0;
        let mut set = LinkSet::new(false);
        set.add_link(true, true, &params, make_ss(DeparrMode::Transfer, 1, 100, 10.0, 1.0));
        set.add_link(true, true, &params, make_ss(DeparrMode::Transfer, 2, 101, 9.0, 1.0));
        // Extends the window far enough out that stop 100's link should be pruned.
        set.add_link(true, true, &params, make_ss(DeparrMode::Transfer, 3, 102, 20.0, 1.0));
        let extremum = set.extremum_time().unwrap();
        for ss in set.iter_cost_order() {
            let boundary = set.is_boundary(true, ss.deparr_mode());
            if !boundary {
                assert!(ss.deparr_time >= extremum - params.time_window);
            }
        }
    }
}
