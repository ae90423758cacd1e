//! A plain in-memory [`Supply`] implementation.
//!
//! Holds whatever tables a host has already ingested (from GTFS, CSV, SQL —
//! ingestion itself is out of scope for this crate). Used directly by tests
//! and benchmarks, and as a reference for hosts wiring their own loader.

use std::collections::HashMap;

use crate::supply::{
    AccessEgressLink, DemandModeType, FarePeriod, FarePeriodId, FareTransferRule, NamedWeights,
    StopId, StopTimeRecord, Supply, TransferLink, TripId, TripInfo, TripStopVisit, ZoneId,
};
use crate::time::Minutes;

#[derive(Debug, Default)]
pub struct InMemorySupply {
    access_egress: HashMap<(ZoneId, String), Vec<AccessEgressLink>>,
    transfers_from: HashMap<StopId, Vec<TransferLink>>,
    transfers_to: HashMap<StopId, Vec<TransferLink>>,
    /// Per-stop, time-sorted list of visits, for windowed trip lookup.
    stop_visits: HashMap<StopId, Vec<TripStopVisit>>,
    stop_times: HashMap<TripId, Vec<StopTimeRecord>>,
    trip_info: HashMap<TripId, TripInfo>,
    fare_period_for_trip_segment: HashMap<(TripId, StopId, StopId), FarePeriodId>,
    fare_periods: HashMap<FarePeriodId, FarePeriod>,
    fare_transfers: HashMap<(FarePeriodId, FarePeriodId), FareTransferRule>,
    weights: HashMap<(String, DemandModeType, String, u32), NamedWeights>,
}

impl InMemorySupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_access_egress_link(&mut self, demand_mode: impl Into<String>, link: AccessEgressLink) {
        self.access_egress
            .entry((link.zone, demand_mode.into()))
            .or_default()
            .push(link);
    }

    pub fn add_transfer_link(&mut self, link: TransferLink) {
        self.transfers_from.entry(link.from_stop).or_default().push(link.clone());
        self.transfers_to.entry(link.to_stop).or_default().push(link);
    }

    /// Adds the stop-time table for one trip. `stop_times` must be sorted by
    /// `seq`, with `seq` starting at 1 and increasing by 1 per row — the
    /// contract §6 places on stop-time input.
    pub fn add_trip(&mut self, trip_id: TripId, info: TripInfo, stop_times: Vec<StopTimeRecord>) {
        for (i, st) in stop_times.iter().enumerate() {
            assert_eq!(st.seq, (i + 1) as i32, "stop_times for trip {trip_id} must have seq 1..N contiguous");
            assert_eq!(st.trip_id, trip_id);
        }
        for st in &stop_times {
            self.stop_visits.entry(st.stop_id).or_default().push(TripStopVisit {
                trip_id,
                seq: st.seq,
                time: st.arrive_time,
            });
        }
        self.trip_info.insert(trip_id, info);
        self.stop_times.insert(trip_id, stop_times);
    }

    pub fn set_fare_period(&mut self, trip_id: TripId, board_stop: StopId, alight_stop: StopId, fare_period: FarePeriodId) {
        self.fare_period_for_trip_segment.insert((trip_id, board_stop, alight_stop), fare_period);
    }

    pub fn add_fare_period(&mut self, period: FarePeriod) {
        self.fare_periods.insert(period.id, period);
    }

    pub fn add_fare_transfer(&mut self, rule: FareTransferRule) {
        self.fare_transfers.insert((rule.from_fare_period, rule.to_fare_period), rule);
    }

    pub fn set_weights(
        &mut self,
        user_class: impl Into<String>,
        demand_mode_type: DemandModeType,
        demand_mode: impl Into<String>,
        supply_mode: u32,
        weights: NamedWeights,
    ) {
        self.weights.insert((user_class.into(), demand_mode_type, demand_mode.into(), supply_mode), weights);
    }

    /// Finalizes internal indices for windowed lookups. Call once after all
    /// trips have been added.
    pub fn build(&mut self) {
        for visits in self.stop_visits.values_mut() {
            visits.sort_unstable_by(|a, b| a.time.total_cmp(&b.time));
        }
    }
}

static EMPTY_AE: &[AccessEgressLink] = &[];
static EMPTY_XFER: &[TransferLink] = &[];
static EMPTY_STOPTIME: &[StopTimeRecord] = &[];

impl Supply for InMemorySupply {
    fn access_egress_links(&self, zone: ZoneId, demand_mode: &str) -> &[AccessEgressLink] {
        self.access_egress
            .get(&(zone, demand_mode.to_owned()))
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_AE)
    }

    fn transfer_links_from(&self, stop: StopId) -> &[TransferLink] {
        self.transfers_from.get(&stop).map(Vec::as_slice).unwrap_or(EMPTY_XFER)
    }

    fn transfer_links_to(&self, stop: StopId) -> &[TransferLink] {
        self.transfers_to.get(&stop).map(Vec::as_slice).unwrap_or(EMPTY_XFER)
    }

    fn trips_at_stop(&self, stop: StopId, window: (Minutes, Minutes)) -> Vec<TripStopVisit> {
        let (lo, hi) = window;
        match self.stop_visits.get(&stop) {
            Some(visits) => visits.iter().filter(|v| v.time >= lo && v.time <= hi).copied().collect(),
            None => Vec::new(),
        }
    }

    fn trip_stop_times(&self, trip: TripId) -> &[StopTimeRecord] {
        self.stop_times.get(&trip).map(Vec::as_slice).unwrap_or(EMPTY_STOPTIME)
    }

    fn trip_info(&self, trip: TripId) -> Option<&TripInfo> {
        self.trip_info.get(&trip)
    }

    fn fare_period_for(&self, trip: TripId, board_stop: StopId, alight_stop: StopId) -> Option<FarePeriodId> {
        self.fare_period_for_trip_segment.get(&(trip, board_stop, alight_stop)).copied()
    }

    fn fare_period(&self, id: FarePeriodId) -> Option<&FarePeriod> {
        self.fare_periods.get(&id)
    }

    fn fare_transfer(&self, from: FarePeriodId, to: FarePeriodId) -> Option<&FareTransferRule> {
        self.fare_transfers.get(&(from, to))
    }

    fn weights(
        &self,
        user_class: &str,
        demand_mode_type: DemandModeType,
        demand_mode: &str,
        supply_mode: u32,
    ) -> Option<&NamedWeights> {
        self.weights
            .get(&(user_class.to_owned(), demand_mode_type, demand_mode.to_owned(), supply_mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "seq 1..N contiguous")]
    fn rejects_non_contiguous_seq() {
        let mut supply = InMemorySupply::new();
        supply.add_trip(
            1,
            TripInfo { supply_mode: 0, route: "R1".into(), attributes: HashMap::new() },
            vec![
                StopTimeRecord { trip_id: 1, seq: 1, stop_id: 10, arrive_time: 0.0, depart_time: 0.0 },
                StopTimeRecord { trip_id: 1, seq: 3, stop_id: 11, arrive_time: 5.0, depart_time: 5.0 },
            ],
        );
    }

    #[test]
    fn windowed_trip_lookup_filters_by_time() {
        let mut supply = InMemorySupply::new();
        supply.add_trip(
            1,
            TripInfo { supply_mode: 0, route: "R1".into(), attributes: HashMap::new() },
            vec![
                StopTimeRecord { trip_id: 1, seq: 1, stop_id: 10, arrive_time: 0.0, depart_time: 0.0 },
                StopTimeRecord { trip_id: 1, seq: 2, stop_id: 11, arrive_time: 10.0, depart_time: 10.0 },
            ],
        );
        supply.build();
        assert_eq!(supply.trips_at_stop(11, (5.0, 15.0)).len(), 1);
        assert_eq!(supply.trips_at_stop(11, (20.0, 30.0)).len(), 0);
    }
}
