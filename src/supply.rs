//! The read-only query surface the labeling engine consults (C5).
//!
//! Ingesting raw stop/trip/route/fare tables into these entities is a host
//! concern (GTFS parsing, SQL loads, CSV loads — whatever the deployment
//! uses); the core only ever reads through the [`Supply`] trait.

use std::collections::HashMap;

use crate::time::Minutes;

pub type StopId = u32;
pub type ZoneId = u32;
pub type TripId = u32;
pub type SupplyModeId = u32;
pub type FarePeriodId = u32;

/// A link's cost-relevant attributes, looked up by name against a
/// [`NamedWeights`] table. Missing attributes are treated as zero by
/// [`crate::cost::CostEngine`], with a warning logged.
pub type AttributeBag = HashMap<String, f64>;

/// Named per-attribute weights for one `(user_class, demand_mode_type,
/// demand_mode, supply_mode)` combination.
pub type NamedWeights = HashMap<String, f64>;

/// Distinguishes the four weight-lookup families. TRANSFER is kept distinct
/// from ACCESS/EGRESS/TRANSIT even though all three non-transit kinds share
/// a `LinkSet`, because the weight table is keyed on demand-mode *type*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemandModeType {
    Access,
    Egress,
    Transfer,
    Transit,
}

#[derive(Debug, Clone)]
pub struct StopTimeRecord {
    pub trip_id: TripId,
    /// 1-based position of the stop within the trip.
    pub seq: i32,
    pub stop_id: StopId,
    pub arrive_time: Minutes,
    pub depart_time: Minutes,
}

#[derive(Debug, Clone)]
pub struct TripInfo {
    pub supply_mode: SupplyModeId,
    pub route: String,
    pub attributes: AttributeBag,
}

#[derive(Debug, Clone)]
pub struct AccessEgressLink {
    pub zone: ZoneId,
    pub supply_mode: SupplyModeId,
    pub stop: StopId,
    pub start_time: Minutes,
    pub end_time: Minutes,
    pub time: Minutes,
    pub dist: f64,
    pub attributes: AttributeBag,
}

impl AccessEgressLink {
    /// Is `t` within this link's time-of-day window?
    pub fn covers(&self, t: Minutes) -> bool {
        let t = crate::time::fix_time_range(t);
        t >= self.start_time && t <= self.end_time
    }
}

#[derive(Debug, Clone)]
pub struct TransferLink {
    pub from_stop: StopId,
    pub to_stop: StopId,
    pub time: Minutes,
    pub dist: f64,
    pub attributes: AttributeBag,
}

#[derive(Debug, Clone, Copy)]
pub struct FarePeriod {
    pub id: FarePeriodId,
    pub price: f64,
    /// Number of subsequent boardings within this fare period that ride free.
    pub free_transfers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FareTransferKind {
    Free,
    FixedCost(f64),
    /// An absolute amount decremented from the latter trip's price, floored
    /// at 0 (§4.7) — not a fraction.
    Discount(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct FareTransferRule {
    pub from_fare_period: FarePeriodId,
    pub to_fare_period: FarePeriodId,
    pub kind: FareTransferKind,
}

/// A trip calling at a stop, used to enumerate boarding/alighting options
/// within a time window during trip relaxation.
#[derive(Debug, Clone, Copy)]
pub struct TripStopVisit {
    pub trip_id: TripId,
    pub seq: i32,
    pub time: Minutes,
}

/// Read-only query surface over timetables, access/egress edges, transfer
/// edges, weights, trip info, fare periods and fare transfers.
///
/// Constructed once per worker and shared read-only across every query it
/// services (see concurrency model in the design notes); no interior
/// mutability or synchronization is required of implementors.
pub trait Supply: Sync {
    fn access_egress_links(&self, zone: ZoneId, demand_mode: &str) -> &[AccessEgressLink];

    /// Transfer links departing `stop` (used by outbound transfer relaxation).
    fn transfer_links_from(&self, stop: StopId) -> &[TransferLink];

    /// Transfer links arriving at `stop` (used by inbound transfer relaxation).
    fn transfer_links_to(&self, stop: StopId) -> &[TransferLink];

    /// Trips calling at `stop` with a departure/arrival time (outbound uses
    /// arrival, inbound uses departure) within `window`, inclusive.
    fn trips_at_stop(&self, stop: StopId, window: (Minutes, Minutes)) -> Vec<TripStopVisit>;

    fn trip_stop_times(&self, trip: TripId) -> &[StopTimeRecord];

    fn trip_info(&self, trip: TripId) -> Option<&TripInfo>;

    fn fare_period_for(&self, trip: TripId, board_stop: StopId, alight_stop: StopId) -> Option<FarePeriodId>;

    fn fare_period(&self, id: FarePeriodId) -> Option<&FarePeriod>;

    fn fare_transfer(&self, from: FarePeriodId, to: FarePeriodId) -> Option<&FareTransferRule>;

    fn weights(
        &self,
        user_class: &str,
        demand_mode_type: DemandModeType,
        demand_mode: &str,
        supply_mode: SupplyModeId,
    ) -> Option<&NamedWeights>;
}
