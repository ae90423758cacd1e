//! FareEngine (C7): fare-period lookup, fare-transfer rule application, and
//! the fare-to-cost conversion applied once a link's monetary fare is known.

use crate::cost::Cost;
use crate::supply::{FarePeriodId, FareTransferKind, Supply};

/// Stateless fare evaluator, kept as a unit struct for the same reason as
/// [`crate::cost::CostEngine`]: a uniform call-site shape across the engines.
pub struct FareEngine;

impl FareEngine {
    /// Converts a fare delta into a cost-space delta:
    /// `(60 / value_of_time) * link_ivtwt * delta_fare`. `value_of_time` is
    /// currency per hour; the `60/` term puts it in currency-per-minute terms
    /// to match `link_ivtwt`'s minutes basis.
    pub fn fare_cost_delta(value_of_time: f64, link_ivtwt: f64, delta_fare: f64) -> Cost {
        (60.0 / value_of_time) * link_ivtwt * delta_fare
    }

    fn resolve_transfer_fare(supply: &dyn Supply, from_period: FarePeriodId, to_period: FarePeriodId, full_fare: f64) -> f64 {
        if from_period == to_period {
            return full_fare;
        }
        match supply.fare_transfer(from_period, to_period) {
            Some(rule) => match rule.kind {
                FareTransferKind::Free => 0.0,
                FareTransferKind::FixedCost(cost) => cost,
                FareTransferKind::Discount(amount) => (full_fare - amount).max(0.0),
            },
            None => full_fare,
        }
    }

    /// `getFareWithTransfer`: the marginal fare (and its cost-space delta)
    /// for boarding a trip priced under `to_period`, given the
    /// probability-weighted distribution of fare periods a rider could
    /// already be travelling under — the non-trip hyperlink immediately
    /// preceding this boarding, whose entries each carry their own
    /// labeling-mode `probability`. `prior_fare_periods` yields `None` for an
    /// unpriced prior link (e.g. an initial access link with no fare
    /// period), which is treated as paying the full fare.
    ///
    /// `boardings_already_in_period` counts boardings already made within
    /// `to_period` on the path so far; a period's `free_transfers` waives
    /// the fare for the boardings up to that count.
    pub fn fare_with_transfer(
        supply: &dyn Supply,
        to_period: FarePeriodId,
        value_of_time: f64,
        link_ivtwt: f64,
        prior_fare_periods: impl Iterator<Item = (Option<FarePeriodId>, f64)>,
        boardings_already_in_period: u32,
    ) -> (f64, Cost) {
        let full_fare = supply.fare_period(to_period).map(|p| p.price).unwrap_or(0.0);

        // §4.7: the first boarding in a fare period (count == 0) always pays
        // full fare; boardings 1..=free_transfers ride free (discounted by
        // the full fare-period price, floored at 0 — i.e. free outright).
        if let Some(period) = supply.fare_period(to_period) {
            if boardings_already_in_period > 0 && boardings_already_in_period <= period.free_transfers {
                return (0.0, 0.0);
            }
        }

        let mut expected_fare = 0.0;
        let mut total_weight = 0.0;
        for (from_period, weight) in prior_fare_periods {
            let fare = match from_period {
                Some(from) => Self::resolve_transfer_fare(supply, from, to_period, full_fare),
                None => full_fare,
            };
            expected_fare += weight * fare;
            total_weight += weight;
        }

        let fare = if total_weight > 0.0 { expected_fare / total_weight } else { full_fare };
        let cost_delta = Self::fare_cost_delta(value_of_time, link_ivtwt, fare);
        (fare, cost_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemorySupply;
    use crate::supply::{FarePeriod, FareTransferRule};

    fn supply_with_periods() -> InMemorySupply {
        let mut s = InMemorySupply::new();
        s.add_fare_period(FarePeriod { id: 1, price: 2.50, free_transfers: 0 });
        s.add_fare_period(FarePeriod { id: 2, price: 3.00, free_transfers: 0 });
        s.add_fare_transfer(FareTransferRule { from_fare_period: 1, to_fare_period: 2, kind: FareTransferKind::Discount(0.5) });
        s
    }

    #[test]
    fn free_transfer_within_allowance_waives_fare() {
        let mut s = InMemorySupply::new();
        s.add_fare_period(FarePeriod { id: 1, price: 2.50, free_transfers: 1 });
        // First boarding (count 0) always pays full fare; the second
        // boarding (count 1, within the allowance of 1) rides free.
        let (first_fare, _) = FareEngine::fare_with_transfer(&s, 1, 12.0, 1.0, std::iter::once((None, 1.0)), 0);
        assert_eq!(first_fare, 2.50);
        let (fare, cost) = FareEngine::fare_with_transfer(&s, 1, 12.0, 1.0, std::iter::once((None, 1.0)), 1);
        assert_eq!(fare, 0.0);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn discounted_transfer_blends_by_probability() {
        let s = supply_with_periods();
        // Half the probability mass arrives already under period 1 (a flat
        // 0.50 transfer discount into period 2), half under period 2 itself
        // (full fare, same period).
        let prior = vec![(Some(1u32), 0.5), (Some(2u32), 0.5)];
        let (fare, _) = FareEngine::fare_with_transfer(&s, 2, 12.0, 1.0, prior.into_iter(), 0);
        // 0.5 * (3.00 - 0.50) + 0.5 * 3.00 = 2.75
        assert!((fare - 2.75).abs() < 1e-9);
    }

    #[test]
    fn unpriced_prior_pays_full_fare() {
        let s = supply_with_periods();
        let (fare, _) = FareEngine::fare_with_transfer(&s, 1, 12.0, 1.0, std::iter::once((None, 1.0)), 0);
        assert_eq!(fare, 2.50);
    }
}
