//! CostEngine (C6): a pure function from an attribute bundle and a named
//! weight table to a scalar cost.

use crate::supply::{AttributeBag, NamedWeights};

pub type Cost = f64;

/// Stateless cost evaluator. Kept as a unit struct (rather than a free
/// function) so that call sites read `CostEngine::tally_link_cost(...)`
/// symmetrically with the other engines, and so a future variant with
/// configuration (e.g. strict-missing-attribute mode) has somewhere to live.
pub struct CostEngine {
    /// When set, a missing attribute referenced by a weight aborts cost
    /// evaluation (`None`) instead of being treated as zero.
    pub strict_missing_attributes: bool,
}

impl Default for CostEngine {
    fn default() -> Self {
        Self { strict_missing_attributes: false }
    }
}

impl CostEngine {
    /// `cost = sum(weights[k] * attributes[k])` over the weight table's keys.
    /// An attribute named by a weight but absent from the bundle is logged
    /// as a data warning and treated as `0.0`, unless `strict_missing_attributes`
    /// is set, in which case the whole evaluation fails.
    pub fn tally_link_cost(
        &self,
        supply_mode: u32,
        named_weights: &NamedWeights,
        attributes: &AttributeBag,
    ) -> Option<Cost> {
        let mut cost = 0.0;
        for (attribute, weight) in named_weights {
            let value = match attributes.get(attribute) {
                Some(v) => *v,
                None => {
                    log::warn!(
                        "supply mode {supply_mode}: weight references missing attribute \"{attribute}\", treating as 0"
                    );
                    if self.strict_missing_attributes {
                        return None;
                    }
                    0.0
                }
            };
            cost += weight * value;
        }
        Some(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn dot_product_over_weight_keys() {
        let engine = CostEngine::default();
        let mut weights = HashMap::new();
        weights.insert("in_vehicle_time_min".to_string(), 1.0);
        weights.insert("wait_time_min".to_string(), 2.0);
        let mut attrs = HashMap::new();
        attrs.insert("in_vehicle_time_min".to_string(), 10.0);
        attrs.insert("wait_time_min".to_string(), 3.0);
        assert_eq!(engine.tally_link_cost(0, &weights, &attrs), Some(16.0));
    }

    #[test]
    fn missing_attribute_treated_as_zero_by_default() {
        let engine = CostEngine::default();
        let mut weights = HashMap::new();
        weights.insert("unknown_attr".to_string(), 5.0);
        let attrs = HashMap::new();
        assert_eq!(engine.tally_link_cost(0, &weights, &attrs), Some(0.0));
    }

    #[test]
    fn strict_mode_fails_on_missing_attribute() {
        let engine = CostEngine { strict_missing_attributes: true };
        let mut weights = HashMap::new();
        weights.insert("unknown_attr".to_string(), 5.0);
        let attrs = HashMap::new();
        assert_eq!(engine.tally_link_cost(0, &weights, &attrs), None);
    }
}
