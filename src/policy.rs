//! Hot-reloadable vertical policy (spec §4.6, §6.4): per-vertical decision
//! thresholds plus a per-(rule, vertical) weight multiplier and enable bit.
//!
//! Grounded on the teacher's `scrapers::binance_book_ticker` use of
//! `ArcSwap<BookTickerSnapshot>`: readers take an uncontended atomic-pointer
//! load of the whole immutable snapshot, writers publish a wholly new
//! snapshot built from the old one. No lock is ever held across a request.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::models::Vertical;

pub const MIN_WEIGHT: f64 = 0.0;
pub const MAX_WEIGHT: f64 = 3.0;
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// One immutable policy generation. Cloning is cheap relative to how often
/// it's read: it happens once per reload, not once per request.
#[derive(Debug, Clone, Default)]
pub struct VerticalPolicySnapshot {
    thresholds: HashMap<Vertical, u8>,
    weights: HashMap<(String, Vertical), f64>,
    disabled: std::collections::HashSet<(String, Vertical)>,
}

impl VerticalPolicySnapshot {
    pub fn from_thresholds(thresholds: HashMap<Vertical, u8>) -> Self {
        Self {
            thresholds,
            weights: HashMap::new(),
            disabled: std::collections::HashSet::new(),
        }
    }

    pub fn threshold(&self, vertical: Vertical) -> u8 {
        self.thresholds.get(&vertical).copied().unwrap_or(60)
    }

    pub fn weight(&self, rule_name: &str, vertical: Vertical) -> f64 {
        self.weights
            .get(&(rule_name.to_string(), vertical))
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn is_enabled(&self, rule_name: &str, vertical: Vertical) -> bool {
        !self.disabled.contains(&(rule_name.to_string(), vertical))
    }

    pub fn with_weight(mut self, rule_name: &str, vertical: Vertical, weight: f64) -> Self {
        self.weights
            .insert((rule_name.to_string(), vertical), weight.clamp(MIN_WEIGHT, MAX_WEIGHT));
        self
    }

    pub fn with_disabled(mut self, rule_name: &str, vertical: Vertical) -> Self {
        self.disabled.insert((rule_name.to_string(), vertical));
        self
    }

    pub fn with_enabled(mut self, rule_name: &str, vertical: Vertical) -> Self {
        self.disabled.remove(&(rule_name.to_string(), vertical));
        self
    }
}

/// Lock-free publish/swap handle shared across the whole service.
#[derive(Clone)]
pub struct PolicyStore {
    inner: Arc<ArcSwap<VerticalPolicySnapshot>>,
}

impl PolicyStore {
    pub fn new(initial: VerticalPolicySnapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn current(&self) -> Arc<VerticalPolicySnapshot> {
        self.inner.load_full()
    }

    /// Publishes a whole new snapshot. Callers build the next snapshot
    /// from `current()` plus their delta, never mutate in place.
    pub fn publish(&self, next: VerticalPolicySnapshot) {
        self.inner.store(Arc::new(next));
    }

    /// Applies a weight update computed by the learning loop (spec §4.8)
    /// without disturbing any other rule/vertical entry.
    pub fn update_weight(&self, rule_name: &str, vertical: Vertical, weight: f64) {
        let next = (*self.current()).clone().with_weight(rule_name, vertical, weight);
        self.publish(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> HashMap<Vertical, u8> {
        let mut m = HashMap::new();
        m.insert(Vertical::Lending, 65);
        m.insert(Vertical::Crypto, 50);
        m
    }

    #[test]
    fn default_weight_is_one_and_enabled_by_default() {
        let snap = VerticalPolicySnapshot::from_thresholds(thresholds());
        assert_eq!(snap.weight("loan_stacking", Vertical::Lending), 1.0);
        assert!(snap.is_enabled("loan_stacking", Vertical::Lending));
    }

    #[test]
    fn weight_update_clamped_to_range() {
        let snap = VerticalPolicySnapshot::from_thresholds(thresholds()).with_weight("r", Vertical::Crypto, 10.0);
        assert_eq!(snap.weight("r", Vertical::Crypto), MAX_WEIGHT);
        let snap = snap.with_weight("r", Vertical::Crypto, -5.0);
        assert_eq!(snap.weight("r", Vertical::Crypto), MIN_WEIGHT);
    }

    #[test]
    fn disabling_is_per_rule_per_vertical() {
        let snap = VerticalPolicySnapshot::from_thresholds(thresholds()).with_disabled("r", Vertical::Crypto);
        assert!(!snap.is_enabled("r", Vertical::Crypto));
        assert!(snap.is_enabled("r", Vertical::Lending));
    }

    #[test]
    fn publish_swaps_atomically() {
        let store = PolicyStore::new(VerticalPolicySnapshot::from_thresholds(thresholds()));
        assert_eq!(store.current().threshold(Vertical::Lending), 65);
        store.update_weight("loan_stacking", Vertical::Lending, 1.5);
        assert_eq!(store.current().weight("loan_stacking", Vertical::Lending), 1.5);
        assert_eq!(store.current().threshold(Vertical::Lending), 65);
    }
}
