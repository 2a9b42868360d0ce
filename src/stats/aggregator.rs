use std::collections::BTreeMap;

use crate::stats::RoutingStat;

/// Two-level mapping, exchange name to routing-key name to [`RoutingStat`],
/// with get-or-create access and sorted iteration.
///
/// Every instance has exactly one owner: each worker mutates its private
/// table, and the collector mutates the single global one. Tables cross task
/// boundaries only by being moved through a channel.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AggregationTable {
    exchanges: BTreeMap<String, BTreeMap<String, RoutingStat>>,
}

impl AggregationTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single delivery against its (exchange, routing key) tag.
    pub fn record(&mut self, exchange: &str, routing_key: &str, size: u64) {
        self.stat_mut(exchange, routing_key).add(1, size, size);
    }

    /// Get-or-create accessor; absent tags come into existence zero-valued.
    pub fn stat_mut(&mut self, exchange: &str, routing_key: &str) -> &mut RoutingStat {
        self.exchanges
            .entry(exchange.to_string())
            .or_default()
            .entry(routing_key.to_string())
            .or_default()
    }

    /// Folds another table into this one, key by key. This is a reduce, not
    /// an overwrite: counts and byte totals sum, maxima take the larger side.
    /// The operation is commutative and associative, so the order in which
    /// worker tables arrive does not affect the final state, and merging an
    /// empty (just-reset) table is a no-op.
    pub fn merge(&mut self, other: &AggregationTable) {
        for (exchange, keys) in &other.exchanges {
            for (routing_key, stat) in keys {
                self.stat_mut(exchange, routing_key)
                    .add(stat.count, stat.body_size, stat.max_size);
            }
        }
    }

    #[must_use]
    pub fn get(&self, exchange: &str, routing_key: &str) -> Option<&RoutingStat> {
        self.exchanges.get(exchange)?.get(routing_key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Exchanges with their routing-key maps, in ascending lexicographic
    /// order of the exchange name. Routing keys within each map iterate in
    /// ascending order as well.
    pub fn exchanges(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, RoutingStat>)> {
        self.exchanges
            .iter()
            .map(|(name, keys)| (name.as_str(), keys))
    }

    /// Total number of routing keys across all exchanges.
    #[must_use]
    pub fn routing_key_count(&self) -> usize {
        self.exchanges.values().map(BTreeMap::len).sum()
    }

    /// Number of distinct exchanges.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }
}
