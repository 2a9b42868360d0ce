use std::sync::Arc;
use std::time::Duration;

use crate::stats::aggregator::AggregationTable;
use crate::stats::{RoutingStat, Stats, TOTAL_EXCHANGE, TOTAL_ROUTING_KEY};

/// The immutable list a collector tick hands to every sink. Shared, never
/// mutated after construction.
pub type Snapshot = Arc<Vec<Stats>>;

/// Builds the ordered snapshot list for one tick.
///
/// Index 0 is the grand total (`_total_` / `#`). Then, for each exchange in
/// ascending name order: one subtotal record whose routing-key label encodes
/// how many keys it rolls up, immediately followed by that exchange's
/// routing-key records in ascending order. This ordering is a display
/// contract; sinks render the list as-is.
#[must_use]
pub fn build(table: &AggregationTable, elapsed: Duration) -> Vec<Stats> {
    let mut list = Vec::with_capacity(table.routing_key_count() + table.exchange_count() + 1);
    let mut grand_total = RoutingStat::default();

    // grand total and subtotals are emitted before the records they roll up,
    // so their slots are reserved and filled in once known
    let placeholder = RoutingStat::default().derive("", "", Duration::ZERO);
    list.push(placeholder.clone());

    for (exchange, keys) in table.exchanges() {
        let mut subtotal = RoutingStat::default();
        let subtotal_index = list.len();
        list.push(placeholder.clone());

        for (routing_key, stat) in keys {
            subtotal.add(stat.count, stat.body_size, stat.max_size);
            list.push(stat.derive(exchange, routing_key, elapsed));
        }

        grand_total.add(subtotal.count, subtotal.body_size, subtotal.max_size);
        list[subtotal_index] = subtotal.derive(
            exchange,
            &format!("# ({} routing keys)", keys.len()),
            elapsed,
        );
    }

    list[0] = grand_total.derive(TOTAL_EXCHANGE, TOTAL_ROUTING_KEY, elapsed);
    list
}
