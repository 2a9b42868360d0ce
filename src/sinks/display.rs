use std::fmt::Write as _;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::stats::Stats;
use crate::stats::snapshot::Snapshot;

/// Column headers of the live view, in display order.
pub const HEADER: [&str; 8] = [
    "exchange",
    "routing key",
    "total messages",
    "total size",
    "messages per sec",
    "size per sec",
    "max size",
    "avg size",
];

/// Groups a count into thousands: `1234567` renders as `1,234,567`.
#[must_use]
pub fn comma_grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// SI byte formatting: `999` renders as `999 B`, `1500` as `1.5 kB`.
#[must_use]
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];
    if n < 1000 {
        return format!("{n} B");
    }
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn format_row(stat: &Stats) -> [String; 8] {
    [
        stat.exchange.clone(),
        stat.routing_key.clone(),
        comma_grouped(stat.count),
        human_bytes(stat.total_size),
        format!("{:.1}", stat.avg_msg_per_sec),
        format!("{}/s", human_bytes(stat.avg_body_size_per_sec)),
        human_bytes(stat.max_size),
        human_bytes(stat.avg_body_size),
    ]
}

/// Renders a snapshot list as a column-aligned text table, header first,
/// records in the order the collector emitted them.
#[must_use]
pub fn render(snapshot: &[Stats]) -> String {
    let mut rows: Vec<[String; 8]> = Vec::with_capacity(snapshot.len() + 1);
    rows.push(HEADER.map(str::to_string));
    rows.extend(snapshot.iter().map(format_row));

    let mut widths = [0usize; 8];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    for row in &rows {
        for (i, (cell, width)) in row.iter().zip(widths.iter().copied()).enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            let _ = write!(out, "{cell:<width$}");
        }
        out.push('\n');
    }
    out
}

/// Live-view consumer: rewrites the table on every broadcast it receives.
#[allow(clippy::module_name_repetitions)]
pub struct DisplaySink {
    rx: Receiver<Snapshot>,
    cancel_token: CancellationToken,
}

impl DisplaySink {
    #[must_use]
    pub fn new(rx: Receiver<Snapshot>, cancel_token: CancellationToken) -> Self {
        Self { rx, cancel_token }
    }

    pub async fn run(mut self) {
        debug!("DISPLAY_SINK | started");
        let mut stdout = tokio::io::stdout();
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!("DISPLAY_SINK | shutdown signal received");
                    return;
                }
                snapshot = self.rx.recv() => {
                    let Some(snapshot) = snapshot else {
                        debug!("DISPLAY_SINK | broadcast channel closed");
                        return;
                    };
                    // clear and redraw; the table always starts with the grand total
                    let frame = format!("\x1b[2J\x1b[H{}", render(&snapshot));
                    if let Err(e) = stdout.write_all(frame.as_bytes()).await {
                        error!("DISPLAY_SINK | write to stdout failed: {e}");
                        return;
                    }
                    let _ = stdout.flush().await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stats::RoutingStat;
    use std::time::Duration;

    #[test]
    fn comma_grouping() {
        assert_eq!(comma_grouped(0), "0");
        assert_eq!(comma_grouped(999), "999");
        assert_eq!(comma_grouped(1000), "1,000");
        assert_eq!(comma_grouped(1_234_567), "1,234,567");
    }

    #[test]
    fn byte_humanization() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(999), "999 B");
        assert_eq!(human_bytes(1500), "1.5 kB");
        assert_eq!(human_bytes(2_000_000), "2.0 MB");
        assert_eq!(human_bytes(3_500_000_000), "3.5 GB");
    }

    #[test]
    fn render_has_header_and_one_line_per_record() {
        let stat = RoutingStat {
            count: 1500,
            body_size: 3000,
            max_size: 2000,
        };
        let records = vec![stat.derive("orders", "created", Duration::from_secs(10))];
        let rendered = render(&records);

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("exchange"));
        assert!(lines[0].contains("messages per sec"));
        assert!(lines[1].contains("orders"));
        assert!(lines[1].contains("1,500"));
        assert!(lines[1].contains("3.0 kB"));
        assert!(lines[1].contains("150.0"));
        assert!(lines[1].contains("300 B/s"));
    }
}
