//! Attribute sampled memory to panes, windows and the whole tmux server.

use std::collections::BTreeMap;

use crate::process::{descendants, ChildrenIndex, Measurement};
use crate::tmux::Pane;

/// Unformatted totals in megabytes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    /// pane id -> total
    pub panes: BTreeMap<String, f64>,
    /// "session:window_index" -> total
    pub windows: BTreeMap<String, f64>,
    /// Sum of all pane totals
    pub grand_total: f64,
}

/// Sum each pane's root process and its descendants, then roll up by window.
///
/// Pids missing from `measurement` count as zero: they exited after sampling.
pub fn aggregate(panes: &[Pane], measurement: &Measurement, children: &ChildrenIndex) -> Totals {
    let mut totals = Totals::default();

    for pane in panes {
        let mut tree = descendants(pane.pid, children);
        tree.insert(pane.pid);

        let total: f64 = tree
            .iter()
            .map(|pid| measurement.get(pid).copied().unwrap_or(0.0))
            .sum();

        tracing::trace!(
            pane = %pane.pane_id,
            window = %pane.window_id,
            processes = tree.len(),
            total,
            "pane total"
        );
        totals.panes.insert(pane.pane_id.clone(), total);
        *totals.windows.entry(pane.window_key()).or_insert(0.0) += total;
    }

    totals.grand_total = totals.panes.values().sum();
    totals
}

/// Status bar rendering of a megabyte figure: `812M` or `1.5G`
pub fn format_mem(mb: f64) -> String {
    if mb >= 1024.0 {
        format!("{:.1}G", mb / 1024.0)
    } else {
        format!("{:.0}M", mb)
    }
}
