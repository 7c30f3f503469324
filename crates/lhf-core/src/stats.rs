//! Operation statistics and optional wall-clock profiling.
//!
//! Counters are always on: they are plain integer bumps on paths that
//! already touch the caches, and memoization behavior (hit vs. miss on a
//! repeated operation) is part of the observable contract. Timers are off
//! by default and enabled per instance with `set_timing(true)`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

/// Outcome counters for one operation family.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpCounters {
    /// Direct cache hits: the operand pair was in the table.
    pub hits: u64,
    /// Both operands were the same identifier.
    pub equal_hits: u64,
    /// Resolved through a recorded subset relation.
    pub subset_hits: u64,
    /// Short-circuited because an operand was empty.
    pub empty_hits: u64,
    /// The result set itself was new: neither node nor edge existed.
    pub cold_misses: u64,
    /// The result set existed but the cache edge was new.
    pub edge_misses: u64,
}

impl OpCounters {
    /// Total misses of either kind.
    pub fn misses(&self) -> u64 {
        self.cold_misses + self.edge_misses
    }

    fn render_into(&self, out: &mut String) {
        let _ = writeln!(out, "      Hits       : {}", self.hits);
        let _ = writeln!(out, "      Equal Hits : {}", self.equal_hits);
        let _ = writeln!(out, "      Subset Hits: {}", self.subset_hits);
        let _ = writeln!(out, "      Empty Hits : {}", self.empty_hits);
        let _ = writeln!(out, "      Cold Misses: {}", self.cold_misses);
        let _ = writeln!(out, "      Edge Misses: {}", self.edge_misses);
    }
}

/// Cumulative wall-clock spent in one entry point.
#[derive(Debug, Default, Clone, Copy)]
pub struct Timer {
    pub calls: u64,
    pub total: Duration,
}

/// All counters for one forest instance.
#[derive(Debug, Default)]
pub struct ForestStats {
    /// Store registrations: only `hits` and `cold_misses` apply.
    pub store: OpCounters,
    pub unions: OpCounters,
    pub intersections: OpCounters,
    pub differences: OpCounters,
    pub filters: OpCounters,
    timers: BTreeMap<&'static str, Timer>,
}

impl ForestStats {
    pub(crate) fn record_time(&mut self, key: &'static str, elapsed: Duration) {
        let timer = self.timers.entry(key).or_default();
        timer.calls += 1;
        timer.total += elapsed;
    }

    /// Accumulated timer for an entry point, if timing was enabled and the
    /// entry point ran.
    pub fn timer(&self, key: &str) -> Option<Timer> {
        self.timers.get(key).copied()
    }

    /// Human-readable profile of all counters and timers.
    pub fn render(&self) -> String {
        let mut out = String::from("Performance profile:\n");
        for (name, counters) in [
            ("store", &self.store),
            ("unions", &self.unions),
            ("intersections", &self.intersections),
            ("differences", &self.differences),
            ("filters", &self.filters),
        ] {
            let _ = writeln!(out, "    {name}");
            counters.render_into(&mut out);
        }
        if !self.timers.is_empty() {
            out.push_str("    timers\n");
            for (key, timer) in &self.timers {
                let _ = writeln!(
                    out,
                    "      '{key}': {} calls, {:.3} ms",
                    timer.calls,
                    timer.total.as_secs_f64() * 1000.0
                );
            }
        }
        out
    }
}
