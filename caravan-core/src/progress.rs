/*!
Progress reporting for export and import runs.

The sink is purely observational: both pipelines feed it a running
`(current, total)` pair plus a short label. Totals rise as nested asset
lists are discovered mid-run, so sinks must tolerate a growing denominator.
*/

use tracing::debug;

/// Passive consumer of progress updates.
pub trait ProgressSink {
    fn update(&mut self, current: usize, total: usize, label: &str);
}

/// Sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&mut self, _current: usize, _total: usize, _label: &str) {}
}

/// Sink that logs updates at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&mut self, current: usize, total: usize, label: &str) {
        debug!(current, total, label, "progress");
    }
}

/// Counter threaded through a run, forwarding to the caller's sink.
pub(crate) struct ProgressCounter<'a> {
    current: usize,
    total: usize,
    sink: &'a mut dyn ProgressSink,
}

impl<'a> ProgressCounter<'a> {
    pub fn new(total: usize, sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            current: 0,
            total,
            sink,
        }
    }

    /// Raise the total as nested work is discovered.
    pub fn grow(&mut self, more: usize) {
        self.total += more;
    }

    /// Record one completed step.
    pub fn advance(&mut self, label: &str) {
        self.current += 1;
        self.sink.update(self.current, self.total, label);
    }

    /// Re-emit the current position, e.g. when entering a new phase.
    pub fn announce(&mut self, label: &str) {
        self.sink.update(self.current, self.total, label);
    }
}
