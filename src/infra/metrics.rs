// ============================================================
// Layer 6 — Training Metrics
// ============================================================
// The explicit mutable state the training loop carries between
// steps: running NSP/MLM loss sums since the last report and the
// wall-clock start time. Encapsulated in one struct instead of
// ambient globals so resume and testing stay straightforward.
//
// Progress line format, printed at every checkpoint interval:
//
//   [ 1,560/1,000,000 ][ 0:03:12 ][ NSP loss: 0.693 ][ MLM loss: 5.921 ]

use std::time::{Duration, Instant};

use crate::domain::traits::StepLosses;

/// Running training-loop state. The step counter itself lives in
/// the loop variable; this tracks what the loop reports.
pub struct TrainingState {
    running_nsp: f64,
    running_mlm: f64,
    window_steps: usize,
    started: Instant,
}

impl TrainingState {
    pub fn start() -> Self {
        Self { running_nsp: 0.0, running_mlm: 0.0, window_steps: 0, started: Instant::now() }
    }

    /// Fold one step's losses into the current reporting window.
    pub fn accumulate(&mut self, losses: StepLosses) {
        self.running_nsp += losses.nsp;
        self.running_mlm += losses.mlm;
        self.window_steps += 1;
    }

    /// Reset the accumulators at a reporting boundary. The
    /// wall-clock start is deliberately not reset: elapsed time
    /// covers the whole run.
    pub fn reset_window(&mut self) {
        self.running_nsp = 0.0;
        self.running_mlm = 0.0;
        self.window_steps = 0;
    }

    pub fn mean_nsp(&self) -> f64 {
        self.running_nsp / self.window_steps.max(1) as f64
    }

    pub fn mean_mlm(&self) -> f64 {
        self.running_mlm / self.window_steps.max(1) as f64
    }

    pub fn progress_line(&self, step: usize, total_steps: usize) -> String {
        format!(
            "[ {}/{} ][ {} ][ NSP loss: {:.3} ][ MLM loss: {:.3} ]",
            group_thousands(step),
            group_thousands(total_steps),
            format_elapsed(self.started.elapsed()),
            self.mean_nsp(),
            self.mean_mlm(),
        )
    }
}

/// Render a duration as H:MM:SS.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// 1234567 → "1,234,567"
fn group_thousands(n: usize) -> String {
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

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_averages() {
        let mut state = TrainingState::start();
        state.accumulate(StepLosses { nsp: 1.0, mlm: 4.0 });
        state.accumulate(StepLosses { nsp: 3.0, mlm: 2.0 });

        assert_eq!(state.mean_nsp(), 2.0);
        assert_eq!(state.mean_mlm(), 3.0);

        state.reset_window();
        assert_eq!(state.mean_nsp(), 0.0);
        assert_eq!(state.mean_mlm(), 0.0);
    }

    #[test]
    fn elapsed_formats_as_hms() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "0:01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3600 * 5 + 62)), "5:01:02");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(5), "5");
        assert_eq!(group_thousands(1_560), "1,560");
        assert_eq!(group_thousands(1_000_000), "1,000,000");
    }

    #[test]
    fn progress_line_shape() {
        let mut state = TrainingState::start();
        state.accumulate(StepLosses { nsp: 0.5, mlm: 6.0 });
        let line = state.progress_line(1_560, 1_000_000);
        assert!(line.starts_with("[ 1,560/1,000,000 ][ 0:00:0"));
        assert!(line.contains("[ NSP loss: 0.500 ]"));
        assert!(line.ends_with("[ MLM loss: 6.000 ]"));
    }
}
