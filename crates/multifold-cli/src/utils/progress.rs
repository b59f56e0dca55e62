use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use multifold::engine::progress::{ChainStatus, Progress, ProgressCallback};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;

/// Running count of chain outcomes, shown as the bar message while chains resolve.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ChainTally {
    cached: u64,
    computed: u64,
    degraded: u64,
    failed: u64,
}

impl ChainTally {
    fn record(&mut self, status: ChainStatus) {
        match status {
            ChainStatus::CacheHit => self.cached += 1,
            ChainStatus::Computed => self.computed += 1,
            ChainStatus::Degraded => self.degraded += 1,
            ChainStatus::Failed => self.failed += 1,
        }
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for ChainTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            (self.computed, "computed"),
            (self.cached, "cached"),
            (self.degraded, "degraded"),
            (self.failed, "failed"),
        ];
        let mut first = true;
        for (count, label) in parts.into_iter().filter(|(n, _)| *n > 0) {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{count} {label}")?;
            first = false;
        }
        Ok(())
    }
}

fn status_marker(status: ChainStatus) -> &'static str {
    match status {
        ChainStatus::CacheHit => "=",
        ChainStatus::Computed => "+",
        ChainStatus::Degraded => "~",
        ChainStatus::Failed => "x",
    }
}

#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
    tally: Arc<Mutex<ChainTally>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::new(0)
            .with_style(Self::spinner_style())
            .with_message("Initializing...");
        pb.set_draw_target(target);
        pb.disable_steady_tick();
        pb.finish_and_clear();

        Self {
            pb: Arc::new(Mutex::new(pb)),
            tally: Arc::new(Mutex::new(ChainTally::default())),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb_clone = self.pb.clone();
        let tally_clone = self.tally.clone();

        Box::new(move |progress: Progress| {
            let (Ok(mut pb_guard), Ok(mut tally)) = (pb_clone.lock(), tally_clone.lock()) else {
                warn!("Progress mutex was poisoned. Cannot update progress.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    pb_guard.reset();
                    pb_guard.set_length(0);
                    pb_guard.set_style(Self::spinner_style());
                    pb_guard.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                    pb_guard.set_message(name.to_string());
                }
                Progress::PhaseFinish => {
                    pb_guard.disable_steady_tick();
                    if tally.is_empty() {
                        pb_guard.finish_with_message("✓ Done");
                    } else {
                        pb_guard.finish_with_message(format!("✓ Done: {}", *tally));
                    }
                }
                Progress::TaskStart { total_steps } => {
                    pb_guard.disable_steady_tick();
                    pb_guard.reset();
                    pb_guard.set_length(total_steps);
                    pb_guard.set_position(0);
                    pb_guard.set_style(Self::bar_style());
                    *tally = ChainTally::default();
                }
                Progress::TaskIncrement => {
                    pb_guard.inc(1);
                }
                Progress::TaskFinish => {
                    if pb_guard.position() < pb_guard.length().unwrap_or(0) {
                        pb_guard.set_position(pb_guard.length().unwrap_or(0));
                    }
                    pb_guard.finish();
                }
                Progress::ChainResolved { chain_id, status } => {
                    tally.record(status);
                    pb_guard.println(format!("  {} chain {chain_id:<3} {status}", status_marker(status)));
                    pb_guard.set_message(tally.to_string());
                }
                Progress::Message(msg) => {
                    if !pb_guard.is_finished() {
                        pb_guard.println(format!("  {}", msg));
                    } else {
                        pb_guard.set_message(msg);
                    }
                }
            }
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
