use crate::core::models::ids::ChainId;
use std::fmt;

/// How a chain was resolved during fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    CacheHit,
    Computed,
    /// Computed without the optional paired search.
    Degraded,
    Failed,
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChainStatus::CacheHit => "cached",
            ChainStatus::Computed => "computed",
            ChainStatus::Degraded => "computed (degraded)",
            ChainStatus::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    ChainResolved { chain_id: ChainId, status: ChainStatus },

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
