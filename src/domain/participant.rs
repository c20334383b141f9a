use super::context::Context;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Prepared,
    Aborted,
}

/// Result of a participant's `prepare` phase.
///
/// `no_join` keeps the participant out of the commit/abort callbacks; `read_only` marks a
/// stage without durable side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: Verdict,
    pub no_join: bool,
    pub read_only: bool,
}

impl Outcome {
    pub fn prepared() -> Self {
        Self {
            verdict: Verdict::Prepared,
            no_join: false,
            read_only: false,
        }
    }

    pub fn aborted() -> Self {
        Self {
            verdict: Verdict::Aborted,
            no_join: false,
            read_only: false,
        }
    }

    pub fn no_join(mut self) -> Self {
        self.no_join = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn is_aborted(&self) -> bool {
        self.verdict == Verdict::Aborted
    }

    pub fn joins(&self) -> bool {
        !self.no_join
    }
}

/// One stage of the server pipeline.
#[async_trait]
pub trait Participant: Send + Sync {
    fn name(&self) -> &'static str;

    async fn prepare(&self, id: u64, ctx: &mut Context) -> Outcome;

    async fn commit(&self, _id: u64, _ctx: &mut Context) {}

    async fn abort(&self, _id: u64, _ctx: &mut Context) {}

    /// Finalizers receive `commit`/`abort` even when skipped or not joined.
    fn is_finalizer(&self) -> bool {
        false
    }
}

pub type ParticipantBox = Box<dyn Participant>;
