use super::participants::{BuildResponse, PersistTransaction, ValidateMessage};
use crate::domain::context::Context;
use crate::domain::message::IsoMessage;
use crate::domain::participant::{Participant, ParticipantBox};
use crate::infrastructure::pool::JournalPool;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Committed,
    Aborted,
}

/// Drives an ordered list of participants through prepare and commit/abort.
///
/// Prepare runs in order and stops at the first abort. Afterwards every prepared participant
/// that joined, plus every finalizer, gets `commit` (nothing aborted) or `abort`.
pub struct TransactionManager {
    participants: Vec<ParticipantBox>,
    next_id: AtomicU64,
}

impl TransactionManager {
    pub fn new(participants: Vec<ParticipantBox>) -> Self {
        Self {
            participants,
            next_id: AtomicU64::new(1),
        }
    }

    /// Validate, persist, build response.
    pub fn authorization(pool: JournalPool) -> Self {
        Self::new(vec![
            Box::new(ValidateMessage),
            Box::new(PersistTransaction::new(pool)),
            Box::new(BuildResponse),
        ])
    }

    /// Runs `request` through the pipeline in a fresh context.
    pub async fn process(&self, request: IsoMessage) -> (TransactionStatus, Context) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut ctx = Context::new(id, request);
        let status = self.run(&mut ctx).await;
        (status, ctx)
    }

    pub async fn run(&self, ctx: &mut Context) -> TransactionStatus {
        let id = ctx.id();
        let mut aborted = false;
        let mut members: Vec<&dyn Participant> = Vec::with_capacity(self.participants.len());

        for participant in &self.participants {
            if aborted {
                if participant.is_finalizer() {
                    members.push(participant.as_ref());
                }
                continue;
            }
            let outcome = participant.prepare(id, ctx).await;
            debug!(id, participant = participant.name(), ?outcome, "prepared");
            if outcome.joins() || participant.is_finalizer() {
                members.push(participant.as_ref());
            }
            aborted = outcome.is_aborted();
        }

        for participant in members {
            if aborted {
                participant.abort(id, ctx).await;
            } else {
                participant.commit(id, ctx).await;
            }
        }

        if aborted {
            TransactionStatus::Aborted
        } else {
            TransactionStatus::Committed
        }
    }
}
