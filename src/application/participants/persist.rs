use crate::domain::context::{Context, PipelineState, ResponseCode};
use crate::domain::participant::{Outcome, Participant};
use crate::domain::transaction::TransactionRecord;
use crate::error::IsoError;
use crate::infrastructure::pool::JournalPool;
use async_trait::async_trait;
use rand::Rng;
use tracing::{error, info};

pub const DATABASE_FAILURE: &str = "Database failure";

/// Six digit, zero padded authorization code.
pub fn generate_approval_code() -> String {
    let number: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{number:06}")
}

/// Writes one journal row per request and issues the approval code.
pub struct PersistTransaction {
    pool: JournalPool,
}

impl PersistTransaction {
    pub fn new(pool: JournalPool) -> Self {
        Self { pool }
    }

    async fn store(&self, id: u64, ctx: &Context) -> Result<TransactionRecord, IsoError> {
        let record = TransactionRecord::from_request(id, ctx.request())?;
        let connection = self.pool.acquire().await?;
        connection.insert(&record).await?;
        Ok(record)
    }
}

#[async_trait]
impl Participant for PersistTransaction {
    fn name(&self) -> &'static str {
        "persist"
    }

    async fn prepare(&self, id: u64, ctx: &mut Context) -> Outcome {
        match self.store(id, ctx).await {
            Ok(record) => {
                ctx.set_approval_code(generate_approval_code());
                ctx.set_response_code_if_absent(ResponseCode::Approved);
                ctx.advance(PipelineState::Persisted);
                info!(id, stan = %record.stan, "persisted transaction");
                Outcome::prepared().no_join()
            }
            Err(e) => {
                error!(id, error = %e, "failed to persist transaction");
                ctx.reject(ResponseCode::SystemMalfunction, DATABASE_FAILURE);
                Outcome::aborted().no_join()
            }
        }
    }
}
