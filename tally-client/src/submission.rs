//! Create-expense submission with a per-attempt idempotency key.

use tally_core::{DraftExpense, ExpenseRecord};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SubmitError;
use crate::gateway::ExpenseApi;

/// A write the server accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub idempotency_key: String,
    pub record: Option<ExpenseRecord>,
}

pub struct SubmissionHandler;

impl SubmissionHandler {
    /// Fresh random (v4) key; one per submission attempt.
    pub fn idempotency_key() -> String {
        Uuid::new_v4().to_string()
    }

    /// Validate `draft`, send it, and on success clear its description and
    /// amount. On any failure the draft is left exactly as it was.
    pub async fn submit<A: ExpenseApi + ?Sized>(
        api: &A,
        draft: &mut DraftExpense,
    ) -> Result<Submitted, SubmitError> {
        let body = draft.to_request()?;
        let key = Self::idempotency_key();

        match api.create_expense(&body, &key).await {
            Ok(record) => {
                info!(idempotency_key = %key, amount = %body.amount, "expense created");
                draft.clear_entry();
                Ok(Submitted {
                    idempotency_key: key,
                    record,
                })
            }
            Err(e) => {
                warn!(idempotency_key = %key, error = %e, "failed to create expense");
                Err(SubmitError::Failed(e.to_string()))
            }
        }
    }
}
