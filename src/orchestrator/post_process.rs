//! Post-review processing.
//!
//! Builds the record handed to the persistence collaborator. Only reviewed
//! results are saved, and never from inside the task runner.

use crate::collaborator::Persistence;
use crate::error::{WizardError, WizardResult};
use crate::model::{Phase, SavedResult};
use crate::wizard::{Wizard, WizardKind};
use anyhow::{Context, Result};
use rand::RngCore;

/// Random identifier for a saved result.
fn gen_result_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    format!("{:016x}", u64::from_le_bytes(b))
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Snapshot the reviewed result of `wizard` as a saveable record.
pub(crate) fn reviewed_record<K: WizardKind>(wizard: &Wizard<K>) -> WizardResult<SavedResult> {
    if wizard.phase() != Phase::Reviewing {
        return Err(WizardError::NotReviewing);
    }
    let result = wizard.result().ok_or(WizardError::NotReviewing)?;
    let submitted = wizard.result_draft().ok_or(WizardError::NotReviewing)?;
    Ok(SavedResult {
        id: gen_result_id(),
        wizard: wizard.kind().name().to_string(),
        saved_at_utc: now_rfc3339(),
        draft: submitted.to_value(),
        result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
    })
}

pub(crate) async fn persist(
    persistence: &dyn Persistence,
    record: SavedResult,
) -> Result<SavedResult> {
    persistence
        .save(&record)
        .await
        .with_context(|| format!("save {} result", record.wizard))?;
    Ok(record)
}
