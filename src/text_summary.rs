//! Text summary builder for CLI output.

use crate::model::Phase;
use crate::wizard::{Wizard, WizardKind};
use anyhow::{Context, Result};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary of the wizard's final state.
pub(crate) fn build_text_summary<K: WizardKind>(wizard: &Wizard<K>) -> Result<TextSummary> {
    let mut lines = vec![format!(
        "Wizard: {} (step {}/{}, {})",
        wizard.kind().name(),
        wizard.step_index() + 1,
        wizard.kind().steps().len(),
        wizard.phase().as_str()
    )];

    if let Some(err) = wizard.task().error.as_deref() {
        lines.push(format!("Error: {err}"));
    }

    match wizard.phase() {
        Phase::Reviewing => {
            let result = wizard
                .result()
                .context("reviewing wizard has no result")?;
            lines.extend(wizard.kind().summarize(result));
        }
        _ => {
            // A result from an earlier attempt is still shown after a failure.
            if let Some(result) = wizard.result() {
                lines.push("Last result:".to_string());
                lines.extend(wizard.kind().summarize(result));
            }
        }
    }

    Ok(TextSummary { lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::bnpl::{Bnpl, CreditEngine, AMOUNT, TENOR_MONTHS};

    #[tokio::test]
    async fn reviewed_summary_lists_the_plan() {
        let mut wizard = Wizard::new(Bnpl);
        wizard.set_field(AMOUNT, 1_200_000);
        wizard.set_field(TENOR_MONTHS, 3);
        wizard.advance().unwrap();
        wizard.run(&CreditEngine, None).await.unwrap();

        let summary = build_text_summary(&wizard).unwrap();
        assert_eq!(summary.lines[0], "Wizard: bnpl (step 2/2, reviewing)");
        assert!(summary.lines.len() > 1);
    }

    #[test]
    fn editing_summary_has_only_the_header() {
        let wizard = Wizard::new(Bnpl);
        let summary = build_text_summary(&wizard).unwrap();
        assert_eq!(summary.lines, vec!["Wizard: bnpl (step 1/2, editing)"]);
    }
}
