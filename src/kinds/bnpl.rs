//! Buy-now-pay-later application: choose amount and tenor, then compute installments.
//!
//! All money is whole rupiah. Rates are flat over the whole tenor and handled
//! in basis points so the arithmetic stays in integers.

use crate::collaborator::Generator;
use crate::wizard::{Draft, WizardKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const AMOUNT: &str = "amount";
pub const TENOR_MONTHS: &str = "tenor_months";
pub const RATE_PERCENT: &str = "rate_percent";

pub const SUPPORTED_TENORS: &[u32] = &[3, 6, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BnplStep {
    ChoosePlan,
    Review,
}

const STEPS: &[BnplStep] = &[BnplStep::ChoosePlan, BnplStep::Review];

/// Flat rate for a tenor when the draft does not carry one.
pub fn default_rate_bp(tenor_months: u32) -> Option<u32> {
    match tenor_months {
        3 => Some(0),
        6 => Some(250),
        12 => Some(500),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanRequest {
    pub amount: u64,
    pub tenor_months: u32,
    pub rate_bp: u32,
}

/// Read a complete, valid plan request out of the draft.
pub fn plan_request(draft: &Draft) -> Option<PlanRequest> {
    let amount: u64 = draft.parse(AMOUNT)?;
    let tenor_months: u32 = draft.parse(TENOR_MONTHS)?;
    if amount == 0 || !SUPPORTED_TENORS.contains(&tenor_months) {
        return None;
    }
    let rate_bp = match draft.parse::<f64>(RATE_PERCENT) {
        Some(pct) if pct.is_finite() && pct >= 0.0 => (pct * 100.0).round() as u32,
        Some(_) => return None,
        None => default_rate_bp(tenor_months)?,
    };
    total_repayable(amount, rate_bp)?;
    Some(PlanRequest {
        amount,
        tenor_months,
        rate_bp,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlan {
    pub monthly_payment: u64,
    pub total_amount: u64,
    pub schedule: Vec<u64>,
}

fn div_round_half_up(n: u128, d: u128) -> u128 {
    (n + d / 2) / d
}

/// Amount plus flat interest, rounded half-up. `None` when it does not fit in a `u64`.
pub fn total_repayable(amount: u64, rate_bp: u32) -> Option<u64> {
    let total = div_round_half_up(
        u128::from(amount) * (10_000 + u128::from(rate_bp)),
        10_000,
    );
    u64::try_from(total).ok()
}

/// Installments for a flat-rate plan; the last one absorbs rounding so the
/// schedule always sums to the total.
pub fn installment_plan(req: PlanRequest) -> Option<InstallmentPlan> {
    let total_amount = total_repayable(req.amount, req.rate_bp)?;
    let total = u128::from(total_amount);
    let tenor = u128::from(req.tenor_months.max(1));
    let mut monthly = div_round_half_up(total, tenor);
    // Rounding up on tiny totals would overshoot before the last month.
    if monthly * (tenor - 1) > total {
        monthly = total / tenor;
    }
    let last = total - monthly * (tenor - 1);

    let monthly_payment = u64::try_from(monthly).ok()?;
    let mut schedule = vec![monthly_payment; (tenor - 1) as usize];
    schedule.push(u64::try_from(last).ok()?);

    Some(InstallmentPlan {
        monthly_payment,
        total_amount,
        schedule,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BnplApplication {
    pub amount: u64,
    pub tenor_months: u32,
    pub rate_percent: f64,
    pub monthly_payment: u64,
    pub total_amount: u64,
    pub schedule: Vec<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Bnpl;

impl WizardKind for Bnpl {
    type Step = BnplStep;
    type Generated = InstallmentPlan;
    type Output = BnplApplication;

    fn name(&self) -> &'static str {
        "bnpl"
    }

    fn steps(&self) -> &'static [BnplStep] {
        STEPS
    }

    fn can_advance(&self, step: BnplStep, draft: &Draft) -> bool {
        match step {
            BnplStep::ChoosePlan | BnplStep::Review => plan_request(draft).is_some(),
        }
    }

    fn commit(&self, draft: &Draft, plan: InstallmentPlan) -> BnplApplication {
        let req = plan_request(draft);
        BnplApplication {
            amount: req.map(|r| r.amount).unwrap_or_default(),
            tenor_months: req
                .map(|r| r.tenor_months)
                .unwrap_or(plan.schedule.len() as u32),
            rate_percent: req.map(|r| f64::from(r.rate_bp) / 100.0).unwrap_or_default(),
            monthly_payment: plan.monthly_payment,
            total_amount: plan.total_amount,
            schedule: plan.schedule,
        }
    }

    fn summarize(&self, app: &BnplApplication) -> Vec<String> {
        vec![
            format!(
                "Amount: Rp {} over {} months at {:.2}%",
                app.amount, app.tenor_months, app.rate_percent
            ),
            format!("Monthly payment: Rp {}", app.monthly_payment),
            format!("Total repayable: Rp {}", app.total_amount),
        ]
    }
}

/// Built-in credit engine computing the plan locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreditEngine;

#[async_trait]
impl Generator<InstallmentPlan> for CreditEngine {
    async fn generate(&self, draft: &Draft) -> Result<InstallmentPlan> {
        let req = plan_request(draft).context("amount and a supported tenor are required")?;
        installment_plan(req).context("amount is too large to finance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn six_month_plan_at_two_and_a_half_percent() {
        let plan = installment_plan(PlanRequest {
            amount: 5_000_000,
            tenor_months: 6,
            rate_bp: 250,
        })
        .unwrap();
        assert_eq!(plan.total_amount, 5_125_000);
        assert_eq!(plan.monthly_payment, 854_167);
        assert_eq!(plan.schedule.len(), 6);
        assert_eq!(plan.schedule.iter().sum::<u64>(), 5_125_000);
    }

    #[test]
    fn zero_rate_splits_evenly() {
        let plan = installment_plan(PlanRequest {
            amount: 900_000,
            tenor_months: 3,
            rate_bp: 0,
        })
        .unwrap();
        assert_eq!(plan.schedule, vec![300_000, 300_000, 300_000]);
    }

    #[test]
    fn tiny_totals_still_sum_to_the_total() {
        let plan = installment_plan(PlanRequest {
            amount: 4,
            tenor_months: 6,
            rate_bp: 0,
        })
        .unwrap();
        assert_eq!(plan.schedule.len(), 6);
        assert_eq!(plan.schedule.iter().sum::<u64>(), 4);
    }

    #[test]
    fn totals_beyond_u64_are_refused() {
        let req = PlanRequest {
            amount: u64::MAX,
            tenor_months: 12,
            rate_bp: 500,
        };
        assert_eq!(installment_plan(req), None);

        let draft = Draft::new()
            .with_field(AMOUNT, json!(u64::MAX))
            .with_field(TENOR_MONTHS, json!(12));
        assert_eq!(plan_request(&draft), None);
        assert!(!Bnpl.can_advance(BnplStep::ChoosePlan, &draft));

        // Zero interest keeps the amount representable.
        let draft = draft.with_field(TENOR_MONTHS, json!(3));
        let plan = installment_plan(plan_request(&draft).unwrap()).unwrap();
        assert_eq!(plan.total_amount, u64::MAX);
        let paid: u128 = plan.schedule.iter().map(|&p| u128::from(p)).sum();
        assert_eq!(paid, u128::from(u64::MAX));
    }

    #[test]
    fn gate_requires_amount_and_supported_tenor() {
        let kind = Bnpl;
        let draft = Draft::new().with_field(AMOUNT, json!(5_000_000));
        assert!(!kind.can_advance(BnplStep::ChoosePlan, &draft));
        let draft = draft.with_field(TENOR_MONTHS, json!(7));
        assert!(!kind.can_advance(BnplStep::ChoosePlan, &draft));
        let draft = draft.with_field(TENOR_MONTHS, json!(6));
        assert!(kind.can_advance(BnplStep::ChoosePlan, &draft));
        let draft = draft.with_field(RATE_PERCENT, json!(-1.0));
        assert!(!kind.can_advance(BnplStep::ChoosePlan, &draft));
    }

    #[test]
    fn explicit_rate_overrides_tenor_default() {
        let draft = Draft::new()
            .with_field(AMOUNT, json!(1_000_000))
            .with_field(TENOR_MONTHS, json!(12))
            .with_field(RATE_PERCENT, json!(1.5));
        assert_eq!(plan_request(&draft).map(|r| r.rate_bp), Some(150));
    }
}
