//! Destination itinerary: preferences in, day-by-day plan out.

use crate::collaborator::Generator;
use crate::wizard::{Draft, WizardKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const DESTINATION: &str = "destination";
pub const DAYS: &str = "days";
pub const INTERESTS: &str = "interests";

pub const DAY_RANGE: RangeInclusive<u32> = 1..=14;
const SLOTS_PER_DAY: usize = 2;
const FALLBACK_INTERESTS: &[&str] = &["local food", "old town walk", "sunset viewpoint"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItineraryStep {
    Preferences,
    Generate,
}

const STEPS: &[ItineraryStep] = &[ItineraryStep::Preferences, ItineraryStep::Generate];

fn destination(draft: &Draft) -> Option<&str> {
    draft.text(DESTINATION).map(str::trim).filter(|d| !d.is_empty())
}

fn days(draft: &Draft) -> Option<u32> {
    draft.parse::<u32>(DAYS).filter(|d| DAY_RANGE.contains(d))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day: u32,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub destination: String,
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ItineraryWizard;

impl WizardKind for ItineraryWizard {
    type Step = ItineraryStep;
    type Generated = Vec<DayPlan>;
    type Output = Itinerary;

    fn name(&self) -> &'static str {
        "itinerary"
    }

    fn steps(&self) -> &'static [ItineraryStep] {
        STEPS
    }

    fn can_advance(&self, step: ItineraryStep, draft: &Draft) -> bool {
        match step {
            ItineraryStep::Preferences | ItineraryStep::Generate => {
                destination(draft).is_some() && days(draft).is_some()
            }
        }
    }

    fn initial_draft(&self) -> Draft {
        Draft::new()
            .with_field(DAYS, 3)
            .with_field(INTERESTS, serde_json::json!([]))
    }

    fn commit(&self, draft: &Draft, days: Vec<DayPlan>) -> Itinerary {
        Itinerary {
            destination: destination(draft).unwrap_or_default().to_string(),
            days,
        }
    }

    fn summarize(&self, it: &Itinerary) -> Vec<String> {
        let mut lines = vec![format!("Itinerary: {} ({} days)", it.destination, it.days.len())];
        for d in &it.days {
            lines.push(format!("  Day {}: {}", d.day, d.activities.join(", ")));
        }
        lines
    }
}

/// Built-in planner: spreads interests over the days, two slots a day.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItineraryPlanner;

#[async_trait]
impl Generator<Vec<DayPlan>> for ItineraryPlanner {
    async fn generate(&self, draft: &Draft) -> Result<Vec<DayPlan>> {
        destination(draft).context("destination is required")?;
        let total_days = days(draft).context("days must be between 1 and 14")?;
        let mut interests: Vec<String> = draft
            .text_list(INTERESTS)
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if interests.is_empty() {
            interests = FALLBACK_INTERESTS.iter().map(|s| s.to_string()).collect();
        }

        let plans = (0..total_days as usize)
            .map(|day| {
                let mut activities: Vec<String> = Vec::with_capacity(SLOTS_PER_DAY);
                for slot in 0..SLOTS_PER_DAY {
                    let pick = &interests[(day * SLOTS_PER_DAY + slot) % interests.len()];
                    if !activities.contains(pick) {
                        activities.push(pick.clone());
                    }
                }
                DayPlan {
                    day: day as u32 + 1,
                    activities,
                }
            })
            .collect();
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gate_needs_destination_and_day_count_in_range() {
        let kind = ItineraryWizard;
        let draft = kind.initial_draft();
        assert!(!kind.can_advance(ItineraryStep::Preferences, &draft));
        let draft = draft.with_field(DESTINATION, "Yogyakarta");
        assert!(kind.can_advance(ItineraryStep::Preferences, &draft));
        let draft = draft.with_field(DAYS, 15);
        assert!(!kind.can_advance(ItineraryStep::Preferences, &draft));
    }

    #[tokio::test]
    async fn interests_rotate_across_days() {
        let draft = ItineraryWizard
            .initial_draft()
            .with_field(DESTINATION, "Yogyakarta")
            .with_field(DAYS, 2)
            .with_field(INTERESTS, json!(["Borobudur", "Malioboro", "Prambanan"]));
        let days = ItineraryPlanner.generate(&draft).await.unwrap();
        assert_eq!(
            days,
            vec![
                DayPlan {
                    day: 1,
                    activities: vec!["Borobudur".into(), "Malioboro".into()],
                },
                DayPlan {
                    day: 2,
                    activities: vec!["Prambanan".into(), "Borobudur".into()],
                },
            ]
        );
    }
}
