//! Island hopper: pick islands, then generate a crossing route.

use crate::collaborator::Generator;
use crate::wizard::{Draft, WizardKind};
use anyhow::{ensure, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ISLANDS: &str = "islands";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IslandStep {
    SelectIslands,
    Generate,
}

const STEPS: &[IslandStep] = &[IslandStep::SelectIslands, IslandStep::Generate];

/// Route produced by the optimizer, in visiting order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub ordered: Vec<String>,
    pub crossing_hours: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IslandRoute {
    pub best_route: String,
    pub islands: Vec<String>,
    pub hops: usize,
    pub estimated_hours: f64,
}

/// Selected islands with blanks and repeats removed, selection order kept.
pub fn selected_islands(draft: &Draft) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in draft.text_list(ISLANDS) {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IslandHopper;

impl WizardKind for IslandHopper {
    type Step = IslandStep;
    type Generated = RoutePlan;
    type Output = IslandRoute;

    fn name(&self) -> &'static str {
        "island-hopper"
    }

    fn steps(&self) -> &'static [IslandStep] {
        STEPS
    }

    fn can_advance(&self, step: IslandStep, draft: &Draft) -> bool {
        match step {
            IslandStep::SelectIslands | IslandStep::Generate => selected_islands(draft).len() >= 2,
        }
    }

    fn initial_draft(&self) -> Draft {
        Draft::new().with_field(ISLANDS, serde_json::json!([]))
    }

    fn commit(&self, _draft: &Draft, plan: RoutePlan) -> IslandRoute {
        IslandRoute {
            best_route: plan.ordered.join(" → "),
            hops: plan.ordered.len().saturating_sub(1),
            estimated_hours: plan.crossing_hours.iter().sum(),
            islands: plan.ordered,
        }
    }

    fn summarize(&self, route: &IslandRoute) -> Vec<String> {
        vec![
            format!("Route: {}", route.best_route),
            format!(
                "Hops: {} (about {:.1} h at sea)",
                route.hops, route.estimated_hours
            ),
        ]
    }
}

/// Built-in route generator: visits islands in the order they were picked.
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    pub hours_per_crossing: f64,
}

impl Default for RouteOptimizer {
    fn default() -> Self {
        Self {
            hours_per_crossing: 3.0,
        }
    }
}

#[async_trait]
impl Generator<RoutePlan> for RouteOptimizer {
    async fn generate(&self, draft: &Draft) -> Result<RoutePlan> {
        let ordered = selected_islands(draft);
        ensure!(ordered.len() >= 2, "a route needs at least two islands");
        let crossing_hours = vec![self.hours_per_crossing; ordered.len() - 1];
        Ok(RoutePlan {
            ordered,
            crossing_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicates_and_blanks_do_not_count_toward_the_gate() {
        let kind = IslandHopper;
        let draft = Draft::new().with_field(ISLANDS, json!(["Bali", " ", "Bali"]));
        assert!(!kind.can_advance(IslandStep::SelectIslands, &draft));
        let draft = Draft::new().with_field(ISLANDS, json!(["Bali", "Gili Trawangan"]));
        assert!(kind.can_advance(IslandStep::SelectIslands, &draft));
    }

    #[tokio::test]
    async fn optimizer_keeps_selection_order() {
        let draft = Draft::new().with_field(ISLANDS, json!(["Komodo", "Rinca", "Padar"]));
        let plan = RouteOptimizer::default().generate(&draft).await.unwrap();
        let route = IslandHopper.commit(&draft, plan);
        assert_eq!(route.best_route, "Komodo → Rinca → Padar");
        assert_eq!(route.hops, 2);
        assert_eq!(route.estimated_hours, 6.0);
    }
}
