//! The concrete wizards and their built-in generators.

pub mod bnpl;
pub mod island_hopper;
pub mod itinerary;
pub mod movie_maker;

pub use bnpl::{Bnpl, CreditEngine};
pub use island_hopper::{IslandHopper, RouteOptimizer};
pub use itinerary::{ItineraryPlanner, ItineraryWizard};
pub use movie_maker::{MovieMaker, MovieRenderer};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WizardType {
    IslandHopper,
    Bnpl,
    MovieMaker,
    Itinerary,
}
