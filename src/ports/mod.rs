//! Ports layer: Trait definitions at the engine's seams.
//!
//! The statistical model and the diet knowledge base are both consumed
//! through these traits, so the services never depend on a concrete model
//! format or content store.

mod diet_knowledge;
mod severity_model;

pub use diet_knowledge::DietKnowledge;
pub use severity_model::SeverityModel;
