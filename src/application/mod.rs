//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the screening and diet use cases.

mod diet;
mod screening;

pub use diet::DietService;
pub use screening::{ScreeningService, QUICK_SCREEN_CONFIDENCE_FACTOR};
