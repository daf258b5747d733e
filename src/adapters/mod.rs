//! Adapters layer: Concrete implementations of ports.
//!
//! - `logistic`: signed logistic-regression artifact implementing `SeverityModel`
//! - `knowledge_base`: JSON diet knowledge base implementing `DietKnowledge`
//! - `sanitize`: PII filtering for logs

pub mod knowledge_base;
pub mod logistic;
pub mod sanitize;
