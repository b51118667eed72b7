//! Classifier and its persisted form

pub mod logistic;
pub mod store;

pub use logistic::{LogisticRegression, ModelState};
pub use store::{ArtifactStore, ModelBundle};
