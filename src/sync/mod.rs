pub mod apply;
pub mod config;
pub mod equivalence;
pub mod reconcile;
pub mod summary;
