pub mod model_catalog;
pub mod runner;
