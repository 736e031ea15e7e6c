pub mod detection;
pub mod errors;
pub mod model;
pub mod postprocess;
pub mod run_dir;
pub mod summary;
