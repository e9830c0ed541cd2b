pub mod executor;
pub mod parser;

pub use executor::{run_pipeline, validate_pipeline_file};
