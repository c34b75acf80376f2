pub mod client;
pub mod context;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod gate;
pub mod issues;
pub mod model;
pub mod ranges;
pub mod render;
pub mod report;
