// Core modules
pub mod ai;
pub mod cli;
pub mod config;

// Review pipeline
pub mod infrastructure;
pub mod report;
pub mod review;
