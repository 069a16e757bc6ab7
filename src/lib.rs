pub mod anneal;
pub mod bins;
pub mod config;
pub mod engine;
pub mod error;
pub mod exact;
pub mod export;
pub mod free_rects;
pub mod generate;
pub mod occupancy;
pub mod placement;
pub mod render;
pub mod solver;
pub mod types;
