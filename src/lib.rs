pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod global;
pub mod meeting;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod signals;
pub mod store;
pub mod summarizer;
