pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod proxy;
pub mod state;
pub mod utils;
pub mod web;
