pub mod aggregate;
pub mod catalog;
pub mod chart;
pub mod cli;
pub mod commands;
pub mod controller;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod storage;
pub mod tui;
pub mod visibility;

pub use error::{Error, Result};
