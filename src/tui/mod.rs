mod app;
mod ui;

pub use app::{App, PAGE_LENGTHS};
