pub mod simulate;
pub mod snapshot;
pub mod view;
