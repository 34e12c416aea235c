mod query;
mod schema;
mod writer;

pub use query::{StatsStore, StoreSummary};
pub use writer::{NodeSample, StatsWriter};
