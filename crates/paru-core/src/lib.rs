pub mod config;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;
pub mod util;
