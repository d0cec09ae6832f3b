pub mod model;
pub mod query;
pub mod storage;

pub use storage::TaskStore;
