pub mod etl;
pub mod query;
pub mod table;

pub use crate::domain::model::{Record, RunSummary};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
