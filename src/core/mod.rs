pub mod dispenser;
pub mod inventory;
pub mod policy;

pub use crate::domain::model::{parse_records, render_records, Record, ServiceName};
pub use crate::domain::ports::Storage;
pub use crate::utils::error::Result;
