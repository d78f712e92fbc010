pub mod db;
pub mod schema;
pub mod write;

pub use db::{Store, StoreStatus};
