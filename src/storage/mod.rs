pub mod db;
mod current;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use models::{FileDescriptor, FileRecord};
pub use tables::*;
