pub mod appointment;
pub mod entry;
pub mod enums;

pub use appointment::*;
pub use entry::*;
pub use enums::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },
}
