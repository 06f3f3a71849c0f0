pub mod archive;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pack;
pub mod provenance;
pub mod select;

pub use config::*;
pub use error::*;
pub use manifest::*;
pub use pack::*;
pub use provenance::*;
pub use select::*;
