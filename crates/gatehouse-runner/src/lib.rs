pub mod config;
pub mod doctor;
pub mod pipeline;
pub mod release;
pub mod runner;
pub mod util;

pub use config::*;
pub use doctor::*;
pub use pipeline::*;
pub use runner::*;
pub use util::*;
