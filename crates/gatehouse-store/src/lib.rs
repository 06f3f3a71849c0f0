pub mod baseline;
pub mod markdown;
pub mod migrate;
pub mod store;

pub use baseline::*;
pub use markdown::*;
pub use migrate::*;
pub use store::*;
