//! Error types for the VisiCrawl protocol layer.

mod detection;
mod device;
mod hook;
mod provider;
mod repository;

pub use detection::*;
pub use device::*;
pub use hook::*;
pub use provider::*;
pub use repository::*;
