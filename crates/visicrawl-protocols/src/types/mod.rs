//! Common types shared by the VisiCrawl crates.

mod action;
mod geometry;
mod screen;
mod screenshot;
mod session;

pub use action::*;
pub use geometry::*;
pub use screen::*;
pub use screenshot::*;
pub use session::*;

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
