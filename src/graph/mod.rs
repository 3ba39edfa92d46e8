//! Flattening of a group tree and dependency resolution.

mod flatten;
mod resolve;

pub(crate) use flatten::{flatten, Model};
pub(crate) use resolve::resolve;
pub use resolve::Schedule;
