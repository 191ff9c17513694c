#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod builder;
mod store;

pub use builder::MokaStoreBuilder;
pub use store::MokaStore;
