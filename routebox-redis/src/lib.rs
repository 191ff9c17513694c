#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod error;
pub mod store;

#[doc(inline)]
pub use crate::error::Error;
#[doc(inline)]
pub use crate::store::{RedisStore, RedisStoreBuilder};
