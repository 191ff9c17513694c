//! Error types for Redis store operations.
//!
//! All errors convert to [`StoreError`] for uniform handling across stores.
//! Connection level failures (refused, dropped, timed out) become
//! [`StoreError::ConnectionError`], everything else
//! [`StoreError::InternalError`].
//!
//! [`StoreError`]: routebox_core::StoreError
//! [`StoreError::ConnectionError`]: routebox_core::StoreError::ConnectionError
//! [`StoreError::InternalError`]: routebox_core::StoreError::InternalError

use std::time::Duration;

use redis::RedisError;
use routebox_core::StoreError;

/// Error type for Redis store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis store error: {0}")]
    Redis(#[from] RedisError),

    /// The operation did not complete within the configured bound.
    #[error("Redis operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    fn is_connection(&self) -> bool {
        match self {
            Error::Redis(error) => {
                error.is_io_error()
                    || error.is_connection_refusal()
                    || error.is_connection_dropped()
                    || error.is_timeout()
            }
            Error::Timeout(_) => true,
        }
    }
}

impl From<Error> for StoreError {
    fn from(error: Error) -> Self {
        if error.is_connection() {
            Self::ConnectionError(Box::new(error))
        } else {
            Self::InternalError(Box::new(error))
        }
    }
}
