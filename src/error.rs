use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A ring buffer needs room for at least one element.
    #[error("ring buffer capacity must be greater than zero")]
    ZeroCapacity,
    #[error("no value arrived within {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = ::std::result::Result<T, Error>;
