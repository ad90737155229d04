use thiserror::Error;

/// Failure vocabulary for the session core.
///
/// Segmentation and extraction problems degrade to reduced output, transport
/// problems are handled by the health supervisor, and index problems are
/// rejected without touching state. None of these abort the process.
#[derive(Debug, Error)]
pub enum Error {
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("transport is not ready")]
    TransportUnhealthy,

    #[error("scene index {index} out of range (total {total})")]
    InvalidIndex { index: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
