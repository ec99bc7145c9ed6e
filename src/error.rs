//! Error types for workshopd.

use thiserror::Error;

use crate::model::{Status, WorkshopId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("workshop {id} is {status}, registration is closed")]
    InvalidState { id: WorkshopId, status: Status },

    #[error("workshop {0} is full")]
    Full(WorkshopId),

    #[error("user {user_id} is already registered for workshop {workshop_id}")]
    Duplicate {
        workshop_id: WorkshopId,
        user_id: String,
    },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("{0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
