//! # taskboard
//!
//! Companies contain projects, projects contain tasks, and tasks are booked
//! to assignees over deadline windows. Every write that changes who is booked
//! when goes through [`conflict::check_conflict`], which refuses to
//! double-book an assignee and, when enabled, keeps tasks inside their
//! project's date range.

pub mod commands;
pub mod config;
pub mod conflict;
pub mod models;
pub mod storage;

use chrono::NaiveDateTime;

/// Library-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("\"to\" ({to}) cannot be before \"from\" ({from})")]
    InvalidWindow { from: NaiveDateTime, to: NaiveDateTime },

    #[error(transparent)]
    Conflict(#[from] conflict::Conflict),
}

pub type Result<T> = std::result::Result<T, Error>;
