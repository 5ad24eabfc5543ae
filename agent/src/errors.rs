//! Command error taxonomy.
//!
//! Every variant of [`CommandError`] is surfaced verbatim to the invoking
//! user as a warning-colored reply. [`HandlerError`] is what command
//! handlers return; the interaction runner is the single point where it is
//! caught and mapped to a user-visible message (or, for protocol errors,
//! to a log entry only).

use thiserror::Error;

use crate::http::ApiError;

/// A recognized domain failure inside a command handler.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Insufficient permissions to perform the bot operation.
    #[error("{0}")]
    Permission(String),

    /// Incorrect command argument syntax.
    #[error("{0}")]
    Syntax(String),

    /// Improper value provided for a specific command argument.
    #[error("{0}")]
    Value(String),

    /// A bot object is not found (member, channel, entry, ...).
    #[error("{0}")]
    NotFound(String),

    /// The command was invoked outside its required scope.
    #[error("{0}")]
    MissingScope(String),

    /// The command is not implemented inside this scope.
    #[error("{0}")]
    NotImplemented(String),
}

/// Anything a command or autocomplete handler can fail with.
///
/// `Api` covers both a remote permission rejection (mapped to a fixed
/// generic reply) and a broken response channel (logged only). `Unexpected`
/// is everything else and reaches the user as a generic runtime error.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}
