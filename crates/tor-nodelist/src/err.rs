//! Declare error type for tor-nodelist

use thiserror::Error;

/// An error returned by the nodelist code.
#[derive(Error, Clone, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A document lifetime was not strictly increasing.
    #[error("Invalid lifetime: times are not strictly increasing")]
    InvalidLifetime,
    /// A builder was missing a required field.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// We could not parse a string as the requested type.
    #[error("Could not parse {0}")]
    BadSyntax(&'static str),
    /// We received a consensus document that should be impossible.
    #[error("Invalid information from consensus document: {0}")]
    InvalidConsensus(&'static str),
}
