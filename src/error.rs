//! Error kinds for the protocol/config layer. Nothing here crosses the search boundary: search
//! routines signal abort through the shared stop flag, never a `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed command: {0}")]
    ProtocolParse(String),

    #[error("illegal position or move in input: {0}")]
    IllegalInput(String),

    #[error("could not allocate requested resource, falling back: {0}")]
    ResourceExhausted(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
