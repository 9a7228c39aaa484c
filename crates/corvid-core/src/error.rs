//! Error types for position construction and move parsing.

/// Errors produced while building a [`Position`](crate::Position) or parsing moves against it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The FEN string was rejected by the board parser.
    #[error("invalid FEN: \"{fen}\"")]
    InvalidFen {
        /// The FEN string that failed to parse.
        fen: String,
    },

    /// The halfmove clock field of a FEN is not a number.
    #[error("invalid halfmove clock: \"{found}\"")]
    InvalidHalfmoveClock {
        /// The offending field.
        found: String,
    },

    /// A move string is not in UCI long algebraic form (`e2e4`, `e7e8q`).
    #[error("malformed move: \"{text}\"")]
    MalformedMove {
        /// The move string that failed to parse.
        text: String,
    },

    /// A well-formed move is not legal in the given position.
    #[error("illegal move {text} in {fen}")]
    IllegalMove {
        /// The move string.
        text: String,
        /// FEN of the position the move was applied to.
        fen: String,
    },
}
