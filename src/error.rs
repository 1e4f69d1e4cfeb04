use thiserror::Error;

/// Errors of the host adapters and the fleet.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Board(#[from] mark_core::Error),

    /// Fleet index outside `1..=count`.
    #[error("mark {0} not found")]
    BoardNotFound(usize),

    /// A discovered board could not be brought up.
    #[error("error loading board {target}")]
    Load {
        target: String,
        #[source]
        source: mark_core::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
