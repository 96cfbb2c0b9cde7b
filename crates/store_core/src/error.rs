//! Error taxonomy for session startup and snapshot transport.
//!
//! Startup errors ([ConfigError], [TopologyError]) abort before an engine is
//! constructed. [SinkError] is reported by snapshot sinks and handled as an
//! implicit stop by the session loop. Everything else in the simulation
//! (blocked moves, unreachable targets) is recovered locally by agents and
//! never surfaces as an error.

use thiserror::Error;

/// Invalid session configuration. No engine is constructed when one of
/// these is raised.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("patience must be within [0, 1], got {0}")]
    PatienceOutOfRange(f64),
    #[error("hour must be within 0..=23, got {0}")]
    HourOutOfRange(u8),
    #[error("grid must be at least 4x4, got {rows}x{cols}")]
    GridTooSmall { rows: usize, cols: usize },
    #[error("max_ticks must be positive")]
    ZeroMaxTicks,
    #[error("tick_delay must be non-negative, got {0}")]
    NegativeTickDelay(f64),
}

/// Invalid store map. Raised while the grid is being constructed.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("unknown map symbol '{0}'")]
    UnknownSymbol(char),
    #[error("map has no entrance cell")]
    NoEntrance,
    #[error("map has no rows")]
    EmptyMap,
    #[error("failed to read map input")]
    Read(#[from] std::io::Error),
    #[error("invalid symbol table")]
    SymbolTable(#[from] serde_json::Error),
}

/// Either startup failure. Returned by [crate::session::Session::new].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Snapshot emission failed. The session treats this as a stop command,
/// not as a user-facing error.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("snapshot transport failed")]
    Io(#[from] std::io::Error),
    #[error("snapshot receiver closed")]
    Closed,
}
