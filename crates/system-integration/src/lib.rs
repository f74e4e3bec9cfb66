//! Session layer for beamplot
//!
//! Ties message dispatch, per-plot state and baton control together for one
//! client connection.

pub mod baton;
pub mod dispatch;
pub mod event_loop;
pub mod session;

use beamplot_shared::PlotError;
use thiserror::Error;

pub use baton::{BatonArbiter, BatonPhase, BatonState};
pub use dispatch::{decode_envelope, Route};
pub use event_loop::{LocalAction, SessionEvent, SessionEventLoop, SessionHandle};
pub use session::{PlotSession, SessionStats};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Plot error: {0}")]
    Plot(#[from] PlotError),

    #[error("Session channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
