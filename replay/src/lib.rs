//! Replays recorded plot server traffic through a [`PlotSession`].
//!
//! Input is newline-delimited JSON, one envelope per line. Blank lines and
//! lines starting with `#` are skipped.

use anyhow::Result;
use beamplot_data::PlotSummary;
use beamplot_session::{PlotSession, SessionEventLoop, SessionStats};
use beamplot_shared::{ClientMessage, ErrorResponse};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub summaries: Vec<PlotSummary>,
    pub outbound: Vec<ClientMessage>,
    /// Most recent rejections, oldest first
    pub rejections: Vec<ErrorResponse>,
    pub stats: SessionStats,
}

/// Feed every envelope in `input` through the session's event loop
pub async fn replay(session: PlotSession, input: &str) -> Result<ReplayReport> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let (handle, event_loop) = SessionEventLoop::channel(session, out_tx);
    let task = tokio::spawn(event_loop.run());

    let mut queued = 0usize;
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        debug!(line = index + 1, "queueing envelope");
        handle.inbound(line)?;
        queued += 1;
    }
    handle.shutdown()?;

    let mut session = task.await?;
    let mut outbound = Vec::new();
    while let Ok(message) = out_rx.try_recv() {
        outbound.push(message);
    }

    let stats = session.stats().clone();
    info!(
        queued,
        accepted = stats.messages_accepted,
        rejected = stats.messages_rejected,
        "Replay finished"
    );

    Ok(ReplayReport {
        summaries: session.summaries(),
        outbound,
        rejections: session.drain_rejections(),
        stats,
    })
}
