//! Single-threaded session event loop
//!
//! Network traffic and local edits arrive on one channel and are applied to
//! the [`PlotSession`] strictly in arrival order. Outbound messages queued by
//! the session are flushed after every event.

use crate::session::PlotSession;
use crate::{Result, SessionError};
use beamplot_data::ProposedSelection;
use beamplot_shared::{
    ClientMessage, LineParameters, MessageEnvelope, Point2, SelectionShape, StyleUpdate,
};
use tokio::sync::mpsc;

/// Local user actions
#[derive(Debug, Clone)]
pub enum LocalAction {
    CommitSelection {
        plot_id: String,
        proposed: ProposedSelection,
    },
    EditStyle {
        plot_id: String,
        id: String,
        update: StyleUpdate,
    },
    EditGeometry {
        plot_id: String,
        id: String,
        start: Point2,
        shape: SelectionShape,
    },
    RemoveSelections {
        plot_id: String,
        ids: Vec<String>,
    },
    SetLineParams {
        plot_id: String,
        key: String,
        params: LineParameters,
    },
    SetScatterPointSize {
        plot_id: String,
        point_size: f64,
    },
    RequestBaton,
    ApproveBaton {
        requester: String,
    },
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Raw JSON text from the server
    Inbound(String),
    Envelope(MessageEnvelope),
    Local(LocalAction),
    Shutdown,
}

/// Cloneable sender side of a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn send(&self, event: SessionEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| SessionError::ChannelClosed)
    }

    pub fn inbound(&self, text: impl Into<String>) -> Result<()> {
        self.send(SessionEvent::Inbound(text.into()))
    }

    pub fn local(&self, action: LocalAction) -> Result<()> {
        self.send(SessionEvent::Local(action))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionEvent::Shutdown)
    }
}

pub struct SessionEventLoop {
    session: PlotSession,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    processed: u64,
}

impl SessionEventLoop {
    /// Wire a session to its event channel and outbound sink
    pub fn channel(
        session: PlotSession,
        outbound: mpsc::UnboundedSender<ClientMessage>,
    ) -> (SessionHandle, Self) {
        let (tx, events) = mpsc::unbounded_channel();
        let event_loop = Self {
            session,
            events,
            outbound,
            processed: 0,
        };
        (SessionHandle { tx }, event_loop)
    }

    pub fn session(&self) -> &PlotSession {
        &self.session
    }

    /// Run until shutdown or until every handle is dropped, then hand the
    /// session back
    pub async fn run(mut self) -> PlotSession {
        log::info!("Session {} event loop started", self.session.uuid());
        while let Some(event) = self.events.recv().await {
            if matches!(event, SessionEvent::Shutdown) {
                log::info!("Session {} shutting down", self.session.uuid());
                break;
            }
            let outcome = self.step(event);
            self.processed += 1;
            match outcome {
                Ok(()) => {}
                // Already logged and counted by the session
                Err(SessionError::Plot(e)) => log::debug!("Event {} rejected: {}", self.processed, e),
                Err(e) => {
                    log::error!("Stopping session {}: {}", self.session.uuid(), e);
                    break;
                }
            }
        }
        log::info!(
            "Session {} event loop stopped after {} events",
            self.session.uuid(),
            self.processed
        );
        self.session
    }

    /// Apply one event and flush whatever it queued
    ///
    /// A rejected event still flushes messages queued before it.
    pub fn step(&mut self, event: SessionEvent) -> Result<()> {
        let applied = match event {
            SessionEvent::Inbound(text) => self.session.handle_json(text.as_bytes()).map(drop),
            SessionEvent::Envelope(envelope) => self.session.handle(envelope).map(drop),
            SessionEvent::Local(action) => self.apply_local(action),
            SessionEvent::Shutdown => Ok(()),
        };
        self.flush()?;
        applied?;
        Ok(())
    }

    fn apply_local(&mut self, action: LocalAction) -> beamplot_shared::PlotResult<()> {
        let session = &mut self.session;
        match action {
            LocalAction::CommitSelection { plot_id, proposed } => {
                session.commit_selection(&plot_id, proposed).map(drop)
            }
            LocalAction::EditStyle {
                plot_id,
                id,
                update,
            } => session.update_selection_style(&plot_id, &id, &update).map(drop),
            LocalAction::EditGeometry {
                plot_id,
                id,
                start,
                shape,
            } => session
                .update_selection_geometry(&plot_id, &id, start, shape)
                .map(drop),
            LocalAction::RemoveSelections { plot_id, ids } => {
                session.remove_selections(&plot_id, ids).map(drop)
            }
            LocalAction::SetLineParams {
                plot_id,
                key,
                params,
            } => session.set_line_params(&plot_id, &key, params),
            LocalAction::SetScatterPointSize {
                plot_id,
                point_size,
            } => session.set_scatter_point_size(&plot_id, point_size),
            LocalAction::RequestBaton => {
                session.request_baton();
                Ok(())
            }
            LocalAction::ApproveBaton { requester } => session.approve_baton(&requester),
        }
    }

    fn flush(&mut self) -> Result<()> {
        for message in self.session.drain_outbox() {
            self.outbound
                .send(message)
                .map_err(|_| SessionError::ChannelClosed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamplot_data::DecodeLimits;
    use beamplot_shared::StatusType;

    #[tokio::test]
    async fn test_events_applied_in_order() {
        let mut session = PlotSession::new("solo", false, DecodeLimits::default());
        session.add_plot("p0");
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (handle, event_loop) = SessionEventLoop::channel(session, out_tx);

        handle
            .inbound(r#"{"plot_id": "p0", "type": "status", "params": "busy"}"#)
            .unwrap();
        handle
            .local(LocalAction::CommitSelection {
                plot_id: "p0".to_string(),
                proposed: ProposedSelection::new([0.0, 0.0], SelectionShape::Point),
            })
            .unwrap();
        handle
            .inbound(r#"{"plot_id": "p0", "type": "status", "params": "ready"}"#)
            .unwrap();
        handle
            .local(LocalAction::CommitSelection {
                plot_id: "p0".to_string(),
                proposed: ProposedSelection::new([1.0, 1.0], SelectionShape::Point),
            })
            .unwrap();
        handle.shutdown().unwrap();

        let session = event_loop.run().await;
        assert_eq!(session.status("p0"), Some(StatusType::Ready));
        assert_eq!(session.plot("p0").unwrap().selections().len(), 1);
        assert_eq!(session.stats().edits_rejected, 1);

        let sent = out_rx.recv().await.unwrap();
        assert!(matches!(sent, ClientMessage::Selection { .. }));
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn test_step_reports_rejections_and_closed_sink() {
        let mut session = PlotSession::new("solo", false, DecodeLimits::default());
        session.add_plot("p0");
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (_handle, mut event_loop) = SessionEventLoop::channel(session, out_tx);

        let err = event_loop
            .step(SessionEvent::Local(LocalAction::SetScatterPointSize {
                plot_id: "missing".to_string(),
                point_size: 2.0,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Plot(beamplot_shared::PlotError::UnknownPlot { .. })
        ));

        drop(out_rx);
        let err = event_loop
            .step(SessionEvent::Inbound(
                r#"{"plot_id": "p0", "type": "clear_data", "params": null}"#.to_string(),
            ))
            .unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed));
        assert_eq!(event_loop.session().stats().messages_accepted, 1);
    }

    #[tokio::test]
    async fn test_stops_when_handles_dropped() {
        let session = PlotSession::new("solo", false, DecodeLimits::default());
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (handle, event_loop) = SessionEventLoop::channel(session, out_tx);
        handle.inbound("garbage").unwrap();
        drop(handle);

        let session = event_loop.run().await;
        assert_eq!(session.stats().messages_rejected, 1);
    }
}
