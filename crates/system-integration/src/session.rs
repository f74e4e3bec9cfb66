//! Multi-plot session
//!
//! A [`PlotSession`] owns the state of every plot shown over one connection
//! and the single baton view shared by those plots. Inbound envelopes are
//! fully decoded before anything is committed, so a rejected message leaves
//! the last committed state untouched. Local edits are gated on plot status
//! and, in shared sessions, on holding the baton; accepted edits are queued
//! as outbound [`ClientMessage`]s.

use crate::baton::BatonState;
use crate::dispatch::{decode_envelope, Route};
use beamplot_config::SessionConfig;
use beamplot_data::{
    decode_lines, AxesConfig, DecodeLimits, PlotPayload, PlotState, PlotSummary,
    ProposedSelection, ScatterPayload, SurfacePayload, TablePayload,
};
use beamplot_shared::{
    AxesParameters, ClientMessage, ErrorResponse, LineParameters, MessageEnvelope, MessagePayload, PlotError,
    PlotResult, Point2, SelectionDescriptor, SelectionShape, StatusType, StyleUpdate,
};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

/// Rejections kept for reporting; older ones are dropped first
const MAX_REJECTIONS: usize = 64;

/// Session counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub messages_accepted: u64,
    pub messages_rejected: u64,
    pub edits_rejected: u64,
    pub outbound_queued: u64,
}

#[derive(Debug, Clone)]
struct PlotEntry {
    state: PlotState,
    status: StatusType,
}

impl PlotEntry {
    fn new(plot_id: &str) -> Self {
        Self {
            state: PlotState::new(plot_id),
            status: StatusType::Ready,
        }
    }
}

pub struct PlotSession {
    baton: BatonState,
    shared: bool,
    limits: DecodeLimits,
    plots: BTreeMap<String, PlotEntry>,
    outbox: VecDeque<ClientMessage>,
    rejections: VecDeque<ErrorResponse>,
    stats: SessionStats,
}

impl PlotSession {
    pub fn new(own_uuid: impl Into<String>, shared: bool, limits: DecodeLimits) -> Self {
        Self {
            baton: BatonState::new(own_uuid),
            shared,
            limits,
            plots: BTreeMap::new(),
            outbox: VecDeque::new(),
            rejections: VecDeque::new(),
            stats: SessionStats::default(),
        }
    }

    /// Session for the configured client with one empty plot per plot id
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut client = config.client.clone();
        let limits = DecodeLimits {
            max_array_bytes: config.decoding.max_array_bytes,
            max_rank: config.decoding.max_rank,
        };
        let uuid = client.ensure_uuid().to_string();
        let mut session = Self::new(uuid, client.shared, limits);
        for plot_id in &client.plot_ids {
            session.add_plot(plot_id);
        }
        session
    }

    pub fn add_plot(&mut self, plot_id: &str) {
        self.plots
            .entry(plot_id.to_string())
            .or_insert_with(|| PlotEntry::new(plot_id));
    }

    pub fn uuid(&self) -> &str {
        self.baton.own_uuid()
    }

    pub fn baton(&self) -> &BatonState {
        &self.baton
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn limits(&self) -> &DecodeLimits {
        &self.limits
    }

    pub fn plot(&self, plot_id: &str) -> Option<&PlotState> {
        self.plots.get(plot_id).map(|e| &e.state)
    }

    pub fn plot_ids(&self) -> impl Iterator<Item = &str> {
        self.plots.keys().map(String::as_str)
    }

    pub fn status(&self, plot_id: &str) -> Option<StatusType> {
        self.plots.get(plot_id).map(|e| e.status)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn summaries(&self) -> Vec<PlotSummary> {
        self.plots.values().map(|e| e.state.summary()).collect()
    }

    /// Take every queued outbound message, oldest first
    pub fn drain_outbox(&mut self) -> Vec<ClientMessage> {
        self.outbox.drain(..).collect()
    }

    /// Take the recorded rejections, oldest first
    pub fn drain_rejections(&mut self) -> Vec<ErrorResponse> {
        self.rejections.drain(..).collect()
    }

    fn record_rejection(&mut self, plot_id: Option<&str>, operation: &str, error: &PlotError) {
        let rejection = ErrorResponse::new(error.clone(), plot_id, operation);
        log::warn!("Rejected {}", rejection.summary());
        if self.rejections.len() == MAX_REJECTIONS {
            self.rejections.pop_front();
        }
        self.rejections.push_back(rejection);
    }

    fn queue(&mut self, message: ClientMessage) {
        self.stats.outbound_queued += 1;
        self.outbox.push_back(message);
    }

    /// Run `f` against a plot's entry
    ///
    /// A plot seen for the first time is built aside and only stored when
    /// `f` succeeds, so a rejected message never leaves an empty plot behind.
    fn update<T>(
        &mut self,
        plot_id: &str,
        f: impl FnOnce(&mut PlotEntry) -> PlotResult<T>,
    ) -> PlotResult<T> {
        if let Some(entry) = self.plots.get_mut(plot_id) {
            return f(entry);
        }
        let mut entry = PlotEntry::new(plot_id);
        let value = f(&mut entry)?;
        log::info!("Creating state for new plot {}", plot_id);
        self.plots.insert(plot_id.to_string(), entry);
        Ok(value)
    }

    // Inbound

    /// Decode, classify and apply one JSON envelope
    pub fn handle_json(&mut self, bytes: &[u8]) -> PlotResult<Route> {
        match decode_envelope(bytes) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => {
                self.stats.messages_rejected += 1;
                self.record_rejection(None, "decode", &e);
                Err(e)
            }
        }
    }

    /// Apply one classified envelope, whole or not at all
    pub fn handle(&mut self, envelope: MessageEnvelope) -> PlotResult<Route> {
        let kind = envelope.kind();
        let route = Route::for_kind(kind);
        let plot_id = envelope.plot_id.clone();

        match self.apply(envelope) {
            Ok(()) => {
                self.stats.messages_accepted += 1;
                log::debug!("Applied {} message for plot {} via {}", kind, plot_id, route);
                if route.acknowledges() {
                    self.queue(ClientMessage::Status {
                        plot_id,
                        status: StatusType::Ready,
                    });
                }
                Ok(route)
            }
            Err(e) => {
                self.stats.messages_rejected += 1;
                self.record_rejection(Some(&plot_id), kind.as_str(), &e);
                Err(e)
            }
        }
    }

    fn decode_axes(&self, params: &AxesParameters) -> PlotResult<AxesConfig> {
        AxesConfig::decode(params, &self.limits)
    }

    fn apply(&mut self, envelope: MessageEnvelope) -> PlotResult<()> {
        let MessageEnvelope { plot_id, payload } = envelope;
        match payload {
            MessagePayload::Status(status) => {
                log::info!("Plot {} status: {:?}", plot_id, status);
                self.update(&plot_id, |entry| {
                    entry.status = status;
                    Ok(())
                })
            }
            MessagePayload::MultiLine(message) => {
                let axes = self.decode_axes(&message.axes_parameters)?;
                let lines = decode_lines(&message.ml_data, &self.limits)?;
                self.replace(&plot_id, axes, PlotPayload::MultiLine(lines))
            }
            MessagePayload::AppendLine(message) => {
                let axes = if message.axes_parameters == AxesParameters::default() {
                    None
                } else {
                    Some(self.decode_axes(&message.axes_parameters)?)
                };
                let lines = decode_lines(&message.al_data, &self.limits)?;
                self.update(&plot_id, |entry| entry.state.append_lines(axes, lines))
            }
            MessagePayload::Image(message) => {
                let axes = self.decode_axes(&message.axes_parameters)?;
                let payload = PlotPayload::decode_image(&message.im_data, &self.limits)?;
                self.replace(&plot_id, axes, payload)
            }
            MessagePayload::Scatter(message) => {
                let axes = self.decode_axes(&message.axes_parameters)?;
                let payload = ScatterPayload::decode(&message.sc_data, &self.limits)?;
                self.replace(&plot_id, axes, PlotPayload::Scatter(payload))
            }
            MessagePayload::Surface(message) => {
                let axes = self.decode_axes(&message.axes_parameters)?;
                let payload = SurfacePayload::decode(&message.su_data, &self.limits)?;
                self.replace(&plot_id, axes, PlotPayload::Surface(payload))
            }
            MessagePayload::Table(message) => {
                let axes = self.decode_axes(&message.axes_parameters)?;
                let payload = TablePayload::decode(&message.ta_data, &self.limits)?;
                self.replace(&plot_id, axes, PlotPayload::Table(payload))
            }
            MessagePayload::SetSelections(message) => self.update(&plot_id, |entry| {
                entry.state.selections_mut().set_all(message.set_selections)
            }),
            MessagePayload::AppendSelections(message) => self.update(&plot_id, |entry| {
                entry.state.selections_mut().upsert(message.append_selections)
            }),
            MessagePayload::ClientSelection(message) => self.update(&plot_id, |entry| {
                entry.state.selections_mut().upsert(vec![message.selection])
            }),
            MessagePayload::ClearSelections(message) => self.update(&plot_id, |entry| {
                let removed = entry
                    .state
                    .selections_mut()
                    .remove_many(&message.selection_ids);
                log::debug!("Plot {}: removed {} selections", plot_id, removed.len());
                Ok(())
            }),
            MessagePayload::ClearData => self.update(&plot_id, |entry| {
                entry.state.clear();
                Ok(())
            }),
            MessagePayload::Baton(message) => {
                self.baton.apply_update(&message);
                Ok(())
            }
            MessagePayload::BatonRequest(message) => {
                self.baton.on_baton_request(&message);
                Ok(())
            }
        }
    }

    fn replace(&mut self, plot_id: &str, axes: AxesConfig, payload: PlotPayload) -> PlotResult<()> {
        self.update(plot_id, |entry| {
            entry.state.replace(axes, payload);
            Ok(())
        })
    }

    // Local actions

    fn existing(&mut self, plot_id: &str) -> PlotResult<&mut PlotEntry> {
        self.plots
            .get_mut(plot_id)
            .ok_or_else(|| PlotError::UnknownPlot {
                plot_id: plot_id.to_string(),
            })
    }

    fn check_baton(&self) -> PlotResult<()> {
        if self.shared && !self.baton.has_baton() {
            return Err(PlotError::BatonConflict {
                uuid: self.baton.own_uuid().to_string(),
            });
        }
        Ok(())
    }

    /// Selection submissions need a ready plot and, when shared, the baton
    fn check_commit(&self, plot_id: &str) -> PlotResult<()> {
        let entry = self.plots.get(plot_id).ok_or_else(|| PlotError::UnknownPlot {
            plot_id: plot_id.to_string(),
        })?;
        if !entry.status.accepts_selections() {
            return Err(PlotError::Busy {
                plot_id: plot_id.to_string(),
            });
        }
        self.check_baton()
    }

    fn rejected<T>(&mut self, action: &str, plot_id: &str, result: PlotResult<T>) -> PlotResult<T> {
        if let Err(e) = &result {
            self.stats.edits_rejected += 1;
            self.record_rejection(Some(plot_id), action, e);
        }
        result
    }

    /// `Proposed -> Active`, broadcast to the server
    pub fn commit_selection(
        &mut self,
        plot_id: &str,
        proposed: ProposedSelection,
    ) -> PlotResult<SelectionDescriptor> {
        let result = self.check_commit(plot_id).and_then(|()| {
            self.existing(plot_id)?
                .state
                .selections_mut()
                .activate(proposed)
        });
        let selection = self.rejected("selection commit", plot_id, result)?;
        self.queue(ClientMessage::Selection {
            plot_id: plot_id.to_string(),
            selection: selection.clone(),
        });
        Ok(selection)
    }

    /// What a proposed selection would look like, never stored
    pub fn preview_selection(
        &self,
        plot_id: &str,
        proposed: ProposedSelection,
    ) -> PlotResult<SelectionDescriptor> {
        let entry = self.plots.get(plot_id).ok_or_else(|| PlotError::UnknownPlot {
            plot_id: plot_id.to_string(),
        })?;
        entry.state.selections().prepare(proposed)
    }

    pub fn update_selection_style(
        &mut self,
        plot_id: &str,
        id: &str,
        update: &StyleUpdate,
    ) -> PlotResult<SelectionDescriptor> {
        let result = self.check_commit(plot_id).and_then(|()| {
            self.existing(plot_id)?
                .state
                .selections_mut()
                .update_style(id, update)
        });
        let selection = self.rejected("style edit", plot_id, result)?;
        self.queue(ClientMessage::Selection {
            plot_id: plot_id.to_string(),
            selection: selection.clone(),
        });
        Ok(selection)
    }

    pub fn update_selection_geometry(
        &mut self,
        plot_id: &str,
        id: &str,
        start: Point2,
        shape: SelectionShape,
    ) -> PlotResult<SelectionDescriptor> {
        let result = self.check_commit(plot_id).and_then(|()| {
            self.existing(plot_id)?
                .state
                .selections_mut()
                .update_geometry(id, start, shape)
        });
        let selection = self.rejected("geometry edit", plot_id, result)?;
        self.queue(ClientMessage::Selection {
            plot_id: plot_id.to_string(),
            selection: selection.clone(),
        });
        Ok(selection)
    }

    /// Local-only preview of a geometry edit, available without the baton
    pub fn preview_geometry(
        &self,
        plot_id: &str,
        id: &str,
        start: Point2,
        shape: SelectionShape,
    ) -> PlotResult<SelectionDescriptor> {
        let entry = self.plots.get(plot_id).ok_or_else(|| PlotError::UnknownPlot {
            plot_id: plot_id.to_string(),
        })?;
        entry.state.selections().preview_geometry(id, start, shape)
    }

    /// Remove the listed selections, or all of them for an empty list
    pub fn remove_selections(
        &mut self,
        plot_id: &str,
        ids: Vec<String>,
    ) -> PlotResult<Vec<SelectionDescriptor>> {
        let result = self.check_commit(plot_id).and_then(|()| {
            Ok(self
                .existing(plot_id)?
                .state
                .selections_mut()
                .remove_many(&ids))
        });
        let removed = self.rejected("selection removal", plot_id, result)?;
        self.queue(ClientMessage::ClearSelections {
            plot_id: plot_id.to_string(),
            selection_ids: ids,
        });
        Ok(removed)
    }

    pub fn set_line_params(
        &mut self,
        plot_id: &str,
        key: &str,
        params: LineParameters,
    ) -> PlotResult<()> {
        let result = self
            .check_baton()
            .and_then(|()| self.existing(plot_id)?.state.set_line_params(key, &params));
        self.rejected("line parameter change", plot_id, result)?;
        self.queue(ClientMessage::LineParameters {
            plot_id: plot_id.to_string(),
            key: key.to_string(),
            line_params: params,
        });
        Ok(())
    }

    pub fn set_scatter_point_size(&mut self, plot_id: &str, point_size: f64) -> PlotResult<()> {
        let result = self
            .check_baton()
            .and_then(|()| self.existing(plot_id)?.state.set_scatter_point_size(point_size));
        self.rejected("scatter parameter change", plot_id, result)?;
        self.queue(ClientMessage::ScatterParameters {
            plot_id: plot_id.to_string(),
            point_size,
        });
        Ok(())
    }

    /// Queue a baton request; returns whether one was sent
    pub fn request_baton(&mut self) -> bool {
        match self.baton.request_baton() {
            Some(request) => {
                self.queue(ClientMessage::BatonRequest(request));
                true
            }
            None => false,
        }
    }

    pub fn approve_baton(&mut self, requester: &str) -> PlotResult<()> {
        let approval = match self.baton.approve_baton(requester) {
            Ok(approval) => approval,
            Err(e) => {
                self.record_rejection(None, "baton approval", &e);
                return Err(e);
            }
        };
        self.queue(ClientMessage::BatonApproval(approval));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamplot_shared::BatonMessage;

    fn holder_session(shared: bool) -> PlotSession {
        let mut session = PlotSession::new("me", shared, DecodeLimits::default());
        session.add_plot("p0");
        session
            .handle(MessageEnvelope::new(
                "p0",
                MessagePayload::Baton(BatonMessage {
                    baton: Some("me".to_string()),
                    uuids: vec!["me".to_string(), "other".to_string()],
                    epoch: 1,
                }),
            ))
            .unwrap();
        session
    }

    fn point() -> ProposedSelection {
        ProposedSelection::new([1.0, 2.0], SelectionShape::Point)
    }

    #[test]
    fn test_from_config() {
        let mut config = SessionConfig::default();
        config.client.uuid = Some("u1".to_string());
        config.client.plot_ids = vec!["a".to_string(), "b".to_string()];
        let session = PlotSession::from_config(&config);
        assert_eq!(session.uuid(), "u1");
        assert_eq!(session.plot_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(session.is_shared());
        assert_eq!(session.limits().max_rank, 3);
    }

    #[test]
    fn test_commit_queues_broadcast() {
        let mut session = holder_session(true);
        session.drain_outbox();

        let selection = session.commit_selection("p0", point()).unwrap();
        let outbox = session.drain_outbox();
        assert_eq!(
            outbox,
            vec![ClientMessage::Selection {
                plot_id: "p0".to_string(),
                selection: selection.clone(),
            }]
        );
        assert_eq!(session.plot("p0").unwrap().selections().len(), 1);
    }

    #[test]
    fn test_unknown_plot_for_local_action() {
        let mut session = holder_session(true);
        let err = session.commit_selection("nope", point()).unwrap_err();
        assert_eq!(
            err,
            PlotError::UnknownPlot {
                plot_id: "nope".to_string()
            }
        );
        assert_eq!(session.stats().edits_rejected, 1);
    }

    #[test]
    fn test_rejections_are_recorded() {
        let mut session = holder_session(true);
        assert!(session.handle_json(b"not json").is_err());
        assert!(session
            .handle_json(br#"{"plot_id": "p0", "type": "bogus", "params": null}"#)
            .is_err());
        assert!(session.commit_selection("nope", point()).is_err());

        let rejections = session.drain_rejections();
        let seen: Vec<_> = rejections
            .iter()
            .map(|r| (r.plot_id.as_deref(), r.operation.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![(None, "decode"), (None, "decode"), (Some("nope"), "selection commit")]
        );
        assert!(session.drain_rejections().is_empty());

        for _ in 0..MAX_REJECTIONS + 3 {
            let _ = session.commit_selection("nope", point());
        }
        assert_eq!(session.drain_rejections().len(), MAX_REJECTIONS);
    }

    #[test]
    fn test_unshared_session_needs_no_baton() {
        let mut session = PlotSession::new("solo", false, DecodeLimits::default());
        session.add_plot("p0");
        assert!(session.commit_selection("p0", point()).is_ok());
    }

    #[test]
    fn test_approve_baton_queues_approval() {
        let mut session = holder_session(true);
        assert!(matches!(
            session.approve_baton("other"),
            Err(PlotError::StaleBatonApproval { .. })
        ));
        session
            .handle(MessageEnvelope::new(
                "p0",
                MessagePayload::BatonRequest(beamplot_shared::BatonRequestMessage {
                    requester: "other".to_string(),
                    epoch: 1,
                }),
            ))
            .unwrap();
        session.drain_outbox();
        session.approve_baton("other").unwrap();
        assert_eq!(
            session.drain_outbox(),
            vec![ClientMessage::BatonApproval(beamplot_shared::BatonApprovalMessage {
                receiver: "other".to_string(),
                epoch: 1,
            })]
        );
        assert!(session.approve_baton("stranger").is_err());
        assert!(!session.request_baton());
    }
}
