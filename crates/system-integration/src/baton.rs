//! Baton control
//!
//! The baton is a single-owner token: only its holder may commit shared
//! edits. Each client keeps a [`BatonState`] view that is updated from the
//! arbiter's broadcasts; the [`BatonArbiter`] owns the authoritative holder.
//!
//! Every broadcast carries an epoch that the arbiter bumps on each change.
//! Requests and approvals carry the epoch they were made in, so a late
//! approval for a superseded view of the baton is rejected instead of
//! silently re-granting control.

use beamplot_shared::{
    BatonApprovalMessage, BatonMessage, BatonRequestMessage, PlotError, PlotResult,
};
use std::collections::{BTreeMap, BTreeSet};

/// Client-side baton phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatonPhase {
    Unheld,
    /// Waiting for a hand-over requested in `epoch`
    Requested { epoch: u64 },
    Held,
}

/// One client's view of the baton
#[derive(Debug, Clone)]
pub struct BatonState {
    own_uuid: String,
    holder: Option<String>,
    others: BTreeSet<String>,
    phase: BatonPhase,
    /// Epoch of the last applied broadcast
    epoch: Option<u64>,
    /// Requests received while holding, keyed by requester
    pending_requests: BTreeMap<String, u64>,
}

impl BatonState {
    pub fn new(own_uuid: impl Into<String>) -> Self {
        Self {
            own_uuid: own_uuid.into(),
            holder: None,
            others: BTreeSet::new(),
            phase: BatonPhase::Unheld,
            epoch: None,
            pending_requests: BTreeMap::new(),
        }
    }

    pub fn own_uuid(&self) -> &str {
        &self.own_uuid
    }

    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    pub fn others(&self) -> impl Iterator<Item = &str> {
        self.others.iter().map(String::as_str)
    }

    pub fn phase(&self) -> BatonPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.unwrap_or(0)
    }

    /// Always equal to `holder == own_uuid`
    pub fn has_baton(&self) -> bool {
        self.holder.as_deref() == Some(self.own_uuid.as_str())
    }

    pub fn pending_requests(&self) -> impl Iterator<Item = &str> {
        self.pending_requests.keys().map(String::as_str)
    }

    /// Ask the holder for the baton
    ///
    /// A new request supersedes an earlier one. Returns `None` when this
    /// client already holds the baton.
    pub fn request_baton(&mut self) -> Option<BatonRequestMessage> {
        if self.has_baton() {
            log::debug!("Client {} already holds the baton", self.own_uuid);
            return None;
        }
        let epoch = self.epoch();
        self.phase = BatonPhase::Requested { epoch };
        log::info!("Client {} requesting baton in epoch {}", self.own_uuid, epoch);
        Some(BatonRequestMessage {
            requester: self.own_uuid.clone(),
            epoch,
        })
    }

    /// Record a request forwarded to us as holder
    pub fn on_baton_request(&mut self, request: &BatonRequestMessage) {
        if !self.has_baton() {
            log::debug!(
                "Ignoring baton request from {}: not the holder",
                request.requester
            );
            return;
        }
        if request.epoch < self.epoch() {
            log::warn!(
                "Ignoring stale baton request from {} (epoch {} < {})",
                request.requester,
                request.epoch,
                self.epoch()
            );
            return;
        }
        self.pending_requests
            .insert(request.requester.clone(), request.epoch);
    }

    /// Hand the baton to `requester`; only the holder may approve, and only
    /// a request still pending in the current epoch
    ///
    /// The local view changes only when the arbiter's broadcast arrives.
    pub fn approve_baton(&mut self, requester: &str) -> PlotResult<BatonApprovalMessage> {
        if !self.has_baton() {
            return Err(PlotError::BatonConflict {
                uuid: self.own_uuid.clone(),
            });
        }
        if !self.others.contains(requester) {
            return Err(PlotError::UnknownClient {
                uuid: requester.to_string(),
            });
        }
        // A requester with no request on record is reported at epoch 0.
        let current = self.epoch();
        match self.pending_requests.get(requester) {
            Some(&requested) if requested == current => {}
            requested => {
                return Err(PlotError::StaleBatonApproval {
                    epoch: requested.copied().unwrap_or(0),
                    current,
                });
            }
        }
        self.pending_requests.remove(requester);
        Ok(BatonApprovalMessage {
            receiver: requester.to_string(),
            epoch: current,
        })
    }

    /// Apply an arbiter broadcast; returns whether it was applied
    ///
    /// Broadcasts whose epoch is not newer than the last applied one are
    /// ignored.
    pub fn apply_update(&mut self, update: &BatonMessage) -> bool {
        if let Some(current) = self.epoch {
            if update.epoch <= current {
                log::warn!(
                    "Ignoring stale baton update (epoch {} <= {})",
                    update.epoch,
                    current
                );
                return false;
            }
        }

        self.epoch = Some(update.epoch);
        self.holder = update.baton.clone();
        self.others = update
            .uuids
            .iter()
            .filter(|u| **u != self.own_uuid)
            .cloned()
            .collect();

        if self.has_baton() {
            if self.phase != BatonPhase::Held {
                log::info!("Client {} now holds the baton", self.own_uuid);
            }
            self.phase = BatonPhase::Held;
            let others = &self.others;
            let epoch = update.epoch;
            self.pending_requests
                .retain(|uuid, requested| others.contains(uuid) && *requested >= epoch);
        } else {
            if let BatonPhase::Requested { epoch } = self.phase {
                log::info!(
                    "Baton request from epoch {} overtaken by epoch {}",
                    epoch,
                    update.epoch
                );
            }
            self.phase = BatonPhase::Unheld;
            self.pending_requests.clear();
        }
        true
    }
}

/// Authoritative baton arbitration for a set of connected clients
#[derive(Debug, Clone, Default)]
pub struct BatonArbiter {
    /// Join order
    clients: Vec<String>,
    holder: Option<String>,
    epoch: u64,
}

impl BatonArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    pub fn clients(&self) -> &[String] {
        &self.clients
    }

    /// Current state as a broadcast
    pub fn snapshot(&self) -> BatonMessage {
        BatonMessage {
            baton: self.holder.clone(),
            uuids: self.clients.clone(),
            epoch: self.epoch,
        }
    }

    fn broadcast(&mut self) -> BatonMessage {
        self.epoch += 1;
        self.snapshot()
    }

    /// The first client to join receives the baton
    pub fn add_client(&mut self, uuid: impl Into<String>) -> BatonMessage {
        let uuid = uuid.into();
        if !self.clients.contains(&uuid) {
            self.clients.push(uuid.clone());
        }
        if self.holder.is_none() {
            log::info!("Giving baton to {}", uuid);
            self.holder = Some(uuid);
        }
        self.broadcast()
    }

    /// A departing holder's baton passes to the earliest remaining client
    pub fn remove_client(&mut self, uuid: &str) -> PlotResult<BatonMessage> {
        let index = self
            .clients
            .iter()
            .position(|c| c == uuid)
            .ok_or_else(|| PlotError::UnknownClient {
                uuid: uuid.to_string(),
            })?;
        self.clients.remove(index);
        if self.holder.as_deref() == Some(uuid) {
            self.holder = self.clients.first().cloned();
            log::info!("Holder {} left, baton passes to {:?}", uuid, self.holder);
        }
        Ok(self.broadcast())
    }

    /// Holder a request should be forwarded to
    pub fn route_request(&self, request: &BatonRequestMessage) -> PlotResult<String> {
        if !self.clients.contains(&request.requester) {
            return Err(PlotError::UnknownClient {
                uuid: request.requester.clone(),
            });
        }
        self.holder.clone().ok_or_else(|| PlotError::BatonConflict {
            uuid: request.requester.clone(),
        })
    }

    /// Transfer the baton on an approval from the current holder
    pub fn approve(&mut self, from: &str, approval: &BatonApprovalMessage) -> PlotResult<BatonMessage> {
        if self.holder.as_deref() != Some(from) {
            return Err(PlotError::BatonConflict {
                uuid: from.to_string(),
            });
        }
        if approval.epoch != self.epoch {
            return Err(PlotError::StaleBatonApproval {
                epoch: approval.epoch,
                current: self.epoch,
            });
        }
        if !self.clients.contains(&approval.receiver) {
            return Err(PlotError::UnknownClient {
                uuid: approval.receiver.clone(),
            });
        }
        log::info!("Baton passes from {} to {}", from, approval.receiver);
        self.holder = Some(approval.receiver.clone());
        Ok(self.broadcast())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast(clients: &mut [BatonState], update: &BatonMessage) {
        for client in clients.iter_mut() {
            client.apply_update(update);
        }
    }

    fn assert_single_holder(clients: &[BatonState], arbiter: &BatonArbiter) {
        let holders: Vec<&str> = clients
            .iter()
            .filter(|c| c.has_baton())
            .map(|c| c.own_uuid())
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(Some(holders[0]), arbiter.holder());
        for client in clients {
            assert_eq!(client.has_baton(), client.holder() == Some(client.own_uuid()));
        }
    }

    #[test]
    fn test_first_client_holds() {
        let mut arbiter = BatonArbiter::new();
        let mut clients = vec![BatonState::new("a"), BatonState::new("b")];
        let update = arbiter.add_client("a");
        broadcast(&mut clients, &update);
        let update = arbiter.add_client("b");
        broadcast(&mut clients, &update);

        assert_single_holder(&clients, &arbiter);
        assert_eq!(clients[0].phase(), BatonPhase::Held);
        assert_eq!(clients[1].others().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_request_approve_transfer() {
        let mut arbiter = BatonArbiter::new();
        let mut clients = vec![BatonState::new("a"), BatonState::new("b")];
        for uuid in ["a", "b"] {
            let update = arbiter.add_client(uuid);
            broadcast(&mut clients, &update);
        }

        let request = clients[1].request_baton().unwrap();
        assert_eq!(clients[1].phase(), BatonPhase::Requested { epoch: 2 });
        assert_eq!(arbiter.route_request(&request).unwrap(), "a");
        clients[0].on_baton_request(&request);
        assert_eq!(clients[0].pending_requests().collect::<Vec<_>>(), vec!["b"]);

        let approval = clients[0].approve_baton("b").unwrap();
        let update = arbiter.approve("a", &approval).unwrap();
        broadcast(&mut clients, &update);

        assert_single_holder(&clients, &arbiter);
        assert!(clients[1].has_baton());
        assert_eq!(clients[1].phase(), BatonPhase::Held);
        assert_eq!(clients[0].phase(), BatonPhase::Unheld);
    }

    #[test]
    fn test_stale_approval_rejected() {
        let mut arbiter = BatonArbiter::new();
        let mut clients = vec![BatonState::new("a"), BatonState::new("b")];
        for uuid in ["a", "b"] {
            let update = arbiter.add_client(uuid);
            broadcast(&mut clients, &update);
        }
        let request = clients[1].request_baton().unwrap();
        clients[0].on_baton_request(&request);
        let approval = clients[0].approve_baton("b").unwrap();

        // A third client joins before the approval reaches the arbiter
        let update = arbiter.add_client("c");
        broadcast(&mut clients, &update);

        let err = arbiter.approve("a", &approval).unwrap_err();
        assert_eq!(
            err,
            PlotError::StaleBatonApproval {
                epoch: 2,
                current: 3
            }
        );
        assert_eq!(arbiter.holder(), Some("a"));
    }

    #[test]
    fn test_overtaken_request_cannot_be_approved() {
        let mut arbiter = BatonArbiter::new();
        let mut clients = vec![BatonState::new("a"), BatonState::new("b"), BatonState::new("c")];
        for uuid in ["a", "b"] {
            let update = arbiter.add_client(uuid);
            broadcast(&mut clients, &update);
        }
        let request = clients[1].request_baton().unwrap();
        clients[0].on_baton_request(&request);

        // c joining moves everyone to epoch 3 and overtakes b's request
        let update = arbiter.add_client("c");
        broadcast(&mut clients, &update);
        assert_eq!(clients[1].phase(), BatonPhase::Unheld);
        assert_eq!(clients[0].pending_requests().count(), 0);
        assert_eq!(
            clients[0].approve_baton("b").unwrap_err(),
            PlotError::StaleBatonApproval {
                epoch: 0,
                current: 3
            }
        );

        // A request recorded before the broadcast is stale even if kept
        let mut holder = clients[0].clone();
        holder.pending_requests.insert("b".to_string(), 2);
        assert_eq!(
            holder.approve_baton("b").unwrap_err(),
            PlotError::StaleBatonApproval {
                epoch: 2,
                current: 3
            }
        );

        // Requesting again in the new epoch works
        let request = clients[1].request_baton().unwrap();
        clients[0].on_baton_request(&request);
        let approval = clients[0].approve_baton("b").unwrap();
        let update = arbiter.approve("a", &approval).unwrap();
        broadcast(&mut clients, &update);
        assert_single_holder(&clients, &arbiter);
        assert!(clients[1].has_baton());
    }

    #[test]
    fn test_non_holder_cannot_approve() {
        let mut arbiter = BatonArbiter::new();
        let mut b = BatonState::new("b");
        arbiter.add_client("a");
        b.apply_update(&arbiter.add_client("b"));

        assert_eq!(
            b.approve_baton("a").unwrap_err(),
            PlotError::BatonConflict {
                uuid: "b".to_string()
            }
        );
        let forged = BatonApprovalMessage {
            receiver: "b".to_string(),
            epoch: arbiter.epoch(),
        };
        assert!(matches!(
            arbiter.approve("b", &forged),
            Err(PlotError::BatonConflict { .. })
        ));
    }

    #[test]
    fn test_stale_update_ignored() {
        let mut state = BatonState::new("a");
        assert!(state.apply_update(&BatonMessage {
            baton: Some("a".to_string()),
            uuids: vec!["a".to_string()],
            epoch: 5,
        }));
        assert!(!state.apply_update(&BatonMessage {
            baton: Some("z".to_string()),
            uuids: vec!["a".to_string(), "z".to_string()],
            epoch: 4,
        }));
        assert!(state.has_baton());
        assert_eq!(state.epoch(), 5);
    }

    #[test]
    fn test_holder_leaves() {
        let mut arbiter = BatonArbiter::new();
        let mut clients = vec![BatonState::new("a"), BatonState::new("b"), BatonState::new("c")];
        for uuid in ["a", "b", "c"] {
            let update = arbiter.add_client(uuid);
            broadcast(&mut clients, &update);
        }
        let update = arbiter.remove_client("a").unwrap();
        broadcast(&mut clients[1..], &update);

        assert_eq!(arbiter.holder(), Some("b"));
        assert_single_holder(&clients[1..], &arbiter);
        assert!(arbiter.remove_client("a").is_err());
    }

    #[test]
    fn test_holder_does_not_request() {
        let mut state = BatonState::new("a");
        state.apply_update(&BatonMessage {
            baton: Some("a".to_string()),
            uuids: vec!["a".to_string()],
            epoch: 1,
        });
        assert!(state.request_baton().is_none());
    }

    #[test]
    fn test_single_holder_across_sequences() {
        let mut arbiter = BatonArbiter::new();
        let uuids = ["a", "b", "c", "d"];
        let mut clients: Vec<BatonState> = uuids.iter().map(|u| BatonState::new(*u)).collect();
        for uuid in uuids {
            let update = arbiter.add_client(uuid);
            broadcast(&mut clients, &update);
        }

        // Every client in turn requests and the current holder approves
        for round in 0..8 {
            let requester = uuids[(round * 3 + 1) % uuids.len()];
            let requester_index = (round * 3 + 1) % uuids.len();
            let Some(request) = clients[requester_index].request_baton() else {
                continue;
            };
            let holder = arbiter.route_request(&request).unwrap();
            let holder_index = uuids.iter().position(|u| *u == holder).unwrap();
            clients[holder_index].on_baton_request(&request);
            let approval = clients[holder_index].approve_baton(requester).unwrap();
            let update = arbiter.approve(&holder, &approval).unwrap();
            broadcast(&mut clients, &update);
            assert_single_holder(&clients, &arbiter);
        }
    }
}
