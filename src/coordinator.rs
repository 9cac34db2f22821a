//! Optimistic lead moves.
//!
//! A [`MoveIntent`] is applied to the [`LeadStore`] immediately and turned
//! into a [`MoveCommand`] for the event loop to send. When the backend
//! answers, [`MoveCoordinator::settle`] either keeps the new column or puts
//! the lead back where it was.
//!
//! Per lead, at most one command is outstanding. A newer intent for a lead
//! that is still in flight waits in a one-slot queue (newest wins) and is
//! applied once the outstanding call settles.

use std::collections::HashMap;

use crate::backend::BackendError;
use crate::board::store::{LeadStore, Placement};
use crate::board::{ColumnId, LeadId};
use crate::drag::MoveIntent;

/// Backend call the event loop should issue: `update_lead_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub lead_id: LeadId,
    pub to_column_id: ColumnId,
}

/// A move that no longer applies. Never shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StaleReference {
    #[error("lead {0} is no longer on the board")]
    Lead(LeadId),
    #[error("column {0} is not an active column of this pipeline")]
    Column(ColumnId),
    #[error("lead {0} is already in column {1}")]
    AlreadyThere(LeadId, ColumnId),
}

/// The backend refused a move; the lead was put back.
#[derive(Debug, Clone, thiserror::Error)]
#[error("could not move {lead_name} to {column_name}: {source}")]
pub struct MoveRejected {
    pub lead_id: LeadId,
    pub lead_name: String,
    pub column_id: ColumnId,
    pub column_name: String,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Submitted {
    /// Applied locally; send this command.
    Issued(MoveCommand),
    /// The lead has a call outstanding; applied when it settles.
    Queued,
    Dropped(StaleReference),
}

/// Result of settling one backend call.
#[derive(Debug, Default)]
pub struct Settled {
    /// Follow-up call for a queued intent, if one was waiting.
    pub next: Option<MoveCommand>,
    pub rejected: Option<MoveRejected>,
}

#[derive(Debug)]
struct InFlight {
    sent: ColumnId,
    rollback: Placement,
    queued: Option<MoveIntent>,
}

#[derive(Debug, Default)]
pub struct MoveCoordinator {
    in_flight: HashMap<LeadId, InFlight>,
}

impl MoveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, lead_id: &LeadId) -> bool {
        self.in_flight.contains_key(lead_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Apply an intent optimistically, or queue it behind an outstanding call.
    pub fn submit(&mut self, intent: MoveIntent, store: &mut LeadStore) -> Submitted {
        if !store.contains(&intent.lead_id) {
            return self.drop_stale(StaleReference::Lead(intent.lead_id));
        }
        if !store.is_active_column(&intent.to_column_id) {
            return self.drop_stale(StaleReference::Column(intent.to_column_id));
        }
        if let Some(entry) = self.in_flight.get_mut(&intent.lead_id) {
            tracing::debug!(lead = %intent.lead_id, to = %intent.to_column_id, "move queued behind in-flight call");
            entry.queued = Some(intent);
            return Submitted::Queued;
        }
        match self.apply(intent, store) {
            Ok(cmd) => Submitted::Issued(cmd),
            Err(stale) => self.drop_stale(stale),
        }
    }

    /// Reconcile an outstanding call with its backend result.
    pub fn settle(
        &mut self,
        lead_id: &LeadId,
        result: Result<(), BackendError>,
        store: &mut LeadStore,
    ) -> Settled {
        let Some(entry) = self.in_flight.remove(lead_id) else {
            tracing::debug!(lead = %lead_id, "settled a move that was not in flight");
            return Settled::default();
        };

        let mut settled = Settled::default();
        match result {
            Ok(()) => {
                tracing::info!(lead = %lead_id, column = %entry.sent, "move committed");
            }
            Err(source) => {
                tracing::warn!(lead = %lead_id, column = %entry.sent, error = %source, "move rejected, rolling back");
                let lead_name = store.get(lead_id).map(|l| l.name.clone()).unwrap_or_else(|| lead_id.to_string());
                let column_name = store
                    .column(&entry.sent)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| entry.sent.to_string());
                store.restore(lead_id, entry.rollback);
                settled.rejected = Some(MoveRejected {
                    lead_id: lead_id.clone(),
                    lead_name,
                    column_id: entry.sent,
                    column_name,
                    source,
                });
            }
        }

        if let Some(intent) = entry.queued {
            match self.apply(intent, store) {
                Ok(cmd) => settled.next = Some(cmd),
                Err(stale) => {
                    self.drop_stale(stale);
                }
            }
        }
        settled
    }

    /// Re-apply in-flight targets after the store was rehydrated.
    ///
    /// A refresh can return a lead's server-side column while its move is
    /// still outstanding; the optimistic column wins until the call settles.
    pub fn reapply(&self, store: &mut LeadStore) {
        for (lead_id, entry) in &self.in_flight {
            let current = store.get(lead_id).map(|l| l.column_id.clone());
            if current.as_ref().is_some_and(|c| c != &entry.sent) {
                store.place(lead_id, entry.sent.clone());
            }
        }
    }

    fn apply(&mut self, intent: MoveIntent, store: &mut LeadStore) -> Result<MoveCommand, StaleReference> {
        let MoveIntent { lead_id, to_column_id, .. } = intent;
        if !store.is_active_column(&to_column_id) {
            return Err(StaleReference::Column(to_column_id));
        }
        match store.get(&lead_id) {
            None => return Err(StaleReference::Lead(lead_id)),
            Some(lead) if lead.column_id == to_column_id => {
                return Err(StaleReference::AlreadyThere(lead_id, to_column_id));
            }
            Some(_) => {}
        }
        let Some(rollback) = store.place(&lead_id, to_column_id.clone()) else {
            return Err(StaleReference::Lead(lead_id));
        };
        self.in_flight.insert(
            lead_id.clone(),
            InFlight { sent: to_column_id.clone(), rollback, queued: None },
        );
        Ok(MoveCommand { lead_id, to_column_id })
    }

    fn drop_stale(&self, stale: StaleReference) -> Submitted {
        tracing::debug!(reason = %stale, "dropping stale move");
        Submitted::Dropped(stale)
    }
}
