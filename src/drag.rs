//! Drag lifecycle for moving leads between columns.
//!
//! [`DragController`] is a small state machine driven by [`DragEvent`]s. It
//! knows nothing about terminals: the mouse and keyboard sensors in the app
//! translate raw input into events, and the controller decides whether a
//! finished drag is worth a [`MoveIntent`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::board::{ColumnId, LeadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging,
    /// Dropped on a new column; the intent is waiting to be taken.
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragState {
    pub dragged_lead_id: LeadId,
    pub source_column_id: ColumnId,
    pub candidate_column_id: Option<ColumnId>,
    pub phase: DragPhase,
}

/// Request to reassign a lead's column, produced by a completed drag.
///
/// Not `Clone`: an intent is handed to the coordinator exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct MoveIntent {
    pub lead_id: LeadId,
    pub from_column_id: ColumnId,
    pub to_column_id: ColumnId,
    pub requested_at: DateTime<Utc>,
}

impl MoveIntent {
    pub fn new(lead_id: LeadId, from_column_id: ColumnId, to_column_id: ColumnId) -> Self {
        Self {
            lead_id,
            from_column_id,
            to_column_id,
            requested_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Start { lead_id: LeadId, column_id: ColumnId },
    /// The droppable column under the pointer, or `None` outside every column.
    Over(Option<ColumnId>),
    End,
    Cancel,
}

/// What a drag-end resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// A move intent is ready in [`DragController::take_intent`].
    Moved,
    /// Dropped on the source column or outside any column.
    Unchanged,
    /// No drag was in progress.
    Ignored,
}

/// Shared "a drag is in progress" flag.
///
/// Card click handlers hold a clone and refuse to open details while it is set.
#[derive(Debug, Clone, Default)]
pub struct DragFlag(Arc<AtomicBool>);

impl DragFlag {
    pub fn is_dragging(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn set(&self, dragging: bool) {
        self.0.store(dragging, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct DragController {
    state: Option<DragState>,
    pending: Option<MoveIntent>,
    flag: DragFlag,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self) -> DragFlag {
        self.flag.clone()
    }

    pub fn phase(&self) -> DragPhase {
        self.state.as_ref().map_or(DragPhase::Idle, |s| s.phase)
    }

    pub fn state(&self) -> Option<&DragState> {
        self.state.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.phase() != DragPhase::Idle
    }

    /// Feed one event into the state machine.
    ///
    /// Returns the drop outcome for [`DragEvent::End`] and `None` otherwise.
    pub fn dispatch(&mut self, event: DragEvent) -> Option<DropOutcome> {
        match event {
            DragEvent::Start { lead_id, column_id } => {
                self.start(lead_id, column_id);
                None
            }
            DragEvent::Over(candidate) => {
                self.over(candidate);
                None
            }
            DragEvent::End => Some(self.end()),
            DragEvent::Cancel => {
                self.cancel();
                None
            }
        }
    }

    /// `idle -> dragging`. Ignored unless idle.
    pub fn start(&mut self, lead_id: LeadId, source_column_id: ColumnId) -> bool {
        if self.state.is_some() {
            return false;
        }
        tracing::debug!(lead = %lead_id, column = %source_column_id, "drag start");
        self.state = Some(DragState {
            dragged_lead_id: lead_id,
            candidate_column_id: Some(source_column_id.clone()),
            source_column_id,
            phase: DragPhase::Dragging,
        });
        self.flag.set(true);
        true
    }

    /// `dragging -> dragging`: track the column under the pointer.
    pub fn over(&mut self, candidate: Option<ColumnId>) -> bool {
        match self.state.as_mut() {
            Some(state) if state.phase == DragPhase::Dragging => {
                state.candidate_column_id = candidate;
                true
            }
            _ => false,
        }
    }

    /// `dragging -> committing` when the drop changes the column,
    /// `dragging -> idle` otherwise.
    pub fn end(&mut self) -> DropOutcome {
        let Some(state) = self.state.as_mut().filter(|s| s.phase == DragPhase::Dragging) else {
            return DropOutcome::Ignored;
        };
        match state.candidate_column_id.clone() {
            Some(target) if target != state.source_column_id => {
                state.phase = DragPhase::Committing;
                self.pending = Some(MoveIntent::new(
                    state.dragged_lead_id.clone(),
                    state.source_column_id.clone(),
                    target,
                ));
                DropOutcome::Moved
            }
            _ => {
                self.reset();
                DropOutcome::Unchanged
            }
        }
    }

    /// `dragging -> idle` without an intent.
    pub fn cancel(&mut self) -> bool {
        match self.state.as_ref() {
            Some(state) if state.phase == DragPhase::Dragging => {
                tracing::debug!(lead = %state.dragged_lead_id, "drag cancelled");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Hand out the committed intent and return to idle.
    pub fn take_intent(&mut self) -> Option<MoveIntent> {
        let intent = self.pending.take()?;
        self.reset();
        Some(intent)
    }

    fn reset(&mut self) {
        self.state = None;
        self.pending = None;
        self.flag.set(false);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Armed {
    lead_id: LeadId,
    column_id: ColumnId,
    origin: (u16, u16),
}

/// What a pointer release turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// Button went down and up on a card without moving.
    Click(LeadId),
    /// A drag was in progress and should now end.
    Drop,
    Nothing,
}

/// Turns button/motion/release into drag events.
///
/// A press on a card only arms the sensor. The drag starts on the first
/// motion away from the press position, so a plain click stays a click.
#[derive(Debug, Default)]
pub struct PointerSensor {
    armed: Option<Armed>,
    active: bool,
}

impl PointerSensor {
    pub fn press(&mut self, lead_id: LeadId, column_id: ColumnId, x: u16, y: u16) {
        self.armed = Some(Armed { lead_id, column_id, origin: (x, y) });
        self.active = false;
    }

    /// Pointer moved with the button held, over `hit` (the column under it).
    pub fn motion(&mut self, x: u16, y: u16, hit: Option<ColumnId>) -> Vec<DragEvent> {
        let Some(armed) = self.armed.as_ref() else {
            return Vec::new();
        };
        if self.active {
            return vec![DragEvent::Over(hit)];
        }
        if armed.origin == (x, y) {
            return Vec::new();
        }
        self.active = true;
        vec![
            DragEvent::Start { lead_id: armed.lead_id.clone(), column_id: armed.column_id.clone() },
            DragEvent::Over(hit),
        ]
    }

    pub fn release(&mut self) -> Release {
        let armed = self.armed.take();
        let was_active = std::mem::take(&mut self.active);
        match armed {
            Some(_) if was_active => Release::Drop,
            Some(armed) => Release::Click(armed.lead_id),
            None => Release::Nothing,
        }
    }

    pub fn reset(&mut self) {
        self.armed = None;
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(id: &str) -> ColumnId {
        ColumnId::from(id)
    }

    fn started() -> DragController {
        let mut ctl = DragController::new();
        assert!(ctl.start(LeadId::from("L1"), col("new")));
        ctl
    }

    #[test]
    fn start_enters_dragging_and_sets_flag() {
        let ctl = started();
        assert_eq!(ctl.phase(), DragPhase::Dragging);
        assert!(ctl.flag().is_dragging());
        let state = ctl.state().unwrap();
        assert_eq!(state.source_column_id, col("new"));
    }

    #[test]
    fn drop_on_other_column_emits_one_intent() {
        let mut ctl = started();
        let flag = ctl.flag();
        ctl.over(Some(col("contacted")));
        assert_eq!(ctl.end(), DropOutcome::Moved);
        assert_eq!(ctl.phase(), DragPhase::Committing);
        assert!(flag.is_dragging(), "clicks stay suppressed until the intent is taken");

        let intent = ctl.take_intent().unwrap();
        assert_eq!(intent.lead_id, LeadId::from("L1"));
        assert_eq!(intent.from_column_id, col("new"));
        assert_eq!(intent.to_column_id, col("contacted"));
        assert_eq!(ctl.phase(), DragPhase::Idle);
        assert!(!flag.is_dragging());
        assert!(ctl.take_intent().is_none());
    }

    #[test]
    fn hover_away_then_back_to_origin_is_noop() {
        let mut ctl = started();
        ctl.over(Some(col("contacted")));
        ctl.over(Some(col("new")));
        assert_eq!(ctl.end(), DropOutcome::Unchanged);
        assert!(ctl.take_intent().is_none());
        assert_eq!(ctl.phase(), DragPhase::Idle);
    }

    #[test]
    fn drop_outside_any_column_is_noop() {
        let mut ctl = started();
        ctl.over(None);
        assert_eq!(ctl.end(), DropOutcome::Unchanged);
        assert!(ctl.take_intent().is_none());
    }

    #[test]
    fn cancel_discards_state() {
        let mut ctl = started();
        ctl.over(Some(col("won")));
        assert!(ctl.cancel());
        assert_eq!(ctl.phase(), DragPhase::Idle);
        assert!(!ctl.flag().is_dragging());
        assert_eq!(ctl.end(), DropOutcome::Ignored);
        assert!(ctl.take_intent().is_none());
    }

    #[test]
    fn events_while_idle_are_ignored() {
        let mut ctl = DragController::new();
        assert!(!ctl.over(Some(col("won"))));
        assert_eq!(ctl.end(), DropOutcome::Ignored);
        assert!(!ctl.cancel());
    }

    #[test]
    fn second_start_is_ignored() {
        let mut ctl = started();
        assert!(!ctl.start(LeadId::from("L2"), col("won")));
        assert_eq!(ctl.state().unwrap().dragged_lead_id, LeadId::from("L1"));
    }

    #[test]
    fn dispatch_drives_full_cycle() {
        let mut ctl = DragController::new();
        assert_eq!(ctl.dispatch(DragEvent::Start { lead_id: LeadId::from("L1"), column_id: col("new") }), None);
        assert_eq!(ctl.dispatch(DragEvent::Over(Some(col("won")))), None);
        assert_eq!(ctl.dispatch(DragEvent::End), Some(DropOutcome::Moved));
        assert_eq!(ctl.take_intent().unwrap().to_column_id, col("won"));
    }

    #[test]
    fn cancel_after_commit_keeps_intent() {
        let mut ctl = started();
        ctl.over(Some(col("won")));
        ctl.end();
        assert!(!ctl.cancel());
        assert!(ctl.take_intent().is_some());
    }

    #[test]
    fn pointer_click_without_motion_is_click() {
        let mut sensor = PointerSensor::default();
        sensor.press(LeadId::from("L1"), col("new"), 10, 4);
        assert!(sensor.motion(10, 4, Some(col("new"))).is_empty());
        assert_eq!(sensor.release(), Release::Click(LeadId::from("L1")));
    }

    #[test]
    fn pointer_motion_starts_drag_then_tracks() {
        let mut sensor = PointerSensor::default();
        sensor.press(LeadId::from("L1"), col("new"), 10, 4);
        let events = sensor.motion(11, 4, Some(col("new")));
        assert_eq!(
            events,
            vec![
                DragEvent::Start { lead_id: LeadId::from("L1"), column_id: col("new") },
                DragEvent::Over(Some(col("new"))),
            ]
        );
        assert_eq!(sensor.motion(40, 4, Some(col("won"))), vec![DragEvent::Over(Some(col("won")))]);
        assert_eq!(sensor.release(), Release::Drop);
        assert_eq!(sensor.release(), Release::Nothing);
    }

    #[test]
    fn motion_without_press_is_ignored() {
        let mut sensor = PointerSensor::default();
        assert!(sensor.motion(1, 1, None).is_empty());
    }
}
