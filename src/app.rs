use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::WrapErr;
use crossterm::event::{Event, EventStream, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use futures::StreamExt;
use ratatui::layout::{Position, Rect};
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::backend::{BackendError, LeadBackend};
use crate::board::partition::{partition, Partition};
use crate::board::store::LeadStore;
use crate::board::window::Viewport;
use crate::board::{Column, ColumnId, Lead, LeadFilters, LeadId, LeadStatus, NewLead, PipelineId, TagId};
use crate::config::BoardSection;
use crate::coordinator::{MoveCommand, MoveCoordinator, Submitted};
use crate::drag::{DragController, DragFlag, DropOutcome, MoveIntent, PointerSensor, Release};
use crate::input::action::Action;
use crate::input::keymap::map_key;
use crate::tags::{SubscriptionId, TagCache};
use crate::ui::board_view::{self, ColumnSlot};

/// Reusable text editing buffer with cursor.
///
/// `cursor` is a **char index** (not byte index), always in `0..=char_count`.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    pub input: String,
    pub cursor: usize,
}

impl TextBuffer {
    pub fn new(input: String) -> Self {
        let cursor = input.chars().count();
        Self { input, cursor }
    }

    pub fn empty() -> Self {
        Self { input: String::new(), cursor: 0 }
    }

    fn byte_offset(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    pub fn insert(&mut self, c: char) {
        let byte_idx = self.byte_offset(self.cursor);
        self.input.insert(byte_idx, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let byte_idx = self.byte_offset(self.cursor - 1);
            self.input.remove(byte_idx);
            self.cursor -= 1;
        }
    }

    pub fn delete_word(&mut self) {
        let byte_pos = self.byte_offset(self.cursor);
        let trimmed = self.input[..byte_pos].trim_end();
        let start_byte = trimmed
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let start_char = self.input[..start_byte].chars().count();
        self.input.drain(start_byte..byte_pos);
        self.cursor = start_char;
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}

/// Current interaction mode.
#[derive(Debug, Clone)]
pub enum Mode {
    Normal,
    /// A lead is being dragged with the mouse or the keyboard.
    Drag,
    Input {
        prompt: &'static str,
        buf: TextBuffer,
        on_confirm: InputTarget,
    },
    Picker {
        title: &'static str,
        items: Vec<(String, bool)>,
        selected: usize,
        target: PickerTarget,
    },
    LeadDetail {
        lead_id: LeadId,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputTarget {
    Search,
    NewLeadTitle(ColumnId),
    EditTags(LeadId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerTarget {
    Status,
}

/// Notification severity for statusbar coloring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Completion of a background call, delivered to the loop.
#[derive(Debug)]
pub enum AppEvent {
    ColumnsLoaded(Result<Vec<Column>, BackendError>),
    LeadsLoaded {
        generation: u64,
        result: Result<Vec<Lead>, BackendError>,
    },
    MoveSettled {
        lead_id: LeadId,
        result: Result<(), BackendError>,
    },
    LeadCreated(Result<Lead, BackendError>),
    LeadTagsSaved {
        lead_id: LeadId,
        result: Result<Vec<TagId>, BackendError>,
    },
    /// The tag cache published a new state.
    TagsChanged,
    TagsFailed(BackendError),
}

const INFO_TTL: Duration = Duration::from_secs(3);
const ERROR_TTL: Duration = Duration::from_secs(8);

/// UI state: focus, selection, scroll and notifications.
pub struct AppState {
    pub mode: Mode,
    pub focused_column: usize,
    pub selected_lead: usize,
    scroll: HashMap<ColumnId, u32>,
    pub row_height: u16,
    pub overscan: u16,
    /// Board area of the last frame, used for mouse hit-testing.
    pub board_area: Rect,
    pub notification: Option<String>,
    pub notification_level: NotificationLevel,
    pub notification_expires: Option<Instant>,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(row_height: u16, overscan: u16) -> Self {
        Self {
            mode: Mode::Normal,
            focused_column: 0,
            selected_lead: 0,
            scroll: HashMap::new(),
            row_height: row_height.max(1),
            overscan: overscan.max(1),
            board_area: Rect::default(),
            notification: None,
            notification_level: NotificationLevel::Info,
            notification_expires: None,
            should_quit: false,
        }
    }

    /// Show a transient notification.
    pub fn notify(&mut self, msg: impl Into<String>) {
        self.notification = Some(msg.into());
        self.notification_level = NotificationLevel::Info;
        self.notification_expires = Some(Instant::now() + INFO_TTL);
    }

    /// Show an error notification (rendered in red). Esc dismisses it early.
    pub fn notify_error(&mut self, msg: impl Into<String>) {
        self.notification = Some(msg.into());
        self.notification_level = NotificationLevel::Error;
        self.notification_expires = Some(Instant::now() + ERROR_TTL);
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
        self.notification_level = NotificationLevel::Info;
        self.notification_expires = None;
    }

    pub fn has_error(&self) -> bool {
        self.notification.is_some() && self.notification_level == NotificationLevel::Error
    }

    /// Clear expired notifications.
    pub fn tick_notification(&mut self) {
        if let Some(expires) = self.notification_expires {
            if Instant::now() >= expires {
                self.dismiss_notification();
            }
        }
    }

    pub fn viewport(&self, height: u16) -> Viewport {
        Viewport::new(self.row_height as u32, height as u32, self.overscan as u32)
    }

    /// Scroll offset of a column in lines, clamped to its content.
    pub fn scroll_for(&self, column_id: &ColumnId, item_count: usize, height: u16) -> u32 {
        let stored = self.scroll.get(column_id).copied().unwrap_or(0);
        self.viewport(height).clamp_scroll(stored, item_count)
    }
}

/// A mouse position resolved against the board layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hit {
    column: usize,
    /// Row index within the column, when the pointer is over a card.
    row: Option<usize>,
}

/// Everything the board owns: store, coordinator, drag, tags and UI state.
pub struct App {
    pub state: AppState,
    pub store: LeadStore,
    pub coordinator: MoveCoordinator,
    pub drag: DragController,
    pub tags: TagCache,
    tag_subscription: SubscriptionId,
    pointer: PointerSensor,
    drag_flag: DragFlag,
    backend: Arc<dyn LeadBackend>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl Drop for App {
    fn drop(&mut self) {
        // The cache outlives the board inside spawned fetches.
        self.tags.unsubscribe(self.tag_subscription);
    }
}

impl App {
    pub fn new(
        backend: Arc<dyn LeadBackend>,
        pipeline_id: PipelineId,
        board: &BoardSection,
    ) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let tags = TagCache::new(backend.clone(), board.tag_ttl());
        let tx = events.clone();
        let tag_subscription = tags.subscribe(move |_| {
            let _ = tx.send(AppEvent::TagsChanged);
        });
        let drag = DragController::new();
        let drag_flag = drag.flag();
        let app = Self {
            state: AppState::new(board.row_height, board.overscan),
            store: LeadStore::new(pipeline_id),
            coordinator: MoveCoordinator::new(),
            drag,
            tags,
            tag_subscription,
            pointer: PointerSensor::default(),
            drag_flag,
            backend,
            events,
        };
        (app, rx)
    }

    pub fn partition(&self) -> Partition<'_> {
        partition(self.store.leads(), self.store.columns(), self.store.filters())
    }

    pub fn column_slots(&self) -> Vec<ColumnSlot> {
        board_view::column_slots(self.state.board_area, self.store.columns().len())
    }

    fn column_id_at(&self, index: usize) -> Option<ColumnId> {
        self.store.columns().get(index).map(|c| c.id.clone())
    }

    fn column_len(&self, index: usize) -> usize {
        self.partition().columns().get(index).map_or(0, |c| c.leads.len())
    }

    fn lead_at(&self, column: usize, row: usize) -> Option<(LeadId, ColumnId)> {
        let part = self.partition();
        let col = part.columns().get(column)?;
        let lead = col.leads.get(row)?;
        Some((lead.id.clone(), col.column.id.clone()))
    }

    /// The selected lead and its column.
    pub fn selected(&self) -> Option<(LeadId, ColumnId)> {
        self.lead_at(self.state.focused_column, self.state.selected_lead)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Fetch columns, leads and tags.
    pub fn reload(&mut self) {
        self.load_columns();
        self.load_leads();
        self.tags.invalidate();
        self.load_tags();
    }

    /// Periodic refresh: leads always, tags once their TTL has run out.
    pub fn refresh(&mut self) {
        self.load_leads();
        if !self.tags.is_fresh() {
            self.load_tags();
        }
    }

    fn load_columns(&self) {
        let backend = self.backend.clone();
        let pipeline_id = self.store.pipeline_id().clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.list_active_columns(&pipeline_id).await;
            let _ = tx.send(AppEvent::ColumnsLoaded(result));
        });
    }

    fn load_leads(&mut self) {
        let generation = self.store.begin_load();
        let backend = self.backend.clone();
        let pipeline_id = self.store.pipeline_id().clone();
        let filters = self.store.filters().clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.list_leads(&pipeline_id, &filters).await;
            let _ = tx.send(AppEvent::LeadsLoaded { generation, result });
        });
    }

    fn load_tags(&self) {
        let cache = self.tags.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.tags().await {
                let _ = tx.send(AppEvent::TagsFailed(e));
            }
        });
    }

    fn spawn_move(&self, cmd: MoveCommand) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = backend.update_lead_column(&cmd.lead_id, &cmd.to_column_id).await;
            let _ = tx.send(AppEvent::MoveSettled { lead_id: cmd.lead_id, result });
        });
    }

    fn create_lead(&self, name: String, column_id: ColumnId) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        let new = NewLead { name, pipeline_id: self.store.pipeline_id().clone(), column_id };
        tokio::spawn(async move {
            let result = backend.create_lead(&new).await;
            let _ = tx.send(AppEvent::LeadCreated(result));
        });
    }

    fn save_lead_tags(&self, lead_id: LeadId, names: Vec<String>) {
        let cache = self.tags.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = assign_tags(&cache, &lead_id, names).await;
            let _ = tx.send(AppEvent::LeadTagsSaved { lead_id, result });
        });
    }

    /// Apply the outcome of a background call.
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ColumnsLoaded(Ok(columns)) => {
                self.store.set_columns(columns);
                self.clamp_selection();
            }
            AppEvent::ColumnsLoaded(Err(e)) => {
                tracing::warn!(error = %e, "column fetch failed");
                self.state.notify_error(format!("Could not load columns: {e}. Press r to retry"));
            }
            AppEvent::LeadsLoaded { generation, result: Ok(leads) } => {
                let count = leads.len();
                if self.store.hydrate(generation, leads) {
                    self.coordinator.reapply(&mut self.store);
                    tracing::debug!(generation, count, "leads loaded");
                    self.clamp_selection();
                }
            }
            AppEvent::LeadsLoaded { generation, result: Err(e) } => {
                if self.store.fail_load(generation, e.to_string()) {
                    tracing::warn!(generation, error = %e, "lead fetch failed");
                    self.state.notify_error(format!("Could not load leads: {e}. Press r to retry"));
                }
            }
            AppEvent::MoveSettled { lead_id, result } => {
                let settled = self.coordinator.settle(&lead_id, result, &mut self.store);
                if let Some(next) = settled.next {
                    self.spawn_move(next);
                }
                if let Some(rejected) = settled.rejected {
                    self.state.notify_error(rejected.to_string());
                }
                self.clamp_selection();
            }
            AppEvent::LeadCreated(Ok(lead)) => {
                let name = lead.name.clone();
                let id = lead.id.clone();
                self.store.upsert(lead);
                self.follow(&id);
                self.state.notify(format!("Created {name}"));
            }
            AppEvent::LeadCreated(Err(e)) => {
                self.state.notify_error(format!("Could not create lead: {e}"));
            }
            AppEvent::LeadTagsSaved { lead_id, result: Ok(tag_ids) } => {
                self.store.set_lead_tags(&lead_id, tag_ids);
                self.state.notify("Tags updated");
            }
            AppEvent::LeadTagsSaved { lead_id, result: Err(e) } => {
                tracing::warn!(lead = %lead_id, error = %e, "saving tags failed");
                self.state.notify_error(format!("Could not save tags: {e}"));
            }
            // Redrawn by the loop.
            AppEvent::TagsChanged => {}
            AppEvent::TagsFailed(e) => {
                tracing::warn!(error = %e, "tag fetch failed");
                self.state.notify_error(format!("Could not load tags: {e}. Press r to retry"));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Selection & scrolling
    // -----------------------------------------------------------------------

    fn clamp_selection(&mut self) {
        let columns = self.store.columns().len();
        self.state.focused_column = self.state.focused_column.min(columns.saturating_sub(1));
        let len = self.column_len(self.state.focused_column);
        self.state.selected_lead = self.state.selected_lead.min(len.saturating_sub(1));
    }

    /// Focus and select a lead wherever it currently sits.
    fn follow(&mut self, lead_id: &LeadId) {
        let located = self.partition().locate(lead_id);
        if let Some((column, row)) = located {
            self.state.focused_column = column;
            self.state.selected_lead = row;
            self.ensure_selection_visible();
        }
    }

    fn ensure_selection_visible(&mut self) {
        let Some(column_id) = self.column_id_at(self.state.focused_column) else {
            return;
        };
        let Some(slot) = self.column_slots().get(self.state.focused_column).copied() else {
            return;
        };
        let viewport = self.state.viewport(slot.list.height);
        let current = self.state.scroll.get(&column_id).copied().unwrap_or(0);
        let offset = viewport.scroll_to_row(current, self.state.selected_lead);
        self.state.scroll.insert(column_id, offset);
    }

    fn scroll_column(&mut self, column: usize, lines: i64) {
        let Some(column_id) = self.column_id_at(column) else {
            return;
        };
        let Some(slot) = self.column_slots().get(column).copied() else {
            return;
        };
        let count = self.column_len(column);
        let current = self.state.scroll_for(&column_id, count, slot.list.height) as i64;
        let target = (current + lines).max(0) as u32;
        let clamped = self.state.viewport(slot.list.height).clamp_scroll(target, count);
        self.state.scroll.insert(column_id, clamped);
    }

    fn rows_per_page(&self) -> usize {
        let height = self
            .column_slots()
            .get(self.state.focused_column)
            .map_or(0, |s| s.list.height);
        (height / self.state.row_height).max(1) as usize
    }

    // -----------------------------------------------------------------------
    // Drag & move
    // -----------------------------------------------------------------------

    fn begin_drag(&mut self) {
        let Some((lead_id, column_id)) = self.selected() else {
            return;
        };
        if self.drag.start(lead_id, column_id) {
            self.state.mode = Mode::Drag;
        }
    }

    /// Keyboard sensor: move the drop candidate one column over.
    fn shift_candidate(&mut self, forward: bool) {
        let Some(drag) = self.drag.state() else {
            return;
        };
        let columns = self.store.columns();
        let current = drag.candidate_column_id.as_ref().unwrap_or(&drag.source_column_id);
        let Some(idx) = columns.iter().position(|c| &c.id == current) else {
            return;
        };
        let next = if forward { (idx + 1).min(columns.len() - 1) } else { idx.saturating_sub(1) };
        let target = columns[next].id.clone();
        self.drag.over(Some(target));
    }

    fn finish_drag(&mut self) {
        self.pointer.reset();
        self.state.mode = Mode::Normal;
        match self.drag.end() {
            DropOutcome::Moved => {
                if let Some(intent) = self.drag.take_intent() {
                    self.submit(intent);
                }
            }
            DropOutcome::Unchanged | DropOutcome::Ignored => {}
        }
    }

    fn cancel_drag(&mut self) {
        self.drag.cancel();
        self.pointer.reset();
        self.state.mode = Mode::Normal;
    }

    /// Hand a finished drag to the coordinator and send its backend call.
    pub fn submit(&mut self, intent: MoveIntent) {
        let lead_id = intent.lead_id.clone();
        match self.coordinator.submit(intent, &mut self.store) {
            Submitted::Issued(cmd) => {
                self.follow(&lead_id);
                self.spawn_move(cmd);
            }
            Submitted::Queued => self.state.notify("Move queued behind the previous one"),
            Submitted::Dropped(_) => self.clamp_selection(),
        }
    }

    /// Open a lead's detail overlay, unless a drag is in progress.
    pub fn on_lead_click(&mut self, lead_id: &LeadId) {
        if self.drag_flag.is_dragging() {
            tracing::debug!(lead = %lead_id, "click suppressed during drag");
            return;
        }
        if self.store.contains(lead_id) {
            self.state.mode = Mode::LeadDetail { lead_id: lead_id.clone() };
        }
    }

    /// Open the quick-add prompt for a column.
    pub fn on_create_lead(&mut self, column_id: ColumnId) {
        self.state.mode = Mode::Input {
            prompt: "New lead",
            buf: TextBuffer::empty(),
            on_confirm: InputTarget::NewLeadTitle(column_id),
        };
    }

    fn apply_filters(&mut self, filters: LeadFilters) {
        if self.store.set_filters(filters) {
            self.state.selected_lead = 0;
            self.state.scroll.clear();
            self.load_leads();
        }
    }

    // -----------------------------------------------------------------------
    // Terminal input
    // -----------------------------------------------------------------------

    pub fn handle_terminal_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                let action = map_key(key, &self.state.mode);
                process_action(self, action);
            }
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    fn hit_test(&self, x: u16, y: u16) -> Option<Hit> {
        let pos = Position::new(x, y);
        let slots = self.column_slots();
        let (column, slot) = slots.iter().enumerate().find(|(_, s)| s.outer.contains(pos))?;
        let row = if slot.list.contains(pos) {
            let count = self.column_len(column);
            let column_id = self.column_id_at(column)?;
            let scroll = self.state.scroll_for(&column_id, count, slot.list.height);
            let index = ((y - slot.list.y) as u32 + scroll) / self.state.row_height as u32;
            ((index as usize) < count).then_some(index as usize)
        } else {
            None
        };
        Some(Hit { column, row })
    }

    /// Mouse sensor: press arms, motion drags, release clicks or drops.
    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if !matches!(self.state.mode, Mode::Normal | Mode::Drag) {
            return;
        }
        let (x, y) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(Hit { column, row: Some(row) }) = self.hit_test(x, y) else {
                    return;
                };
                if let Some((lead_id, column_id)) = self.lead_at(column, row) {
                    if !self.drag_flag.is_dragging() {
                        self.state.focused_column = column;
                        self.state.selected_lead = row;
                    }
                    self.pointer.press(lead_id, column_id, x, y);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let over = self.hit_test(x, y).and_then(|hit| self.column_id_at(hit.column));
                for event in self.pointer.motion(x, y, over) {
                    self.drag.dispatch(event);
                }
                if self.drag.is_dragging() {
                    self.state.mode = Mode::Drag;
                }
            }
            MouseEventKind::Up(MouseButton::Left) => match self.pointer.release() {
                Release::Click(lead_id) => self.on_lead_click(&lead_id),
                Release::Drop => self.finish_drag(),
                Release::Nothing => {}
            },
            MouseEventKind::ScrollDown => {
                if let Some(hit) = self.hit_test(x, y) {
                    self.scroll_column(hit.column, self.state.row_height as i64);
                }
            }
            MouseEventKind::ScrollUp => {
                if let Some(hit) = self.hit_test(x, y) {
                    self.scroll_column(hit.column, -(self.state.row_height as i64));
                }
            }
            _ => {}
        }
    }
}

/// Resolve tag names against the cache, creating unknown ones, then assign them.
async fn assign_tags(cache: &TagCache, lead_id: &LeadId, names: Vec<String>) -> Result<Vec<TagId>, BackendError> {
    let known = match cache.tags().await {
        Ok(tags) => tags,
        Err(_) => cache.snapshot().tags,
    };
    let mut tags = Vec::with_capacity(names.len());
    for name in names {
        let existing = known
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(&name) || t.id.as_str() == name)
            .cloned();
        let tag = match existing {
            Some(tag) => tag,
            None => cache.create_tag(&name, None).await?,
        };
        tags.push(tag);
    }
    cache.set_lead_tags(lead_id, tags).await
}

/// Split comma-separated tag input, dropping blanks and case-insensitive duplicates.
fn parse_tag_names(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// Main TUI application loop.
pub async fn run(
    terminal: &mut DefaultTerminal,
    mut app: App,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
    refresh_every: Option<Duration>,
) -> color_eyre::Result<()> {
    let mut input = EventStream::new();
    let mut tick = tokio::time::interval(Duration::from_millis(250));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut refresh = refresh_every.map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    app.reload();

    loop {
        terminal.draw(|f| {
            app.state.board_area = crate::ui::board_area(f.area());
            crate::ui::render(f, &app);
        })?;

        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(event)) => app.handle_terminal_event(event),
                Some(Err(e)) => return Err(e).wrap_err("failed to read terminal input"),
                None => break,
            },
            Some(event) = events.recv() => app.handle_event(event),
            _ = tick.tick() => app.state.tick_notification(),
            _ = next_refresh(&mut refresh) => app.refresh(),
        }

        if app.state.should_quit {
            break;
        }
    }

    Ok(())
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn process_action(app: &mut App, action: Action) {
    match action {
        Action::None => {}

        // Navigation
        Action::FocusPrevColumn
        | Action::FocusNextColumn
        | Action::SelectPrevLead
        | Action::SelectNextLead
        | Action::JumpToFirstLead
        | Action::JumpToLastLead
        | Action::PageUp
        | Action::PageDown => handle_navigation(app, action),

        // Keyboard drag
        Action::GrabLead => app.begin_drag(),
        Action::DragPrevColumn => app.shift_candidate(false),
        Action::DragNextColumn => app.shift_candidate(true),
        Action::DropLead => app.finish_drag(),
        Action::CancelDrag => app.cancel_drag(),

        // Lead actions
        Action::NewLead
        | Action::OpenLeadDetail
        | Action::EditTags
        | Action::ClosePanel
        | Action::DetailNextLead
        | Action::DetailPrevLead => handle_lead_action(app, action),

        // Filters
        Action::StartSearch => {
            let current = app.store.filters().search.clone().unwrap_or_default();
            app.state.mode = Mode::Input {
                prompt: "Search",
                buf: TextBuffer::new(current),
                on_confirm: InputTarget::Search,
            };
        }
        Action::PickStatus => {
            let active = app.store.filters().status;
            let mut items = vec![("any".to_string(), active.is_none())];
            items.extend(LeadStatus::ALL.iter().map(|s| (s.as_str().to_string(), active == Some(*s))));
            let selected = items.iter().position(|(_, on)| *on).unwrap_or(0);
            app.state.mode = Mode::Picker { title: "status", items, selected, target: PickerTarget::Status };
        }
        Action::ClearFilters => {
            if app.state.has_error() {
                app.state.dismiss_notification();
            } else if !app.store.filters().is_empty() {
                app.apply_filters(LeadFilters::default());
                app.state.notify("Filters cleared");
            }
        }

        // Text input
        Action::InputChar(_)
        | Action::InputBackspace
        | Action::InputLeft
        | Action::InputRight
        | Action::InputHome
        | Action::InputEnd
        | Action::InputDeleteWord
        | Action::PickerUp
        | Action::PickerDown
        | Action::InputConfirm
        | Action::InputCancel => handle_input(app, action),

        // Board
        Action::Reload => {
            app.reload();
            app.state.notify("Reloading");
        }
        Action::ShowHelp => app.state.mode = Mode::Help,
        Action::Quit => match app.state.mode {
            Mode::Normal => app.state.should_quit = true,
            Mode::Drag => app.cancel_drag(),
            _ => app.state.mode = Mode::Normal,
        },
    }
}

// ---------------------------------------------------------------------------
// Handler: Navigation (column focus, lead selection, paging)
// ---------------------------------------------------------------------------

fn handle_navigation(app: &mut App, action: Action) {
    let columns = app.store.columns().len();
    match action {
        Action::FocusPrevColumn => {
            app.state.focused_column = app.state.focused_column.saturating_sub(1);
            app.clamp_selection();
        }
        Action::FocusNextColumn => {
            if app.state.focused_column + 1 < columns {
                app.state.focused_column += 1;
            }
            app.clamp_selection();
        }
        Action::SelectPrevLead => {
            app.state.selected_lead = app.state.selected_lead.saturating_sub(1);
        }
        Action::SelectNextLead => {
            if app.state.selected_lead + 1 < app.column_len(app.state.focused_column) {
                app.state.selected_lead += 1;
            }
        }
        Action::JumpToFirstLead => app.state.selected_lead = 0,
        Action::JumpToLastLead => {
            app.state.selected_lead = app.column_len(app.state.focused_column).saturating_sub(1);
        }
        Action::PageUp => {
            app.state.selected_lead = app.state.selected_lead.saturating_sub(app.rows_per_page());
        }
        Action::PageDown => {
            app.state.selected_lead += app.rows_per_page();
            app.clamp_selection();
        }
        _ => unreachable!(),
    }
    app.ensure_selection_visible();
}

// ---------------------------------------------------------------------------
// Handler: Lead actions (quick-add, detail overlay, tags)
// ---------------------------------------------------------------------------

fn handle_lead_action(app: &mut App, action: Action) {
    match action {
        Action::NewLead => {
            if let Some(column_id) = app.column_id_at(app.state.focused_column) {
                app.on_create_lead(column_id);
            }
        }
        Action::OpenLeadDetail => {
            if let Some((lead_id, _)) = app.selected() {
                app.on_lead_click(&lead_id);
            }
        }
        Action::EditTags => {
            let lead_id = match &app.state.mode {
                Mode::LeadDetail { lead_id } => Some(lead_id.clone()),
                _ => app.selected().map(|(id, _)| id),
            };
            let Some(lead) = lead_id.and_then(|id| app.store.get(&id)) else {
                return;
            };
            let snapshot = app.tags.snapshot();
            let current: Vec<String> = lead
                .tags
                .iter()
                .map(|id| snapshot.get(id).map_or_else(|| id.to_string(), |t| t.name.clone()))
                .collect();
            app.state.mode = Mode::Input {
                prompt: "Tags (comma-separated)",
                buf: TextBuffer::new(current.join(", ")),
                on_confirm: InputTarget::EditTags(lead.id.clone()),
            };
        }
        Action::ClosePanel => app.state.mode = Mode::Normal,
        Action::DetailNextLead | Action::DetailPrevLead => {
            if matches!(action, Action::DetailNextLead) {
                if app.state.selected_lead + 1 < app.column_len(app.state.focused_column) {
                    app.state.selected_lead += 1;
                }
            } else {
                app.state.selected_lead = app.state.selected_lead.saturating_sub(1);
            }
            app.ensure_selection_visible();
            if let Some((lead_id, _)) = app.selected() {
                app.state.mode = Mode::LeadDetail { lead_id };
            }
        }
        _ => unreachable!(),
    }
}

// ---------------------------------------------------------------------------
// Handler: Text input and pickers
// ---------------------------------------------------------------------------

fn handle_input(app: &mut App, action: Action) {
    match action {
        Action::InputChar(c) => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.insert(c);
            }
        }
        Action::InputBackspace => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.backspace();
            }
        }
        Action::InputLeft => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.move_left();
            }
        }
        Action::InputRight => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.move_right();
            }
        }
        Action::InputHome => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.home();
            }
        }
        Action::InputEnd => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.end();
            }
        }
        Action::InputDeleteWord => {
            if let Mode::Input { buf, .. } = &mut app.state.mode {
                buf.delete_word();
            }
        }
        Action::PickerUp => {
            if let Mode::Picker { selected, .. } = &mut app.state.mode {
                *selected = selected.saturating_sub(1);
            }
        }
        Action::PickerDown => {
            if let Mode::Picker { selected, items, .. } = &mut app.state.mode {
                if *selected + 1 < items.len() {
                    *selected += 1;
                }
            }
        }
        Action::InputConfirm => handle_input_confirm(app),
        Action::InputCancel => app.state.mode = Mode::Normal,
        _ => unreachable!(),
    }
}

/// Process InputConfirm for Input and Picker modes.
fn handle_input_confirm(app: &mut App) {
    let old_mode = std::mem::replace(&mut app.state.mode, Mode::Normal);
    match old_mode {
        Mode::Input { buf, on_confirm: InputTarget::Search, .. } => {
            let query = buf.input.trim();
            let mut filters = app.store.filters().clone();
            filters.search = (!query.is_empty()).then(|| query.to_string());
            app.apply_filters(filters);
        }
        Mode::Input { buf, on_confirm: InputTarget::NewLeadTitle(column_id), .. } => {
            let name = buf.input.trim();
            if !name.is_empty() {
                app.create_lead(name.to_string(), column_id);
            }
        }
        Mode::Input { buf, on_confirm: InputTarget::EditTags(lead_id), .. } => {
            app.save_lead_tags(lead_id, parse_tag_names(&buf.input));
        }
        Mode::Picker { selected, target: PickerTarget::Status, .. } => {
            let mut filters = app.store.filters().clone();
            filters.status = selected.checked_sub(1).and_then(|i| LeadStatus::ALL.get(i).copied());
            app.apply_filters(filters);
        }
        other => app.state.mode = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::board::store::LoadState;
    use crate::board::{Pipeline, Tag};
    use chrono::Utc;
    use crossterm::event::KeyModifiers;

    const BOARD: Rect = Rect { x: 0, y: 0, width: 120, height: 40 };

    fn lead(id: &str, name: &str, column: &str, minutes_ago: i64) -> Lead {
        let mut lead = Lead::new(id, name, PipelineId::from("sales"), ColumnId::from(column));
        lead.updated_at = Utc::now() - chrono::Duration::minutes(minutes_ago);
        lead
    }

    /// Three columns: new (Ada, Grace), contacted (Alan), won (empty).
    fn seeded() -> Arc<MemoryBackend> {
        let backend = MemoryBackend::new();
        let sales = PipelineId::from("sales");
        backend.add_pipeline(Pipeline { id: sales.clone(), name: "Sales".into() });
        for (i, (id, name)) in [("new", "New"), ("contacted", "Contacted"), ("won", "Won")].iter().enumerate() {
            backend.add_column(Column::new(*id, sales.clone(), *name, i as i32));
        }
        backend.add_lead(lead("l1", "Ada", "new", 1));
        backend.add_lead(lead("l2", "Grace", "new", 2));
        backend.add_lead(lead("l3", "Alan", "contacted", 3));
        backend.add_tag(Tag { id: TagId::from("vip"), name: "VIP".into(), color: None });
        Arc::new(backend)
    }

    /// Deliver background completions until the loop would go idle.
    async fn drain(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await {
            app.handle_event(event);
        }
    }

    async fn loaded(backend: &Arc<MemoryBackend>) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (mut app, mut rx) = App::new(backend.clone(), PipelineId::from("sales"), &BoardSection::default());
        app.state.board_area = BOARD;
        app.reload();
        drain(&mut app, &mut rx).await;
        (app, rx)
    }

    fn column_of(app: &App, id: &str) -> String {
        app.store.get(&LeadId::from(id)).map(|l| l.column_id.to_string()).unwrap_or_default()
    }

    fn mouse(kind: MouseEventKind, x: u16, y: u16) -> MouseEvent {
        MouseEvent { kind, column: x, row: y, modifiers: KeyModifiers::NONE }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            process_action(app, Action::InputChar(c));
        }
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn reload_hydrates_store_and_tags() {
        let backend = seeded();
        let (app, _rx) = loaded(&backend).await;
        assert_eq!(app.store.columns().len(), 3);
        assert_eq!(app.store.leads().len(), 3);
        assert_eq!(app.store.load_state(), &LoadState::Loaded);
        assert!(app.tags.snapshot().get(&TagId::from("vip")).is_some());
        // Most recently updated first.
        assert_eq!(app.selected(), Some((LeadId::from("l1"), ColumnId::from("new"))));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_keeps_data_and_offers_retry() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        backend.set_fail_fetches(true);
        process_action(&mut app, Action::Reload);
        drain(&mut app, &mut rx).await;
        assert!(matches!(app.store.load_state(), LoadState::Failed(_)));
        assert_eq!(app.store.leads().len(), 3);
        assert!(app.state.has_error());
        assert!(app.state.notification.as_deref().unwrap_or("").contains("Press r to retry"));

        backend.set_fail_fetches(false);
        process_action(&mut app, Action::Reload);
        drain(&mut app, &mut rx).await;
        assert_eq!(app.store.load_state(), &LoadState::Loaded);
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn keyboard_drag_moves_optimistically_then_commits() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        process_action(&mut app, Action::GrabLead);
        assert!(matches!(app.state.mode, Mode::Drag));
        process_action(&mut app, Action::DragNextColumn);
        process_action(&mut app, Action::DropLead);

        // Visible before the backend answers.
        assert_eq!(column_of(&app, "l1"), "contacted");
        assert!(app.coordinator.is_in_flight(&LeadId::from("l1")));
        assert_eq!(app.selected(), Some((LeadId::from("l1"), ColumnId::from("contacted"))));
        assert!(matches!(app.state.mode, Mode::Normal));

        drain(&mut app, &mut rx).await;
        assert!(!app.coordinator.is_in_flight(&LeadId::from("l1")));
        assert_eq!(column_of(&app, "l1"), "contacted");
        assert_eq!(backend.lead(&LeadId::from("l1")).map(|l| l.column_id), Some(ColumnId::from("contacted")));
        assert!(!app.state.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_move_rolls_back_with_error() {
        let backend = seeded();
        backend.fail_moves_for(LeadId::from("l1"));
        let (mut app, mut rx) = loaded(&backend).await;

        process_action(&mut app, Action::GrabLead);
        process_action(&mut app, Action::DragNextColumn);
        process_action(&mut app, Action::DropLead);
        assert_eq!(column_of(&app, "l1"), "contacted");

        drain(&mut app, &mut rx).await;
        assert_eq!(column_of(&app, "l1"), "new");
        assert!(app.state.has_error());
        assert!(app.state.notification.as_deref().unwrap_or("").contains("could not move Ada to Contacted"));
        // One call, no retry.
        assert_eq!(backend.move_calls().len(), 1);

        process_action(&mut app, Action::ClearFilters);
        assert!(app.state.notification.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_drag_never_calls_backend() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        // Press on Ada's card, drag over "contacted", then Esc.
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 2));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 45, 2));
        assert_eq!(
            app.drag.state().and_then(|s| s.candidate_column_id.clone()),
            Some(ColumnId::from("contacted"))
        );
        process_action(&mut app, Action::CancelDrag);
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 45, 2));

        drain(&mut app, &mut rx).await;
        assert!(backend.move_calls().is_empty());
        assert_eq!(column_of(&app, "l1"), "new");
        assert!(!app.drag.is_dragging());
    }

    #[tokio::test(start_paused = true)]
    async fn mouse_drag_drops_on_column_under_pointer() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 2));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 50, 10));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 90, 10));
        assert!(matches!(app.state.mode, Mode::Drag));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 90, 10));
        assert_eq!(column_of(&app, "l1"), "won");

        drain(&mut app, &mut rx).await;
        assert_eq!(backend.move_calls(), vec![(LeadId::from("l1"), ColumnId::from("won"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_back_on_origin_column_never_calls_backend() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 2));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 50, 10));
        let candidate = app.drag.state().and_then(|d| d.candidate_column_id.clone());
        assert_eq!(candidate, Some(ColumnId::from("contacted")));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 10, 10));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 10, 10));

        drain(&mut app, &mut rx).await;
        assert!(backend.move_calls().is_empty());
        assert_eq!(column_of(&app, "l1"), "new");
        assert!(!app.coordinator.is_in_flight(&LeadId::from("l1")));
        assert!(matches!(app.state.mode, Mode::Normal));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_outside_columns_is_discarded() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 2));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 45, 45));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 45, 45));

        drain(&mut app, &mut rx).await;
        assert!(backend.move_calls().is_empty());
        assert!(!app.drag.is_dragging());
        assert!(matches!(app.state.mode, Mode::Normal));
    }

    #[tokio::test(start_paused = true)]
    async fn second_drag_while_in_flight_is_queued_then_sent() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;

        process_action(&mut app, Action::GrabLead);
        process_action(&mut app, Action::DragNextColumn);
        process_action(&mut app, Action::DropLead);
        assert_eq!(column_of(&app, "l1"), "contacted");

        // Selection followed the lead; drag it again before the first call settles.
        process_action(&mut app, Action::GrabLead);
        process_action(&mut app, Action::DragNextColumn);
        process_action(&mut app, Action::DropLead);
        assert_eq!(column_of(&app, "l1"), "contacted");
        assert_eq!(app.coordinator.in_flight_count(), 1);

        drain(&mut app, &mut rx).await;
        assert_eq!(column_of(&app, "l1"), "won");
        assert_eq!(
            backend.move_calls(),
            vec![
                (LeadId::from("l1"), ColumnId::from("contacted")),
                (LeadId::from("l1"), ColumnId::from("won")),
            ]
        );
        assert!(!app.coordinator.is_in_flight(&LeadId::from("l1")));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_during_flight_keeps_optimistic_column() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::GrabLead);
        process_action(&mut app, Action::DragNextColumn);
        process_action(&mut app, Action::DropLead);

        // A stale snapshot that still has Ada in "new".
        let generation = app.store.begin_load();
        app.handle_event(AppEvent::LeadsLoaded {
            generation,
            result: Ok(vec![lead("l1", "Ada", "new", 1), lead("l2", "Grace", "new", 2)]),
        });
        assert_eq!(column_of(&app, "l1"), "contacted");
        drain(&mut app, &mut rx).await;
    }

    // -----------------------------------------------------------------------
    // Clicks
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn click_opens_detail() {
        let backend = seeded();
        let (mut app, _rx) = loaded(&backend).await;
        // Second card of the first column.
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 7));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 5, 7));
        match &app.state.mode {
            Mode::LeadDetail { lead_id } => assert_eq!(lead_id, &LeadId::from("l2")),
            other => panic!("expected detail, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn click_is_suppressed_while_dragging() {
        let backend = seeded();
        let (mut app, _rx) = loaded(&backend).await;
        process_action(&mut app, Action::GrabLead);
        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 45, 2));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 45, 2));
        assert!(matches!(app.state.mode, Mode::Drag));
        assert!(app.drag.is_dragging());
    }

    // -----------------------------------------------------------------------
    // Filters, quick-add, tags
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn search_refreshes_store() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::StartSearch);
        type_text(&mut app, "grace");
        process_action(&mut app, Action::InputConfirm);
        assert_eq!(app.store.filters().search.as_deref(), Some("grace"));
        assert_eq!(app.store.load_state(), &LoadState::Loading);

        drain(&mut app, &mut rx).await;
        assert_eq!(app.store.leads().len(), 1);
        assert_eq!(app.partition().total(), 1);

        process_action(&mut app, Action::ClearFilters);
        drain(&mut app, &mut rx).await;
        assert!(app.store.filters().is_empty());
        assert_eq!(app.store.leads().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn status_picker_sets_filter() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::PickStatus);
        process_action(&mut app, Action::PickerDown);
        process_action(&mut app, Action::PickerDown);
        process_action(&mut app, Action::InputConfirm);
        assert_eq!(app.store.filters().status, Some(LeadStatus::Won));
        drain(&mut app, &mut rx).await;
        assert!(app.store.leads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quick_add_creates_lead_in_focused_column() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::FocusNextColumn);
        process_action(&mut app, Action::NewLead);
        assert!(matches!(
            &app.state.mode,
            Mode::Input { on_confirm: InputTarget::NewLeadTitle(col), .. } if col.as_str() == "contacted"
        ));
        type_text(&mut app, "Edsger");
        process_action(&mut app, Action::InputConfirm);
        drain(&mut app, &mut rx).await;

        let created = app.store.leads().iter().find(|l| l.name == "Edsger").cloned();
        assert_eq!(created.map(|l| l.column_id), Some(ColumnId::from("contacted")));
        assert_eq!(app.state.notification.as_deref(), Some("Created Edsger"));
    }

    #[tokio::test(start_paused = true)]
    async fn blank_quick_add_is_ignored() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::NewLead);
        type_text(&mut app, "   ");
        process_action(&mut app, Action::InputConfirm);
        drain(&mut app, &mut rx).await;
        assert_eq!(app.store.leads().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn editing_tags_creates_unknown_ones() {
        let backend = seeded();
        let (mut app, mut rx) = loaded(&backend).await;
        process_action(&mut app, Action::EditTags);
        process_action(&mut app, Action::InputDeleteWord);
        type_text(&mut app, "vip, Webinar, VIP");
        process_action(&mut app, Action::InputConfirm);
        drain(&mut app, &mut rx).await;

        let tags = app.store.get(&LeadId::from("l1")).map(|l| l.tags.clone()).unwrap_or_default();
        assert_eq!(tags, vec![TagId::from("vip"), TagId::from("webinar")]);
        assert!(app.tags.snapshot().get(&TagId::from("webinar")).is_some());
    }

    // -----------------------------------------------------------------------
    // Navigation & scrolling
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn navigation_clamps_to_columns() {
        let backend = seeded();
        let (mut app, _rx) = loaded(&backend).await;
        process_action(&mut app, Action::SelectNextLead);
        assert_eq!(app.state.selected_lead, 1);
        process_action(&mut app, Action::SelectNextLead);
        assert_eq!(app.state.selected_lead, 1);
        process_action(&mut app, Action::FocusNextColumn);
        assert_eq!(app.state.focused_column, 1);
        assert_eq!(app.state.selected_lead, 0);
        process_action(&mut app, Action::FocusNextColumn);
        process_action(&mut app, Action::FocusNextColumn);
        assert_eq!(app.state.focused_column, 2);
        assert_eq!(app.selected(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_scrolls_into_view() {
        let backend = Arc::new(MemoryBackend::new());
        let sales = PipelineId::from("sales");
        backend.add_column(Column::new("new", sales.clone(), "New", 0));
        for i in 0..100 {
            backend.add_lead(lead(&format!("l{i:03}"), "Lead", "new", i));
        }
        let (mut app, _rx) = loaded(&backend).await;
        process_action(&mut app, Action::JumpToLastLead);
        assert_eq!(app.state.selected_lead, 99);
        let column_id = ColumnId::from("new");
        let height = app.column_slots()[0].list.height;
        let scroll = app.state.scroll_for(&column_id, 100, height);
        let range = app.state.viewport(height).range(scroll, 100);
        assert!(range.contains(&99));
        assert!(range.len() <= app.state.viewport(height).max_rows() as usize);

        // Wheel scrolling stops at the top.
        for _ in 0..200 {
            app.handle_mouse(mouse(MouseEventKind::ScrollUp, 5, 5));
        }
        assert_eq!(app.state.scroll_for(&column_id, 100, height), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn quit_from_drag_cancels_instead() {
        let backend = seeded();
        let (mut app, _rx) = loaded(&backend).await;
        process_action(&mut app, Action::GrabLead);
        process_action(&mut app, Action::Quit);
        assert!(!app.state.should_quit);
        assert!(!app.drag.is_dragging());
        process_action(&mut app, Action::Quit);
        assert!(app.state.should_quit);
    }

    // -----------------------------------------------------------------------
    // Text buffer
    // -----------------------------------------------------------------------

    #[test]
    fn text_buffer_edits_by_char() {
        let mut buf = TextBuffer::new("héllo wörld".into());
        buf.delete_word();
        assert_eq!(buf.input, "héllo ");
        buf.move_left();
        buf.backspace();
        assert_eq!(buf.input, "héll ");
        buf.home();
        buf.insert('¡');
        assert_eq!(buf.input, "¡héll ");
        assert_eq!(buf.cursor, 1);
    }

    #[test]
    fn tag_names_are_trimmed_and_deduplicated() {
        assert_eq!(parse_tag_names(" vip, ,Hot ,VIP,hot "), vec!["vip".to_string(), "Hot".to_string()]);
    }
}
