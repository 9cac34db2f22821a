pub mod board_view;
pub mod help;
pub mod input_modal;
pub mod lead_detail;
pub mod status_bar;
pub mod theme;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;

use crate::app::{App, Mode};
use crate::input::keymap::DRAG_BINDINGS;

/// Create a centered rect within `area` using percentage-based sizing with minimums.
pub fn centered_rect(area: Rect, w_pct: u16, h_pct: u16, min_w: u16, min_h: u16) -> Rect {
    let width = (area.width * w_pct / 100).max(min_w).min(area.width);
    let height = (area.height * h_pct / 100).max(min_h).min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}

/// Panel used for the lead detail overlay.
pub fn overlay_rect(area: Rect) -> Rect {
    centered_rect(area, 60, 70, 40, 14)
}

fn split(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// The part of the screen the columns are drawn in.
pub fn board_area(area: Rect) -> Rect {
    split(area).0
}

pub fn render(f: &mut Frame, app: &App) {
    let (board, status) = split(f.area());

    board_view::render_board(f, board, app);
    status_bar::render_status_bar(f, status, app);

    match &app.state.mode {
        Mode::Drag => {
            input_modal::render_hint_popup(f, board, "moving", &DRAG_BINDINGS[1..]);
        }
        Mode::Picker { title, items, selected, .. } => {
            input_modal::render_picker(f, board, title, items, *selected);
        }
        Mode::LeadDetail { lead_id } => {
            if let Some(lead) = app.store.get(lead_id) {
                let column = app.store.column(&lead.column_id);
                let pending = app.coordinator.is_in_flight(lead_id);
                lead_detail::render_lead_detail(f, f.area(), lead, column, &app.tags.snapshot(), pending);
            }
        }
        Mode::Help => help::render_help(f, f.area()),
        Mode::Normal | Mode::Input { .. } => {}
    }
}
