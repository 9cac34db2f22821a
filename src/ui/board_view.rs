use std::ops::Range;

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Padding, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Widget,
};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use super::theme::{parse_hex, Theme};
use crate::app::App;
use crate::board::partition::ColumnLeads;
use crate::board::store::LoadState;
use crate::board::{Lead, LeadStatus};
use crate::tags::TagSnapshot;

/// Screen geometry of one column: the bordered block and the card list inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSlot {
    pub outer: Rect,
    pub list: Rect,
}

fn column_frame() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .padding(Padding::new(1, 1, 0, 0))
}

/// Split the board area evenly among `count` columns.
///
/// Rendering and mouse hit-testing both use this, so a pointer position maps
/// to exactly the card drawn under it.
pub fn column_slots(area: Rect, count: usize) -> Vec<ColumnSlot> {
    if count == 0 {
        return Vec::new();
    }
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count as u32)).collect();
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area)
        .iter()
        .map(|&outer| ColumnSlot { outer, list: column_frame().inner(outer) })
        .collect()
}

/// Rows of a column worth drawing at its current scroll offset.
pub fn column_window(app: &App, column: &ColumnLeads, slot: &ColumnSlot) -> Range<usize> {
    let count = column.leads.len();
    let scroll = app.state.scroll_for(&column.column.id, count, slot.list.height);
    app.state.viewport(slot.list.height).range(scroll, count)
}

/// Total display width of an icon list, including one-space separators between items.
pub(crate) fn total_icon_width(icons: &[(&str, Style)]) -> usize {
    icons.iter().map(|(t, _)| t.width()).sum::<usize>() + icons.len().saturating_sub(1)
}

/// Return the subset of `candidates` that fits within `avail_width`.
///
/// Icons are dropped from the left (least important first) until the remaining
/// set fits. Input order is preserved in the output.
pub(crate) fn fit_icons<'a>(candidates: &[(&'a str, Style)], avail_width: usize) -> Vec<(&'a str, Style)> {
    let mut start = 0;
    while start + 1 < candidates.len() && total_icon_width(&candidates[start..]) > avail_width {
        start += 1;
    }
    let remaining = &candidates[start..];
    if total_icon_width(remaining) > avail_width {
        return Vec::new();
    }
    remaining.to_vec()
}

/// Truncate to `max_width` display columns on grapheme boundaries, adding `…` when cut.
pub(crate) fn truncate(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let avail = max_width.saturating_sub(1);
    let truncated: String = text
        .graphemes(true)
        .scan(0, |w, g| {
            let gw = g.width();
            (*w + gw <= avail).then(|| {
                *w += gw;
                g
            })
        })
        .collect();
    if max_width == 0 {
        truncated
    } else {
        format!("{truncated}…")
    }
}

pub fn render_board(f: &mut Frame, area: Rect, app: &App) {
    if app.store.columns().is_empty() {
        let msg = match app.store.load_state() {
            LoadState::Failed(err) => format!("Could not load the board: {err}. Press r to retry."),
            _ => "Loading board…".to_string(),
        };
        f.render_widget(Paragraph::new(msg).style(Theme::dim_style()), area);
        return;
    }

    let part = app.partition();
    let slots = column_slots(area, part.columns().len());
    let tags = app.tags.snapshot();
    for (idx, (column, slot)) in part.columns().iter().zip(&slots).enumerate() {
        render_column(f, app, idx, column, slot, &tags);
    }
}

fn render_column(f: &mut Frame, app: &App, idx: usize, column: &ColumnLeads, slot: &ColumnSlot, tags: &TagSnapshot) {
    let is_focused = app.state.focused_column == idx;
    let drag = app.drag.state();
    let is_drop_target = drag.is_some_and(|d| d.candidate_column_id.as_ref() == Some(&column.column.id));
    let accent = column.column.color.as_deref().and_then(parse_hex);

    let focused_mod = if is_focused { Modifier::BOLD } else { Modifier::empty() };
    let mut header = vec![Span::raw(" ")];
    if let Some(color) = accent {
        header.push(Span::styled("● ", Style::default().fg(color)));
    }
    header.push(Span::styled(
        format!("{} ", column.column.name),
        Style::default().fg(Theme::COLUMN_HEADER).add_modifier(Modifier::BOLD),
    ));
    header.push(Span::styled(format!("({})", column.leads.len()), Theme::dim_style()));

    let border_color = if is_drop_target { Theme::DROP_TARGET } else { Theme::COLUMN_BORDER };
    let block = column_frame()
        .border_type(if is_drop_target { BorderType::Thick } else { BorderType::Rounded })
        .border_style(Style::default().fg(border_color).add_modifier(focused_mod))
        .title(Line::from(header));
    f.render_widget(block, slot.outer);

    let list = slot.list;
    if list.height == 0 || list.width == 0 {
        return;
    }

    if column.leads.is_empty() {
        f.render_widget(Paragraph::new("No leads").style(Theme::dim_style()), Rect::new(list.x, list.y, list.width, 1));
        return;
    }

    let count = column.leads.len();
    let row_height = app.state.row_height;
    let scroll = app.state.scroll_for(&column.column.id, count, list.height);
    let window = column_window(app, column, slot);

    for row in window {
        let Some(lead) = column.leads.get(row) else { break };
        // Card position relative to the top of the list, in lines.
        let top = row as i64 * row_height as i64 - scroll as i64;
        let bottom = top + row_height as i64;
        if bottom <= 0 || top >= list.height as i64 {
            continue;
        }
        let look = CardLook {
            selected: is_focused && app.state.selected_lead == row,
            column_focused: is_focused,
            dragged: drag.is_some_and(|d| d.dragged_lead_id == lead.id),
            pending: app.coordinator.is_in_flight(&lead.id),
        };
        let mut card = Buffer::empty(Rect::new(0, 0, list.width, row_height));
        render_card(&mut card, lead, look, tags);
        blit_rows(f.buffer_mut(), &card, list, top);
    }

    if app.state.viewport(list.height).max_scroll(count) > 0 {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight);
        let max = app.state.viewport(list.height).max_scroll(count) as usize;
        let mut scrollbar_state = ScrollbarState::new(max).position(scroll as usize);
        f.render_stateful_widget(scrollbar, slot.outer, &mut scrollbar_state);
    }
}

/// Copy the rows of an offscreen card that fall inside `list`.
///
/// `top` is the card's first line relative to `list.y` and may be negative,
/// so a card cut by the top or bottom edge shows only its visible part.
fn blit_rows(dst: &mut Buffer, card: &Buffer, list: Rect, top: i64) {
    for line in 0..card.area.height {
        let y = top + line as i64;
        if y < 0 || y >= list.height as i64 {
            continue;
        }
        for x in 0..card.area.width {
            if let (Some(src), Some(cell)) = (card.cell((x, line)), dst.cell_mut((list.x + x, list.y + y as u16))) {
                *cell = src.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CardLook {
    selected: bool,
    column_focused: bool,
    dragged: bool,
    /// A move for this lead is waiting on the backend.
    pending: bool,
}

fn card_border_color(look: CardLook) -> Color {
    if look.dragged {
        Theme::DRAGGED
    } else if look.column_focused {
        Theme::CARD_BORDER
    } else {
        Theme::DIM
    }
}

fn render_card(buf: &mut Buffer, lead: &Lead, look: CardLook, tags: &TagSnapshot) {
    let area = buf.area;
    if area.width < 4 || area.height < 3 {
        return;
    }
    let selected_mod = if look.selected { Modifier::BOLD } else { Modifier::empty() };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(card_border_color(look)).add_modifier(selected_mod))
        .border_type(if look.selected || look.dragged { BorderType::Thick } else { BorderType::Rounded });
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 || inner.width < 2 {
        return;
    }

    // Right-side glyphs, least important first.
    let mut candidates: Vec<(&str, Style)> = Vec::new();
    match lead.status {
        LeadStatus::Won => candidates.push(("✓", Style::default().fg(Theme::WON))),
        LeadStatus::Lost => candidates.push(("✗", Style::default().fg(Theme::LOST))),
        LeadStatus::Open => {}
    }
    if look.pending {
        candidates.push(("⟳", Style::default().fg(Theme::PENDING)));
    }
    let name_budget = (inner.width as usize).saturating_sub(2);
    let glyphs = fit_icons(&candidates, name_budget / 2);
    let glyphs_width = total_icon_width(&glyphs);
    let name_width = name_budget.saturating_sub(if glyphs.is_empty() { 0 } else { glyphs_width + 1 });

    // Line 1: marker, name, glyphs on the right.
    let marker = if look.selected { "› " } else { "  " };
    let name = truncate(&lead.name, name_width);
    let padding = (inner.width as usize).saturating_sub(2 + name.width() + glyphs_width);
    let mut line1 = vec![
        Span::styled(marker, Style::default().add_modifier(selected_mod)),
        Span::styled(name, Style::default().fg(Theme::CARD_TITLE).add_modifier(selected_mod)),
        Span::raw(" ".repeat(padding)),
    ];
    for (i, (text, style)) in glyphs.into_iter().enumerate() {
        if i > 0 {
            line1.push(Span::raw(" "));
        }
        line1.push(Span::styled(text, style));
    }
    Paragraph::new(Line::from(line1)).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);

    // Line 2: company and contact.
    if inner.height >= 2 {
        let detail: Vec<&str> = [lead.company.as_deref(), lead.email.as_deref().or(lead.phone.as_deref())]
            .into_iter()
            .flatten()
            .collect();
        if !detail.is_empty() {
            let text = truncate(&detail.join(" · "), (inner.width as usize).saturating_sub(2));
            Paragraph::new(Line::from(vec![Span::raw("  "), Span::styled(text, Theme::dim_style())]))
                .render(Rect::new(inner.x, inner.y + 1, inner.width, 1), buf);
        }
    }

    // Line 3: tags.
    if inner.height >= 3 && !lead.tags.is_empty() {
        let mut spans = vec![Span::raw("  ")];
        for (i, id) in lead.tags.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" · ", Theme::dim_style()));
            }
            let (label, color) = match tags.get(id) {
                Some(tag) => (tag.name.clone(), Theme::tag_color(tag)),
                None => (id.to_string(), Theme::DIM),
            };
            spans.push(Span::styled(label, Style::default().fg(color).add_modifier(selected_mod)));
        }
        Paragraph::new(Line::from(spans)).render(Rect::new(inner.x, inner.y + 2, inner.width, 1), buf);
    }
}
