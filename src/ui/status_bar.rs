use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use super::theme::Theme;
use crate::app::{App, AppState, Mode, NotificationLevel};
use crate::board::store::LoadState;

pub fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    // Text input takes over the entire bar
    if let Some(line) = render_full_line_mode(&app.state) {
        f.render_widget(Paragraph::new(line).style(Theme::status_style()), area);
        return;
    }

    let left = build_left_zone(app);
    let right = build_right_zone(app);

    let left_width: usize = left.iter().map(|s| s.content.width()).sum();
    let right_width: usize = right.iter().map(|s| s.content.width()).sum();
    let center_avail = (area.width as usize).saturating_sub(left_width + right_width);
    let center = build_center_zone(&app.state, center_avail);

    let mut spans = left;
    spans.extend(center);
    spans.extend(right);
    f.render_widget(Paragraph::new(Line::from(spans)).style(Theme::status_style()), area);
}

fn mode_label(mode: &Mode) -> &'static str {
    match mode {
        Mode::Normal => "NORMAL",
        Mode::Drag => "DRAG",
        Mode::Picker { .. } => "PICKER",
        Mode::LeadDetail { .. } => "DETAIL",
        Mode::Help => "HELP",
        Mode::Input { .. } => "",
    }
}

/// Mode badge, pipeline and active filters.
fn build_left_zone(app: &App) -> Vec<Span<'_>> {
    let badge_color = if matches!(app.state.mode, Mode::Drag) { Theme::MODE_BADGE } else { Theme::FG };
    let mut spans = vec![
        Span::styled(
            format!(" {} ", mode_label(&app.state.mode)),
            Style::default().fg(badge_color).add_modifier(Modifier::BOLD | Modifier::REVERSED),
        ),
        Span::raw(" "),
        Span::styled(format!("{} ", app.store.pipeline_id()), Theme::dim_style()),
    ];

    let filters = app.store.filters();
    if let Some(ref search) = filters.search {
        spans.push(Span::raw(format!("/{search} ")));
    }
    if let Some(status) = filters.status {
        spans.push(Span::styled(format!("status:{status} "), Style::default().fg(Theme::status_color(status))));
    }
    if let Some(ref responsible) = filters.responsible {
        spans.push(Span::raw(format!("@{responsible} ")));
    }
    if !filters.tag_ids.is_empty() {
        let snapshot = app.tags.snapshot();
        for id in &filters.tag_ids {
            let (label, color) = match snapshot.get(id) {
                Some(tag) => (tag.name.clone(), Theme::tag_color(tag)),
                None => (id.to_string(), Theme::DIM),
            };
            spans.push(Span::styled(format!("#{label} "), Style::default().fg(color)));
        }
    }
    spans
}

/// Pending moves, load state and position in the focused column.
fn build_right_zone(app: &App) -> Vec<Span<'_>> {
    let mut spans = Vec::new();

    let pending = app.coordinator.in_flight_count();
    if pending > 0 {
        spans.push(Span::styled(format!("⟳ {pending} "), Style::default().fg(Theme::PENDING)));
    }
    match app.store.load_state() {
        LoadState::Loading => spans.push(Span::styled("loading… ", Theme::dim_style())),
        LoadState::Failed(_) => spans.push(Span::styled("offline ", Style::default().fg(Theme::STATUS_ERROR))),
        LoadState::Idle | LoadState::Loaded => {}
    }

    let part = app.partition();
    spans.push(Span::styled(format!("{} leads  ", part.total()), Theme::dim_style()));
    if let Some(col) = part.columns().get(app.state.focused_column) {
        let count = col.leads.len();
        let pos = if count > 0 {
            format!(" {}/{}", app.state.selected_lead + 1, count)
        } else {
            " 0".to_string()
        };
        spans.push(Span::styled(format!("{}[{}]", col.column.name, count), Theme::dim_style()));
        spans.push(Span::raw(pos));
    }

    spans.push(Span::raw(" "));
    spans
}

/// Notification text centered in the available width.
fn build_center_zone(state: &AppState, avail_width: usize) -> Vec<Span<'_>> {
    let Some(ref notif) = state.notification else {
        return vec![Span::raw(" ".repeat(avail_width))];
    };
    let color = match state.notification_level {
        NotificationLevel::Info => Theme::FG,
        NotificationLevel::Error => Theme::STATUS_ERROR,
    };
    let notif_width = notif.width();
    if notif_width >= avail_width {
        let truncated = super::board_view::truncate(notif, avail_width);
        return vec![Span::styled(truncated, Style::default().fg(color))];
    }
    let pad_total = avail_width - notif_width;
    let pad_left = pad_total / 2;
    vec![
        Span::raw(" ".repeat(pad_left)),
        Span::styled(notif.as_str(), Style::default().fg(color)),
        Span::raw(" ".repeat(pad_total - pad_left)),
    ]
}

fn render_full_line_mode(state: &AppState) -> Option<Line<'_>> {
    match &state.mode {
        Mode::Input { prompt, buf, .. } => {
            let (before, after): (String, String) = {
                let split = buf.input.char_indices().nth(buf.cursor).map_or(buf.input.len(), |(i, _)| i);
                (buf.input[..split].to_string(), buf.input[split..].to_string())
            };
            Some(Line::from(vec![
                Span::styled(
                    format!(" {prompt} "),
                    Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD | Modifier::REVERSED),
                ),
                Span::raw(format!(" {before}")),
                Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
                Span::raw(after),
            ]))
        }
        _ => None,
    }
}
