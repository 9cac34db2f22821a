use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::Frame;

use super::theme::{parse_hex, Theme};
use crate::board::{Column, Lead};
use crate::tags::TagSnapshot;

pub fn render_lead_detail(
    f: &mut Frame,
    area: Rect,
    lead: &Lead,
    column: Option<&Column>,
    tags: &TagSnapshot,
    pending: bool,
) {
    let panel_area = super::overlay_rect(area);
    f.render_widget(Clear, panel_area);

    let border_color = if pending { Theme::PENDING } else { Theme::FG };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            format!(" {} ", lead.id),
            Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD),
        ))
        .padding(Padding::new(2, 2, 1, 1));

    let inner = block.inner(panel_area);
    f.render_widget(block, panel_area);
    if inner.height == 0 {
        return;
    }

    let paragraph = Paragraph::new(detail_lines(lead, column, tags, pending)).wrap(Wrap { trim: false });
    f.render_widget(paragraph, inner);
}

fn field<'a>(label: &'static str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![Span::styled(label, Theme::dim_style()), value.into()])
}

fn detail_lines<'a>(lead: &'a Lead, column: Option<&'a Column>, tags: &TagSnapshot, pending: bool) -> Vec<Line<'a>> {
    let mut lines = vec![
        Line::from(Span::styled(
            lead.name.as_str(),
            Style::default().fg(Theme::FG).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let stage = match column {
        Some(col) => {
            let color = col.color.as_deref().and_then(parse_hex).unwrap_or(Theme::FG);
            Span::styled(col.name.as_str(), Style::default().fg(color))
        }
        None => Span::raw(lead.column_id.as_str()),
    };
    let mut stage_line = field("Stage:    ", stage);
    if pending {
        stage_line.spans.push(Span::styled("  ⟳ saving", Style::default().fg(Theme::PENDING)));
    }
    lines.push(stage_line);
    lines.push(field(
        "Status:   ",
        Span::styled(lead.status.as_str(), Style::default().fg(Theme::status_color(lead.status))),
    ));

    for (label, value) in [
        ("Company:  ", &lead.company),
        ("Email:    ", &lead.email),
        ("Phone:    ", &lead.phone),
        ("Owner:    ", &lead.responsible),
    ] {
        if let Some(value) = value {
            lines.push(field(label, Span::raw(value.as_str())));
        }
    }

    if !lead.tags.is_empty() {
        let mut spans = vec![Span::styled("Tags:     ", Theme::dim_style())];
        for (i, id) in lead.tags.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" · "));
            }
            match tags.get(id) {
                Some(tag) => spans.push(Span::styled(tag.name.clone(), Style::default().fg(Theme::tag_color(tag)))),
                None => spans.push(Span::styled(id.to_string(), Theme::dim_style())),
            }
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    lines.push(field(
        "Created:  ",
        Span::styled(lead.created_at.format("%Y-%m-%d %H:%M").to_string(), Theme::dim_style()),
    ));
    lines.push(field(
        "Updated:  ",
        Span::styled(lead.updated_at.format("%Y-%m-%d %H:%M").to_string(), Theme::dim_style()),
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{ColumnId, PipelineId, Tag, TagId};
    use crate::tags::TagStatus;
    use std::sync::Arc;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn lists_known_fields_and_resolves_tags() {
        let mut lead = Lead::new("L0001", "Ada Lovelace", PipelineId::from("sales"), ColumnId::from("new"));
        lead.company = Some("Analytical Engines".into());
        lead.tags = vec![TagId::from("vip"), TagId::from("gone")];
        let column = Column::new("new", PipelineId::from("sales"), "New", 0);
        let tags = TagSnapshot {
            tags: Arc::new(vec![Tag { id: TagId::from("vip"), name: "VIP".into(), color: None }]),
            status: TagStatus::Ready,
        };

        let out = text(&detail_lines(&lead, Some(&column), &tags, true));
        assert!(out.contains("Stage:    New  ⟳ saving"));
        assert!(out.contains("Company:  Analytical Engines"));
        assert!(!out.contains("Email:"));
        assert!(out.contains("Tags:     VIP · gone"));
    }
}
