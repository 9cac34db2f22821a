use ratatui::style::{Color, Style};

use crate::board::{LeadStatus, Tag};

/// Color theme for the board.
///
/// Text and chrome use the terminal's default foreground (Color::Reset).
/// Color is reserved for column accents, tags, lead status and drag feedback.
pub struct Theme;

impl Theme {
    pub const FG: Color = Color::Reset;
    pub const DIM: Color = Color::DarkGray;

    // Column
    pub const COLUMN_HEADER: Color = Color::Reset;
    pub const COLUMN_BORDER: Color = Color::Reset;
    pub const DROP_TARGET: Color = Color::Cyan;

    // Card
    pub const CARD_BORDER: Color = Color::Reset;
    pub const CARD_TITLE: Color = Color::Reset;
    pub const DRAGGED: Color = Color::Yellow;
    pub const PENDING: Color = Color::Yellow;

    // Lead status glyphs
    pub const WON: Color = Color::Green;
    pub const LOST: Color = Color::Red;

    // Status bar
    pub const STATUS_ERROR: Color = Color::Red;
    pub const MODE_BADGE: Color = Color::Cyan;

    // Hint popup
    pub const HINT_KEY: Color = Color::Reset;
    pub const HINT_DESC: Color = Color::Reset;

    pub fn dim_style() -> Style {
        Style::default().fg(Self::DIM)
    }

    pub fn status_style() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn status_color(status: LeadStatus) -> Color {
        match status {
            LeadStatus::Open => Self::FG,
            LeadStatus::Won => Self::WON,
            LeadStatus::Lost => Self::LOST,
        }
    }

    /// Color of a tag: its own hex color when set, otherwise a stable hash of its name.
    pub fn tag_color(tag: &Tag) -> Color {
        tag.color.as_deref().and_then(parse_hex).unwrap_or_else(|| Self::hashed_color(&tag.name))
    }

    /// Assign a consistent color to a label based on its text.
    pub fn hashed_color(label: &str) -> Color {
        let hash = label
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
        const PALETTE: [Color; 12] = [
            Color::Cyan,
            Color::Green,
            Color::Magenta,
            Color::Blue,
            Color::Yellow,
            Color::Red,
            Color::LightCyan,
            Color::LightGreen,
            Color::LightMagenta,
            Color::LightBlue,
            Color::LightYellow,
            Color::LightRed,
        ];
        PALETTE[(hash % PALETTE.len() as u32) as usize]
    }
}

/// Parse `#rrggbb` (or `rrggbb`) into an RGB color.
pub fn parse_hex(hex: &str) -> Option<Color> {
    let hex = hex.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}
