use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::action::Action;
use crate::app::Mode;

/// Map a key event to a semantic action based on current mode.
pub fn map_key(key: KeyEvent, mode: &Mode) -> Action {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    match mode {
        Mode::Normal => map_normal(key),
        Mode::Drag => map_drag(key),
        Mode::Input { .. } => map_input(key),
        Mode::Picker { .. } => map_picker(key),
        Mode::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') => Action::ClosePanel,
            _ => Action::None,
        },
        Mode::LeadDetail { .. } => match key.code {
            KeyCode::Esc | KeyCode::Char('q') => Action::ClosePanel,
            KeyCode::Char('t') => Action::EditTags,
            KeyCode::Char('j') | KeyCode::Down => Action::DetailNextLead,
            KeyCode::Char('k') | KeyCode::Up => Action::DetailPrevLead,
            _ => Action::None,
        },
    }
}

fn map_normal(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => Action::FocusPrevColumn,
        KeyCode::Char('l') | KeyCode::Right => Action::FocusNextColumn,
        KeyCode::Char('j') | KeyCode::Down => Action::SelectNextLead,
        KeyCode::Char('k') | KeyCode::Up => Action::SelectPrevLead,
        KeyCode::Char('g') | KeyCode::Home => Action::JumpToFirstLead,
        KeyCode::Char('G') | KeyCode::End => Action::JumpToLastLead,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Char('m') => Action::GrabLead,
        KeyCode::Char('n') => Action::NewLead,
        KeyCode::Char('t') => Action::EditTags,
        KeyCode::Enter => Action::OpenLeadDetail,
        KeyCode::Char('/') => Action::StartSearch,
        KeyCode::Char('s') => Action::PickStatus,
        KeyCode::Char('r') => Action::Reload,
        KeyCode::Char('?') => Action::ShowHelp,
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Esc => Action::ClearFilters,
        _ => Action::None,
    }
}

/// While dragging only the drag keys do anything.
fn map_drag(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('h') | KeyCode::Left => Action::DragPrevColumn,
        KeyCode::Char('l') | KeyCode::Right => Action::DragNextColumn,
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('m') => Action::DropLead,
        KeyCode::Esc => Action::CancelDrag,
        _ => Action::None,
    }
}

fn map_input(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Enter => Action::InputConfirm,
        KeyCode::Esc => Action::InputCancel,
        KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::InputHome,
        KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::InputEnd,
        KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Action::InputDeleteWord
        }
        KeyCode::Char(c) => Action::InputChar(c),
        KeyCode::Backspace => Action::InputBackspace,
        KeyCode::Left => Action::InputLeft,
        KeyCode::Right => Action::InputRight,
        KeyCode::Home => Action::InputHome,
        KeyCode::End => Action::InputEnd,
        _ => Action::None,
    }
}

fn map_picker(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Action::PickerDown,
        KeyCode::Char('k') | KeyCode::Up => Action::PickerUp,
        KeyCode::Enter | KeyCode::Char(' ') => Action::InputConfirm,
        KeyCode::Esc | KeyCode::Char('q') => Action::InputCancel,
        _ => Action::None,
    }
}

// ---------------------------------------------------------------------------
// Binding registry, used by the help overlay and status bar hints.
// ---------------------------------------------------------------------------

/// A documented keybinding for display in help and hints.
pub struct Binding {
    pub key: &'static str,
    pub description: &'static str,
}

/// A group of related bindings (one section in help).
pub struct BindingGroup {
    pub name: &'static str,
    pub bindings: &'static [Binding],
}

pub const NORMAL_BINDINGS: &[Binding] = &[
    Binding { key: "h / l", description: "Switch columns" },
    Binding { key: "j / k", description: "Move between leads" },
    Binding { key: "g / G", description: "First / last lead" },
    Binding { key: "PgUp/PgDn", description: "Scroll column" },
    Binding { key: "Enter", description: "Open lead detail" },
    Binding { key: "n", description: "New lead in column" },
    Binding { key: "t", description: "Edit tags" },
    Binding { key: "r", description: "Reload board" },
    Binding { key: "?", description: "Help" },
    Binding { key: "q", description: "Quit" },
];

pub const DRAG_BINDINGS: &[Binding] = &[
    Binding { key: "m", description: "Grab selected lead" },
    Binding { key: "h / l", description: "Choose target column" },
    Binding { key: "Enter", description: "Drop lead" },
    Binding { key: "Esc", description: "Cancel drag" },
    Binding { key: "mouse", description: "Drag a card to another column" },
];

pub const FILTER_BINDINGS: &[Binding] = &[
    Binding { key: "/", description: "Search leads" },
    Binding { key: "s", description: "Filter by status" },
    Binding { key: "Esc", description: "Clear filters" },
];

pub const DETAIL_BINDINGS: &[Binding] = &[
    Binding { key: "j / k", description: "Next/prev lead" },
    Binding { key: "t", description: "Edit tags" },
    Binding { key: "Esc", description: "Close" },
];

/// All binding groups for the help overlay.
pub const HELP_GROUPS: &[BindingGroup] = &[
    BindingGroup { name: "Board", bindings: NORMAL_BINDINGS },
    BindingGroup { name: "Moving leads", bindings: DRAG_BINDINGS },
    BindingGroup { name: "Filters", bindings: FILTER_BINDINGS },
    BindingGroup { name: "Lead Detail", bindings: DETAIL_BINDINGS },
];
