/// All semantic actions the board understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Navigation
    FocusPrevColumn,
    FocusNextColumn,
    SelectPrevLead,
    SelectNextLead,
    JumpToFirstLead,
    JumpToLastLead,
    PageUp,
    PageDown,

    // Keyboard drag
    GrabLead,
    DragPrevColumn,
    DragNextColumn,
    DropLead,
    CancelDrag,

    // Lead actions
    NewLead,
    OpenLeadDetail,
    EditTags,
    ClosePanel,
    DetailNextLead,
    DetailPrevLead,

    // Search & filter
    StartSearch,
    PickStatus,
    ClearFilters,

    // Board
    Reload,
    ShowHelp,
    Quit,

    // Input modal
    InputConfirm,
    InputCancel,
    InputChar(char),
    InputBackspace,
    InputLeft,
    InputRight,
    InputHome,
    InputEnd,
    InputDeleteWord,
    PickerUp,
    PickerDown,

    // No-op
    None,
}
