/// Which pause-menu overlay is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum MenuState {
    #[default]
    Closed,
    Main,
    SaveSelection,
    LoadSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuInput {
    Open,
    Resume,
    Save,
    Load,
    Quit,
    Escape,
}

/// Side effects the session carries out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MenuEffect {
    None,
    ListSaves,
    Quit,
}

impl MenuState {
    pub(crate) fn is_open(self) -> bool {
        self != Self::Closed
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Main => "main",
            Self::SaveSelection => "save selection",
            Self::LoadSelection => "load selection",
        }
    }

    /// Inputs that make no sense in the current state leave it unchanged.
    pub(crate) fn apply(self, input: MenuInput) -> (MenuState, MenuEffect) {
        match (self, input) {
            (Self::Closed, MenuInput::Open | MenuInput::Escape) => (Self::Main, MenuEffect::None),
            (Self::Main, MenuInput::Resume | MenuInput::Escape) => (Self::Closed, MenuEffect::None),
            (Self::Main, MenuInput::Save) => (Self::SaveSelection, MenuEffect::ListSaves),
            (Self::Main, MenuInput::Load) => (Self::LoadSelection, MenuEffect::ListSaves),
            (Self::Main, MenuInput::Quit) => (Self::Closed, MenuEffect::Quit),
            (Self::SaveSelection | Self::LoadSelection, MenuInput::Escape) => {
                (Self::Main, MenuEffect::None)
            }
            (state, _) => (state, MenuEffect::None),
        }
    }

    /// State after a save or load picked from a selection list finishes.
    pub(crate) fn after_selection(self) -> MenuState {
        match self {
            Self::SaveSelection | Self::LoadSelection => Self::Closed,
            other => other,
        }
    }
}
