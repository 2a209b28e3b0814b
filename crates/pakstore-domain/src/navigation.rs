//! Screen navigation as a pure state machine.
//!
//! Each [`Screen`] carries its own typed input, each screen reports an
//! [`Action`], and [`transition`] is the only place that decides what comes
//! next. List positions travel through [`NavStack`] so that returning to a
//! list restores the row the user left from.

use crate::model::Pak;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListPosition {
    pub index: usize,
    pub visible_start: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    PakList,
    Updates,
    ManageInstalled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    MainMenu,
    Browse {
        resume: Option<ListPosition>,
    },
    PakList {
        category: String,
        resume: Option<ListPosition>,
    },
    PakInfo {
        paks: Vec<Pak>,
        category: Option<String>,
        is_update: bool,
        is_installed: bool,
        origin: Origin,
    },
    Updates {
        resume: Option<ListPosition>,
    },
    ManageInstalled {
        resume: Option<ListPosition>,
    },
    Settings,
    Info,
    Exit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Back,
    Quit,
    OpenBrowse,
    OpenUpdates,
    OpenManageInstalled,
    OpenSettings,
    OpenInfo,
    SettingsSaved,
    CategorySelected {
        category: String,
        position: ListPosition,
    },
    PakSelected {
        pak: Box<Pak>,
        position: ListPosition,
        is_installed: bool,
        has_update: bool,
    },
    UpdatesSelected {
        paks: Vec<Pak>,
        position: ListPosition,
    },
    InstalledSelected {
        pak: Box<Pak>,
        position: ListPosition,
    },
    InstallSucceeded,
    Uninstalled,
    PartialUpdate,
    Cancelled,
    PakStoreUpdated,
    Failed,
}

/// Screens to return to, each with the position it was left at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NavStack {
    entries: Vec<Screen>,
}

impl NavStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, screen: Screen) {
        self.entries.push(screen);
    }

    pub fn pop(&mut self) -> Option<Screen> {
        self.entries.pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop back to the list screen `origin` refers to, falling back to a
    /// fresh one when the stack holds something else.
    fn return_to(&mut self, origin: Origin, category: Option<&str>) -> Screen {
        let fallback = match origin {
            Origin::PakList => Screen::PakList {
                category: category.unwrap_or_default().to_string(),
                resume: None,
            },
            Origin::Updates => Screen::Updates { resume: None },
            Origin::ManageInstalled => Screen::ManageInstalled { resume: None },
        };
        match self.pop() {
            Some(screen) if same_kind(&screen, &fallback) => screen,
            Some(other) => {
                self.push(other);
                fallback
            }
            None => fallback,
        }
    }
}

fn same_kind(a: &Screen, b: &Screen) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Next screen for `action` reported by `current`.
///
/// Combinations with no defined meaning end the session, the same way an
/// unknown screen result did in the interactive store.
pub fn transition(current: &Screen, action: Action, stack: &mut NavStack) -> Screen {
    match (current, action) {
        (_, Action::Quit | Action::PakStoreUpdated) => Screen::Exit,

        (Screen::MainMenu, Action::OpenBrowse) => Screen::Browse { resume: None },
        (Screen::MainMenu, Action::OpenUpdates) => Screen::Updates { resume: None },
        (Screen::MainMenu, Action::OpenManageInstalled) => Screen::ManageInstalled { resume: None },
        (Screen::MainMenu, Action::OpenSettings) => Screen::Settings,
        (Screen::MainMenu, Action::Back | Action::Failed) => Screen::Exit,

        (Screen::Browse { .. }, Action::CategorySelected { category, position }) => {
            stack.push(Screen::Browse {
                resume: Some(position),
            });
            Screen::PakList {
                category,
                resume: None,
            }
        }
        (Screen::Browse { .. }, Action::Back) => Screen::MainMenu,

        (
            Screen::PakList { category, .. },
            Action::PakSelected {
                pak,
                position,
                is_installed,
                has_update,
            },
        ) => {
            stack.push(Screen::PakList {
                category: category.clone(),
                resume: Some(position),
            });
            Screen::PakInfo {
                paks: vec![*pak],
                category: Some(category.clone()),
                is_update: has_update,
                is_installed,
                origin: Origin::PakList,
            }
        }
        (Screen::PakList { .. }, Action::Back) => match stack.pop() {
            Some(screen @ Screen::Browse { .. }) => screen,
            Some(other) => {
                stack.push(other);
                Screen::Browse { resume: None }
            }
            None => Screen::Browse { resume: None },
        },

        (Screen::Updates { .. }, Action::UpdatesSelected { paks, position }) => {
            stack.push(Screen::Updates {
                resume: Some(position),
            });
            Screen::PakInfo {
                paks,
                category: None,
                is_update: true,
                is_installed: false,
                origin: Origin::Updates,
            }
        }
        (Screen::Updates { .. } | Screen::ManageInstalled { .. } | Screen::Settings, Action::Back) => {
            Screen::MainMenu
        }

        (Screen::ManageInstalled { .. }, Action::InstalledSelected { pak, position }) => {
            stack.push(Screen::ManageInstalled {
                resume: Some(position),
            });
            Screen::PakInfo {
                paks: vec![*pak],
                category: None,
                is_update: false,
                is_installed: true,
                origin: Origin::ManageInstalled,
            }
        }

        (Screen::PakInfo { paks, category, origin, .. }, Action::InstallSucceeded) => {
            Screen::PakInfo {
                paks: paks.clone(),
                category: category.clone(),
                is_update: false,
                is_installed: true,
                origin: *origin,
            }
        }
        (Screen::PakInfo { paks, category, origin, .. }, Action::Uninstalled) => match origin {
            Origin::PakList => Screen::PakInfo {
                paks: paks.clone(),
                category: category.clone(),
                is_update: false,
                is_installed: false,
                origin: *origin,
            },
            _ => stack.return_to(*origin, category.as_deref()),
        },
        (Screen::PakInfo { category, .. }, Action::PartialUpdate) => {
            stack.return_to(Origin::Updates, category.as_deref())
        }
        (current @ Screen::PakInfo { .. }, Action::Cancelled) => current.clone(),
        (Screen::PakInfo { category, origin, .. }, Action::Back | Action::Failed) => {
            stack.return_to(*origin, category.as_deref())
        }

        (Screen::Settings, Action::SettingsSaved) => Screen::MainMenu,
        (Screen::Settings, Action::OpenInfo) => Screen::Info,
        (Screen::Info, Action::Back) => Screen::Settings,

        _ => Screen::Exit,
    }
}
