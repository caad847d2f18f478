use serde::Serialize;

/// Whether the companion process can still be talked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    NotStarted,
    Running,
    Crashed,
    Closed,
}

/// What the companion last reported about its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Unknown,
    Shown,
    Hidden,
}

/// Liveness and visibility change independently; `Crashed` and `Closed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UiLifecycleState {
    pub liveness: Liveness,
    pub visibility: Visibility,
}

impl Default for UiLifecycleState {
    fn default() -> Self {
        Self {
            liveness: Liveness::NotStarted,
            visibility: Visibility::Unknown,
        }
    }
}

impl UiLifecycleState {
    pub fn running() -> Self {
        Self {
            liveness: Liveness::Running,
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.liveness, Liveness::Crashed | Liveness::Closed)
    }

    pub fn is_running(&self) -> bool {
        self.liveness == Liveness::Running
    }

    /// Move to `next`, refusing to leave a terminal state. Returns whether anything changed.
    pub(crate) fn set_liveness(&mut self, next: Liveness) -> bool {
        if self.is_terminal() || self.liveness == next {
            return false;
        }
        self.liveness = next;
        true
    }

    pub(crate) fn set_visibility(&mut self, next: Visibility) -> bool {
        if self.visibility == next {
            return false;
        }
        self.visibility = next;
        true
    }
}
