//! The create-card workflow as a state machine.

/// Where the create dialog is. `Closed` initially; there is no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DialogState {
    #[default]
    Closed,
    Open,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogEvent {
    /// The user opened the dialog.
    Open,
    /// A valid form was submitted.
    Submit,
    /// The create call returned a card.
    Succeeded,
    /// The create call failed; the error is shown in the still-open dialog.
    Failed,
    /// Explicit cancel/close. In-flight calls keep running.
    Close,
    /// Drop transient submit state without changing visibility.
    Reset,
}

impl DialogState {
    /// Apply `event`. Events with no transition from the current state leave it unchanged.
    pub fn on(self, event: DialogEvent) -> DialogState {
        use DialogEvent as E;
        use DialogState as S;

        match (self, event) {
            (S::Closed, E::Open) => S::Open,
            (S::Open, E::Submit) => S::Submitting,
            (S::Submitting, E::Succeeded) => S::Closed,
            // A create that completes after the dialog was closed and reopened
            // still closes it.
            (S::Open, E::Succeeded) => S::Closed,
            (S::Submitting, E::Failed) => S::Open,
            (S::Open | S::Submitting, E::Close) => S::Closed,
            (S::Submitting, E::Reset) => S::Open,
            (state, _) => state,
        }
    }

    pub fn is_open(self) -> bool {
        self != DialogState::Closed
    }

    pub fn is_submitting(self) -> bool {
        self == DialogState::Submitting
    }
}

#[cfg(test)]
mod tests {
    use super::DialogEvent::{Close, Failed, Reset, Submit, Succeeded};
    use super::DialogState::{Closed, Submitting};
    use super::*;

    #[test]
    fn happy_path_cycles_back_to_closed() {
        let state = DialogState::default().on(DialogEvent::Open).on(Submit).on(Succeeded);
        assert_eq!(state, Closed);
        assert_eq!(state.on(DialogEvent::Open), DialogState::Open);
    }

    #[test]
    fn failure_returns_to_open() {
        assert_eq!(DialogState::Open.on(Submit).on(Failed), DialogState::Open);
    }

    #[test]
    fn close_from_any_open_state() {
        assert_eq!(DialogState::Open.on(Close), Closed);
        assert_eq!(Submitting.on(Close), Closed);
    }

    #[test]
    fn undefined_transitions_are_ignored() {
        assert_eq!(Closed.on(Submit), Closed);
        assert_eq!(Closed.on(Failed), Closed);
        assert_eq!(Closed.on(Succeeded), Closed);
        assert_eq!(Closed.on(Close), Closed);
        assert_eq!(DialogState::Open.on(DialogEvent::Open), DialogState::Open);
        assert_eq!(DialogState::Open.on(Failed), DialogState::Open);
        assert_eq!(Submitting.on(Submit), Submitting);
        assert_eq!(Submitting.on(DialogEvent::Open), Submitting);
        assert_eq!(Closed.on(Reset), Closed);
        assert_eq!(DialogState::Open.on(Reset), DialogState::Open);
    }

    #[test]
    fn reset_clears_submitting_but_keeps_visibility() {
        assert_eq!(Submitting.on(Reset), DialogState::Open);
    }

    #[test]
    fn flags_follow_state() {
        assert!(!Closed.is_open());
        assert!(DialogState::Open.is_open() && !DialogState::Open.is_submitting());
        assert!(Submitting.is_open() && Submitting.is_submitting());
    }
}
