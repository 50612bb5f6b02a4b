#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExitStateMachine {
    startup_started: bool,
    quitting: bool,
    cleanup_started: bool,
}

impl ExitStateMachine {
    /// True exactly once, and never after quitting began.
    pub(crate) fn try_begin_startup(&mut self) -> bool {
        if self.startup_started || self.quitting {
            return false;
        }
        self.startup_started = true;
        true
    }

    pub(crate) fn mark_quitting(&mut self) {
        self.quitting = true;
    }

    pub(crate) fn is_quitting(&self) -> bool {
        self.quitting
    }

    pub(crate) fn try_begin_cleanup(&mut self) -> bool {
        self.quitting = true;
        if self.cleanup_started {
            return false;
        }
        self.cleanup_started = true;
        true
    }
}
