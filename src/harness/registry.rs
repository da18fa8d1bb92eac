//! Single-slot registry for the active failure action.

#![allow(missing_docs)]

use std::fmt;

use crate::harness::actions::FailureAction;

/// Holds at most one failure action. Registering replaces; nothing stacks.
#[derive(Default)]
pub struct FailureActionRegistry {
    slot: Option<Box<dyn FailureAction>>,
}

impl FailureActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `action`, dropping whatever was registered before.
    pub fn set_action(&mut self, action: impl FailureAction + 'static) {
        self.slot = Some(Box::new(action));
    }

    /// Install an already-boxed action.
    pub fn set_boxed(&mut self, action: Box<dyn FailureAction>) {
        self.slot = Some(action);
    }

    /// The registered action, if any.
    pub fn current_action(&mut self) -> Option<&mut (dyn FailureAction + 'static)> {
        self.slot.as_deref_mut()
    }

    /// Back to "no special behaviour", as if nothing had ever been registered.
    pub fn restore(&mut self) {
        self.slot = None;
    }

    pub fn is_set(&self) -> bool {
        self.slot.is_some()
    }

    /// Label of the registered action, if any.
    pub fn label(&self) -> Option<&str> {
        self.slot.as_deref().map(FailureAction::label)
    }
}

impl fmt::Debug for FailureActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureActionRegistry")
            .field("action", &self.label())
            .finish()
    }
}
