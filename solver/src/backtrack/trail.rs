use crate::backtrack::DecLvl;

/// An undo log: a sequence of events representing the changes made to a data structure,
/// together with the positions at which states were saved.
///
/// Events are undone in strict reverse order, by handing them back to a callback of the owner.
/// Unlike a queue, a trail is not observable: it only exists to restore a previous state.
#[derive(Clone)]
pub struct Trail<Event> {
    events: Vec<Event>,
    saved_states: Vec<usize>,
}

impl<Event> Trail<Event> {
    pub fn new() -> Self {
        Trail {
            events: vec![],
            saved_states: vec![],
        }
    }

    pub fn push(&mut self, e: Event) {
        self.events.push(e);
    }

    /// Number of events currently recorded. Can be used as a mark for [`Trail::undo_to_with`].
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn save_state(&mut self) -> DecLvl {
        self.saved_states.push(self.events.len());
        self.current_decision_level()
    }

    pub fn num_saved(&self) -> u32 {
        self.saved_states.len() as u32
    }

    pub fn current_decision_level(&self) -> DecLvl {
        DecLvl::from(self.num_saved())
    }

    /// Undoes all events recorded after the mark `len`, without affecting saved states.
    ///
    /// # Panics
    /// Panics if this would undo events recorded before the last saved state.
    pub fn undo_to_with(&mut self, len: usize, mut f: impl FnMut(Event)) {
        assert!(self.saved_states.last().map_or(true, |&saved| saved <= len));
        while self.events.len() > len {
            if let Some(ev) = self.events.pop() {
                f(ev)
            }
        }
    }

    /// Undoes all events of the current decision level and removes the corresponding saved state.
    ///
    /// # Panics
    /// Panics if no state was saved.
    pub fn restore_last_with(&mut self, f: impl FnMut(Event)) {
        let last_index = self.saved_states.pop().expect("No saved state");
        self.undo_to_with(last_index, f);
    }
}

impl<Event> Default for Trail<Event> {
    fn default() -> Self {
        Self::new()
    }
}
