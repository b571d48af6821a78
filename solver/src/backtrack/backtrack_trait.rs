use crate::backtrack::DecLvl;

/// A data structure whose state can be saved and later restored.
///
/// Saved states are stacked: each call to [`Backtrack::save_state`] opens a new decision level
/// and [`Backtrack::restore_last`] undoes every change made since the last saved state.
pub trait Backtrack {
    fn save_state(&mut self) -> DecLvl;
    fn num_saved(&self) -> u32;
    fn current_decision_level(&self) -> DecLvl {
        DecLvl::from(self.num_saved())
    }
    fn restore_last(&mut self);

    /// Undoes all changes made at decision levels strictly greater than `saved_id`.
    fn restore(&mut self, saved_id: DecLvl) {
        while self.current_decision_level() > saved_id {
            self.restore_last();
        }
    }

    fn reset(&mut self) {
        if self.current_decision_level() > DecLvl::ROOT {
            self.restore(DecLvl::ROOT);
        }
    }
}
