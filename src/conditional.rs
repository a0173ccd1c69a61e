//! Conditional nesting state machine: tracks, per nested `!IF`/`!ELSE*` level, whether a branch has
//! already executed and whether the current branch is active, using plain fields rather than an
//! enum-based state pattern.

/// Tracks whether lines are currently being accepted for parsing, across nested `!IF`/`!ELSE*`
/// blocks within one scope.
#[derive(Clone, Debug, Default)]
pub struct ConditionalState {
    /// Per nesting level: whether any branch in this `!IF`/`!ELSE*` chain has already executed.
    /// Once true, later `!ELSEIF`/`!ELSE` branches at the same level are skipped even if their own
    /// condition would be true: first true branch wins.
    execution_occurred: Vec<bool>,
    /// Per nesting level: whether the current branch is the one being parsed.
    execution_enabled: Vec<bool>,
}

impl ConditionalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether lines should currently be parsed (all enclosing levels active).
    pub fn should_execute(&self) -> bool {
        self.execution_enabled.iter().all(|&e| e)
    }

    pub fn depth(&self) -> usize {
        self.execution_enabled.len()
    }

    /// Whether a new nested `!IF*` currently being opened would need its condition evaluated at
    /// all, i.e. whether every enclosing level (the state as it stands right now, before the new
    /// level is pushed) is active. Lets the caller skip evaluating (and thus skip running any
    /// `[cmd]` sub-commands in) a condition that is going to be forced false by a disabled parent
    /// anyway.
    pub fn parent_would_be_active(&self) -> bool {
        self.should_execute()
    }

    /// Whether an `!ELSEIF`/`!ELSEIFDEF`/`!ELSEIFNDEF` at the current level still has a chance of
    /// activating: no earlier branch at this level has run, and every enclosing level is active.
    pub fn needs_branch_evaluation(&self) -> bool {
        match self.execution_occurred.last() {
            None => false,
            Some(&occurred) => {
                !occurred
                    && self.execution_enabled[..self.execution_enabled.len() - 1]
                        .iter()
                        .all(|&e| e)
            }
        }
    }

    /// Open a new `!IF`/`!IFDEF`/`!IFNDEF` level, gated by `condition` (already evaluated).
    pub fn open(&mut self, condition: bool) {
        let parent_active = self.should_execute();
        let enabled = parent_active && condition;
        self.execution_enabled.push(enabled);
        self.execution_occurred.push(enabled);
    }

    /// Handle an `!ELSEIF`/`!ELSEIFDEF`/`!ELSEIFNDEF` at the current level.
    pub fn else_if(&mut self, condition: bool) -> Result<(), String> {
        let top = self
            .execution_enabled
            .last_mut()
            .ok_or_else(|| "`!ELSEIF` without a matching `!IF`".to_string())?;
        let occurred = self.execution_occurred.last_mut().unwrap();

        // Parent must still be active at every level below the top for any branch here to run.
        let parent_active = self.execution_enabled[..self.execution_enabled.len() - 1]
            .iter()
            .all(|&e| e);

        if *occurred {
            *top = false;
        } else {
            *top = parent_active && condition;
            if *top {
                *occurred = true;
            }
        }
        Ok(())
    }

    /// Handle a bare `!ELSE`: active iff no earlier branch at this level has executed and every
    /// enclosing level is active.
    pub fn else_branch(&mut self) -> Result<(), String> {
        let top = self
            .execution_enabled
            .last_mut()
            .ok_or_else(|| "`!ELSE` without a matching `!IF`".to_string())?;
        let occurred = self.execution_occurred.last().copied().unwrap();

        let parent_active = self.execution_enabled[..self.execution_enabled.len() - 1]
            .iter()
            .all(|&e| e);

        *top = parent_active && !occurred;
        Ok(())
    }

    /// Close the innermost `!IF`/`!ELSE*` block.
    pub fn end_if(&mut self) -> Result<(), String> {
        if self.execution_enabled.pop().is_none() {
            return Err("`!ENDIF` without a matching `!IF`".to_string());
        }
        self.execution_occurred.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_true_branch_executes() {
        let mut state = ConditionalState::new();
        state.open(true);
        assert!(state.should_execute());
        state.end_if().unwrap();
        assert!(state.should_execute());
    }

    #[test]
    fn simple_false_branch_does_not_execute() {
        let mut state = ConditionalState::new();
        state.open(false);
        assert!(!state.should_execute());
    }

    #[test]
    fn else_runs_only_when_if_was_false() {
        let mut state = ConditionalState::new();
        state.open(false);
        state.else_branch().unwrap();
        assert!(state.should_execute());

        let mut state2 = ConditionalState::new();
        state2.open(true);
        state2.else_branch().unwrap();
        assert!(!state2.should_execute());
    }

    #[test]
    fn first_true_branch_wins_among_several_elseifs() {
        let mut state = ConditionalState::new();
        state.open(false);
        state.else_if(true).unwrap();
        assert!(state.should_execute());
        state.else_if(true).unwrap();
        assert!(!state.should_execute(), "second true elseif must not re-activate");
    }

    #[test]
    fn nested_block_inherits_disabled_parent() {
        let mut state = ConditionalState::new();
        state.open(false);
        state.open(true); // nested !IF TRUE inside a disabled outer block
        assert!(!state.should_execute());
        state.end_if().unwrap();
        assert!(!state.should_execute());
        state.end_if().unwrap();
        assert!(state.should_execute());
    }

    #[test]
    fn end_if_without_matching_if_is_error() {
        let mut state = ConditionalState::new();
        assert!(state.end_if().is_err());
    }

    #[test]
    fn else_without_matching_if_is_error() {
        let mut state = ConditionalState::new();
        assert!(state.else_branch().is_err());
    }

    #[test]
    fn depth_tracks_open_and_close() {
        let mut state = ConditionalState::new();
        assert_eq!(state.depth(), 0);
        state.open(true);
        assert_eq!(state.depth(), 1);
        state.open(true);
        assert_eq!(state.depth(), 2);
        state.end_if().unwrap();
        assert_eq!(state.depth(), 1);
    }
}
