//! Scope manager: a directory-keyed set of variable environments plus an include-directory stack.
//!
//! Scopes are handed out as the ref-counted `Handle<T>` from `src/slab.rs` so a `Target` can keep
//! its defining scope alive after the parser moves on to a different directory; target lifetimes
//! intentionally outlive the parser's active scope.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::classify::ParserState;
use crate::conditional::ConditionalState;
use crate::slab::{Handle, Slab};
use crate::vars::Vars;

/// Per-directory variable environment plus the bookkeeping the stream processor and conditional
/// state machine need while parsing files in that directory.
pub struct ScopeContext {
    /// Directory path used as this scope's identity.
    pub key: PathBuf,
    pub variables: Vars,
    /// The directory `!INCLUDE` paths are currently resolved relative to.
    pub current_include_dir: PathBuf,
    pub parser_state: ParserState,
    pub conditional: ConditionalState,
    /// Nesting level at which an active recipe was discarded because its introducing rule was in
    /// a skipped branch; `None` when nothing has been discarded.
    pub rule_excluded_nesting_level: Option<usize>,
}

impl ScopeContext {
    fn new(key: PathBuf, variables: Vars) -> Self {
        let current_include_dir = key.clone();
        Self {
            key,
            variables,
            current_include_dir,
            parser_state: ParserState::Default,
            conditional: ConditionalState::new(),
            rule_excluded_nesting_level: None,
        }
    }
}

/// Owns one `ScopeContext` per directory seen so far, handing out ref-counted handles via a slab
/// so targets can retain a scope after the parser deactivates it.
pub struct ScopeTable {
    slab: Slab<ScopeContext>,
    by_dir: HashMap<PathBuf, (usize, Handle<ScopeContext>)>,
    active: Option<Handle<ScopeContext>>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self {
            slab: Slab::new(),
            by_dir: HashMap::new(),
            active: None,
        }
    }

    /// Activate (creating on first visit) the scope for `dir`, seeding a freshly created scope's
    /// variables by inheriting from `parent` if given. Returns the new active scope handle.
    pub fn activate(&mut self, dir: PathBuf, parent: Option<&Handle<ScopeContext>>) -> Handle<ScopeContext> {
        if let Some((_, handle)) = self.by_dir.get(&dir) {
            let handle = Handle::clone(handle);
            self.active = Some(Handle::clone(&handle));
            return handle;
        }

        let variables = match parent {
            Some(parent) => inherit_vars(&parent.borrow().variables),
            None => Vars::new([]),
        };

        let scope = ScopeContext::new(dir.clone(), variables);
        let (index, handle) = self.slab.alloc(scope);
        self.by_dir.insert(dir, (index, Handle::clone(&handle)));
        self.active = Some(Handle::clone(&handle));
        handle
    }

    /// Release the active-scope pointer without affecting any handle a `Target` may still hold.
    pub fn deactivate(&mut self) {
        self.active = None;
    }

    /// Restore a previously-held handle as the active scope (used when an `!INCLUDE` or
    /// subdirectory parse returns to its caller).
    pub fn set_active(&mut self, handle: Handle<ScopeContext>) {
        self.active = Some(handle);
    }

    pub fn active(&self) -> Option<&Handle<ScopeContext>> {
        self.active.as_ref()
    }

    pub fn lookup(&self, dir: &PathBuf) -> Option<Handle<ScopeContext>> {
        self.by_dir.get(dir).map(|(_, h)| Handle::clone(h))
    }

    pub fn len(&self) -> usize {
        self.slab.len()
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// A freshly activated subdirectory scope starts with a copy of its parent's variables at their
/// current precedence, matching NMAKE's inherited-environment-per-directory behavior.
fn inherit_vars(parent: &Vars) -> Vars {
    let mut vars = Vars::new([]);
    for (name, var) in parent.iter() {
        let _ = vars.set(name, &var.value, var.recursive, var.precedence);
    }
    vars
}
