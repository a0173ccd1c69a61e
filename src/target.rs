//! Build-graph target nodes: one node per target name, so recipe concatenation across multiple
//! `:` declarations for the same name is a natural append onto one owned buffer rather than a
//! secondary merge pass over separate declarations.

use crate::scope::ScopeContext;
use crate::slab::Handle;

/// One node in the build graph: either a concrete file/phony target or an inference-rule
/// pseudo-target that owns a recipe template instantiated per match.
pub struct Target {
    pub name: String,
    /// Accumulated recipe text. For ordinary targets, each appended recipe line has already been
    /// variable-expanded; for inference-rule pseudo-targets, lines are kept verbatim for
    /// per-instantiation expansion.
    pub recipe: String,
    /// The scope that owned the rule declaring this target's recipe, kept alive past scope
    /// deactivation.
    pub scope: Handle<ScopeContext>,
    pub inference_rule_pseudo_target: bool,
    pub explicit_recipe_found: bool,
    /// Names of prerequisites declared for this target, in declaration order.
    pub parent_dependencies: Vec<String>,
}

impl Target {
    pub fn new(name: impl Into<String>, scope: Handle<ScopeContext>) -> Self {
        Self {
            name: name.into(),
            recipe: String::new(),
            scope,
            inference_rule_pseudo_target: false,
            explicit_recipe_found: false,
            parent_dependencies: Vec::new(),
        }
    }

    /// Append a recipe line. Inference-rule pseudo-targets replace their recipe wholesale on each
    /// new rule declaration; this method only ever appends, since that replace behavior happens at
    /// rule-declaration time in `src/rule_map.rs`, not at recipe-line time.
    pub fn append_recipe_line(&mut self, line: &str) {
        self.recipe.push_str(line);
        self.recipe.push('\n');
    }

    /// Reset the recipe buffer, used when an inference rule re-declares a pseudo-target's recipe.
    pub fn reset_recipe(&mut self) {
        self.recipe.clear();
    }

    pub fn add_dependency(&mut self, name: impl Into<String>) {
        self.parent_dependencies.push(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ParserState;
    use crate::conditional::ConditionalState;
    use crate::vars::Vars;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    fn test_scope() -> Handle<ScopeContext> {
        Rc::new(RefCell::new(ScopeContext {
            key: PathBuf::from("."),
            variables: Vars::new([]),
            current_include_dir: PathBuf::from("."),
            parser_state: ParserState::Default,
            conditional: ConditionalState::new(),
            rule_excluded_nesting_level: None,
        }))
    }

    #[test]
    fn recipe_lines_append_in_order() {
        let mut target = Target::new("all", test_scope());
        target.append_recipe_line("cc -c a.c");
        target.append_recipe_line("cc -c b.c");
        assert_eq!(target.recipe, "cc -c a.c\ncc -c b.c\n");
    }

    #[test]
    fn reset_recipe_clears_buffer() {
        let mut target = Target::new("{src}.c{obj}.o", test_scope());
        target.append_recipe_line("cc -c $<");
        target.reset_recipe();
        assert_eq!(target.recipe, "");
    }

    #[test]
    fn dependencies_preserve_declaration_order() {
        let mut target = Target::new("all", test_scope());
        target.add_dependency("a.o");
        target.add_dependency("b.o");
        assert_eq!(target.parent_dependencies, vec!["a.o", "b.o"]);
    }
}
