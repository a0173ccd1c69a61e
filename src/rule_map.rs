//! Graph builder: targets, inference rules, and dependency wiring.
//!
//! One owned `Target` node per target name, with repeated `name:` declarations appending to the
//! same node's recipe buffer rather than requiring a secondary merge pass over several separate
//! rule entries.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::context::Context;
use crate::error::MakeError;
use crate::lexer::{split_top_level, split_whitespace_quoted};
use crate::scope::ScopeContext;
use crate::slab::Handle;
use crate::target::Target;

/// A pattern-based rule synthesising a source candidate from a target name by directory/extension
/// substitution.
///
/// Matching is keyed on the target's own `to_ext`/`to_dir` (not `from_ext`/`from_dir`), following
/// the standard suffix-rule convention: `.c.o:` reads "from .c to .o," so a target ending in `.o`
/// is the one this rule can produce, and its source candidate is built by substituting
/// `to_dir -> from_dir` and `to_ext -> from_ext`. See DESIGN.md for the reasoning behind this
/// choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferenceRule {
    pub from_dir: String,
    pub from_ext: String,
    pub to_dir: String,
    pub to_ext: String,
    pub pseudo_target: String,
}

impl InferenceRule {
    /// Whether this rule's output pattern matches `target_name`.
    pub fn matches(&self, target_name: &str) -> bool {
        let Some(ext) = extension_of(target_name) else {
            return false;
        };
        if ext != self.to_ext {
            return false;
        }
        if !self.to_dir.is_empty() {
            return directory_of(target_name) == self.to_dir;
        }
        true
    }

    /// Produce the source candidate for `target_name` by substituting `to_dir → from_dir` and
    /// `to_ext → from_ext`.
    pub fn candidate_source(&self, target_name: &str) -> String {
        let stem = &target_name[..target_name.len() - self.to_ext.len() - 1];
        let stem = stem.strip_prefix(&format!("{}/", self.to_dir)).unwrap_or(stem);
        if self.from_dir.is_empty() {
            format!("{}.{}", stem, self.from_ext)
        } else {
            format!("{}/{}.{}", self.from_dir, stem, self.from_ext)
        }
    }
}

fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.rsplit_once('.').map(|(_, ext)| ext)
}

fn directory_of(name: &str) -> &str {
    name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Options parsed from a rule target's trailing `[...]` annotation.
#[derive(Debug, Default, Clone)]
struct RuleOptions {
    dirs: bool,
    target_override: Option<String>,
}

fn parse_options(spec: &str) -> (&str, RuleOptions) {
    let spec = spec.trim();
    if !spec.ends_with(']') {
        return (spec, RuleOptions::default());
    }
    let Some(open) = spec.rfind('[') else {
        return (spec, RuleOptions::default());
    };

    let name = spec[..open].trim_end();
    let body = &spec[open + 1..spec.len() - 1];
    let mut options = RuleOptions::default();
    for token in body.split(',') {
        let token = token.trim();
        if token.eq_ignore_ascii_case("dirs") {
            options.dirs = true;
        } else if let Some(value) = token.strip_prefix("target=") {
            options.target_override = Some(value.trim().to_string());
        }
    }

    (name, options)
}

/// Parse one segment of an inference-rule target spec: an optional `{dir}` followed by
/// `.ext`. Returns `(dir, ext, next_offset)`.
fn skip_whitespace(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos < bytes.len() && (bytes[pos] as char).is_whitespace() {
        pos += 1;
    }
    pos
}

fn parse_segment(s: &str, pos: usize) -> Option<(String, String, usize)> {
    let pos = skip_whitespace(s, pos);
    let rest = &s[pos..];
    let (dir, pos) = if let Some(stripped) = rest.strip_prefix('{') {
        let close = stripped.find('}')?;
        (stripped[..close].trim().to_string(), pos + 1 + close + 1)
    } else {
        (String::new(), pos)
    };

    let pos = skip_whitespace(s, pos);
    if !s[pos..].starts_with('.') {
        return None;
    }
    let ext_start = skip_whitespace(s, pos + 1);
    let mut end = ext_start;
    let bytes = s.as_bytes();
    while end < bytes.len() && bytes[end] != b'{' && bytes[end] != b'.' && !(bytes[end] as char).is_whitespace() {
        end += 1;
    }
    let ext = &s[ext_start..end];
    if ext.is_empty() || ext.contains('/') {
        return None;
    }

    let end = skip_whitespace(s, end);
    Some((dir, ext.to_string(), end))
}

/// Detect whether a rule target spec is an inference rule of the form `[{dir}].ext[{dir}].ext`.
/// Whitespace around `{…}`/`.ext` does not affect the result, because leading/trailing whitespace
/// is trimmed by the caller before this scan.
pub fn parse_inference_target(spec: &str) -> Option<(String, String, String, String)> {
    let (from_dir, from_ext, next) = parse_segment(spec, 0)?;
    let (to_dir, to_ext, end) = parse_segment(spec, next)?;
    if end != spec.len() {
        return None;
    }
    Some((from_dir, from_ext, to_dir, to_ext))
}

/// Owns every `Target` and `InferenceRule` discovered while parsing, plus target-name-uniqueness
/// enforcement.
#[derive(Default)]
pub struct RuleMap {
    targets: IndexMap<String, Target>,
    inference_rules: Vec<InferenceRule>,
    default_target: Option<String>,
}

/// A subdirectory dependency the stream processor must resolve by activating that directory's
/// scope and ensuring its makefile has been parsed, before the dependency edge can be finalized.
pub struct PendingSubdirectory {
    pub subdir: PathBuf,
    pub child_target: String,
}

/// The outcome of parsing one `Rule` line: the target it declared or updated, plus any
/// subdirectory dependencies that still need resolving by the caller.
pub struct RuleLineEffect {
    pub target_name: String,
    pub pending_subdirectories: Vec<PendingSubdirectory>,
}

impl RuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    pub fn inference_rules(&self) -> &[InferenceRule] {
        &self.inference_rules
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate every known target in declaration order (used by `--dump`).
    pub fn targets(&self) -> impl Iterator<Item = (&String, &Target)> {
        self.targets.iter()
    }

    fn lookup_or_create(&mut self, name: &str, scope: &Handle<ScopeContext>) -> &mut Target {
        if !self.targets.contains_key(name) {
            self.targets
                .insert(name.to_string(), Target::new(name, Handle::clone(scope)));
            if self.default_target.is_none() {
                self.default_target = Some(name.to_string());
            }
        }
        self.targets.get_mut(name).expect("just inserted or present")
    }

    /// Parse a line already classified `Rule`.
    pub fn parse_rule_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<RuleLineEffect, MakeError> {
        let (lhs, rhs) = split_top_level(line, ':')
            .ok_or_else(|| MakeError::syntax("rule line missing `:`", context.clone()))?;

        let (target_spec, options) = parse_options(lhs.trim());
        let target_spec = target_spec.trim();

        if target_spec.eq_ignore_ascii_case(".SUFFIXES") {
            return Ok(RuleLineEffect {
                target_name: target_spec.to_string(),
                pending_subdirectories: Vec::new(),
            });
        }

        let inference = parse_inference_target(target_spec);

        let target = self.lookup_or_create(target_spec, scope);
        target.scope = Handle::clone(scope);
        target.explicit_recipe_found = true;

        if let Some((from_dir, from_ext, to_dir, to_ext)) = inference {
            target.inference_rule_pseudo_target = true;
            target.reset_recipe();
            self.inference_rules.push(InferenceRule {
                from_dir,
                from_ext,
                to_dir,
                to_ext,
                pseudo_target: target_spec.to_string(),
            });
        }

        let mut pending = Vec::new();
        for raw_token in split_whitespace_quoted(rhs.trim()) {
            let token = strip_quotes(&raw_token);

            if let Some(file_list_path) = token.strip_prefix('@') {
                let names = read_file_list(file_list_path, context)?;
                for name in names {
                    self.lookup_or_create(target_spec, scope).add_dependency(&name);
                }
                continue;
            }

            if options.dirs {
                let child_target = options.target_override.clone().unwrap_or_else(|| token.clone());
                pending.push(PendingSubdirectory {
                    subdir: PathBuf::from(&token),
                    child_target: child_target.clone(),
                });
                self.lookup_or_create(target_spec, scope).add_dependency(&child_target);
                continue;
            }

            self.lookup_or_create(target_spec, scope).add_dependency(&token);
        }

        Ok(RuleLineEffect {
            target_name: target_spec.to_string(),
            pending_subdirectories: pending,
        })
    }

    /// Append a recipe line to the named target.
    pub fn append_recipe(&mut self, target_name: &str, expanded_line: &str) {
        if let Some(target) = self.targets.get_mut(target_name) {
            target.append_recipe_line(expanded_line);
        }
    }

    /// Record that a subdirectory dependency has now been resolved (its makefile parsed, its
    /// target confirmed to exist).
    pub fn confirm_subdirectory_dependency(&mut self, target_name: &str, child_target: &str) -> bool {
        self.targets.contains_key(target_name) && self.targets.contains_key(child_target)
    }

    /// Ensure a target node exists for `name`, creating an empty one owned by `scope` if needed.
    /// Used when a subdirectory dependency names a target its sub-makefile never declared.
    pub fn ensure_target(&mut self, name: &str, scope: &Handle<ScopeContext>) {
        self.lookup_or_create(name, scope);
    }

    /// Find the first inference rule matching `target_name`, if any, and the source candidate it
    /// would produce.
    pub fn match_inference_rule(&self, target_name: &str) -> Option<(&InferenceRule, String)> {
        self.inference_rules.iter().find_map(|rule| {
            if rule.matches(target_name) {
                Some((rule, rule.candidate_source(target_name)))
            } else {
                None
            }
        })
    }
}

fn strip_quotes(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn read_file_list(path: &str, context: &Context) -> Result<Vec<String>, MakeError> {
    let content = fs::read_to_string(Path::new(path)).map_err(|source| MakeError::Io {
        context: context.clone(),
        source,
    })?;

    Ok(content
        .lines()
        .map(|line| {
            let name = match line.find('|') {
                Some(i) => &line[..i],
                None => line,
            };
            name.trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ParserState;
    use crate::conditional::ConditionalState;
    use crate::vars::Vars;
    use std::cell::RefCell;
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
    fn plain_rule_creates_target_with_dependencies() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        let effect = map.parse_rule_line("all: a.o b.o", &scope, &ctx).unwrap();
        assert_eq!(effect.target_name, "all");
        let target = map.get("all").unwrap();
        assert_eq!(target.parent_dependencies, vec!["a.o", "b.o"]);
    }

    #[test]
    fn suffixes_target_is_ignored() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line(".SUFFIXES: .c .o", &scope, &ctx).unwrap();
        assert!(map.get(".SUFFIXES").is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn repeated_declarations_append_recipe_not_replace() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line("all: a.o", &scope, &ctx).unwrap();
        map.append_recipe("all", "cc -o all a.o");
        map.parse_rule_line("all: b.o", &scope, &ctx).unwrap();
        map.append_recipe("all", "cc -o all b.o");

        let target = map.get("all").unwrap();
        assert_eq!(target.parent_dependencies, vec!["a.o", "b.o"]);
        assert_eq!(target.recipe, "cc -o all a.o\ncc -o all b.o\n");
    }

    #[test]
    fn inference_rule_is_detected_and_recipe_is_reset_on_redeclare() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line(".c.o:", &scope, &ctx).unwrap();
        assert_eq!(map.inference_rules().len(), 1);
        let rule = &map.inference_rules()[0];
        assert_eq!(rule.from_ext, "c");
        assert_eq!(rule.to_ext, "o");
    }

    #[test]
    fn inference_rule_with_directories() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line("{src}.c{obj}.o:", &scope, &ctx).unwrap();
        let rule = &map.inference_rules()[0];
        assert_eq!(rule.from_dir, "src");
        assert_eq!(rule.to_dir, "obj");
    }

    #[test]
    fn inference_rule_matches_and_produces_candidate_source() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line(".c.o:", &scope, &ctx).unwrap();
        let (rule, candidate) = map.match_inference_rule("foo.o").unwrap();
        assert_eq!(rule.to_ext, "o");
        assert_eq!(candidate, "foo.c");
    }

    #[test]
    fn inference_rule_whitespace_invariant() {
        let a = parse_inference_target(".c.o").unwrap();
        let b = parse_inference_target("{ src }.c{ obj }.o").unwrap();
        assert_eq!(a.1, b.1);
        assert_eq!(a.3, b.3);
    }

    #[test]
    fn first_target_becomes_default() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        map.parse_rule_line("all: a.o", &scope, &ctx).unwrap();
        map.parse_rule_line("clean:", &scope, &ctx).unwrap();
        assert_eq!(map.default_target(), Some("all"));
    }

    #[test]
    fn dirs_option_produces_pending_subdirectory() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        let effect = map.parse_rule_line("all[dirs]: sub", &scope, &ctx).unwrap();
        assert_eq!(effect.pending_subdirectories.len(), 1);
        assert_eq!(effect.pending_subdirectories[0].subdir, PathBuf::from("sub"));
    }

    #[test]
    fn missing_colon_is_syntax_error() {
        let mut map = RuleMap::new();
        let scope = test_scope();
        let ctx = Context::new();
        assert!(map.parse_rule_line("not a rule", &scope, &ctx).is_err());
    }
}
