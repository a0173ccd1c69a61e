//! Stream processor: the outer parse loop that reads a makefile line by line, joins continuations,
//! classifies each logical line, gates it through the conditional state machine, and dispatches it
//! to the appropriate handler, wiring together every leaf module in this crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{EnvHash, PreprocCache, SubCommandEvaluator};
use crate::classify::{self, LineType, ParserState};
use crate::conditional::ConditionalState;
use crate::context::Context;
use crate::directive::Directive;
use crate::error::MakeError;
use crate::expand::{expand, AutomaticMacros};
use crate::inline::{InlineFileManager, Keep};
use crate::lexer;
use crate::logger::Logger;
use crate::opts::Opts;
use crate::rule_map::RuleMap;
use crate::scope::{ScopeContext, ScopeTable};
use crate::slab::Handle;
use crate::vars::{Env, Precedence, Vars};

/// Process-wide preprocessing state.
pub struct MakeContext<L: Logger> {
    pub scope_table: ScopeTable,
    pub rule_map: RuleMap,
    cache: PreprocCache,
    env_hash: EnvHash,
    elapsed: Duration,
    inline_files: InlineFileManager,
    pub error_termination: bool,
    opts: Opts,
    logger: L,
    /// The target most recently declared by a `Rule` line, which subsequent `Recipe` lines append
    /// to.
    current_target: Option<String>,
}

impl<L: Logger> MakeContext<L> {
    pub fn new(opts: Opts, logger: L, env: Env) -> Self {
        let mut scope_table = ScopeTable::new();
        let root_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let root_scope = scope_table.activate(root_dir.clone(), None);

        {
            let mut root = root_scope.borrow_mut();
            root.variables = Vars::from_env(env);
            for (name, value) in &opts.defines {
                let _ = root.variables.set(name, value, true, Precedence::CommandLine);
            }
            for name in &opts.undefines {
                root.variables.undef(name);
            }
            root.current_include_dir = root_dir;
        }

        let mut cache = PreprocCache::new();
        if let Some(first_file) = opts.file.first() {
            let sidecar = PreprocCache::sidecar_path(first_file);
            if let Ok(loaded) = PreprocCache::load(&sidecar) {
                cache = loaded;
            }
        }

        Self {
            scope_table,
            rule_map: RuleMap::new(),
            cache,
            env_hash: EnvHash::new(),
            elapsed: Duration::ZERO,
            inline_files: InlineFileManager::new(),
            error_termination: false,
            opts,
            logger,
            current_target: None,
        }
    }

    pub fn logger(&self) -> &L {
        &self.logger
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Persist the sub-command cache to its sidecar file and delete any non-`KEEP` inline files.
    /// Both happen at shutdown, once processing has fully finished.
    pub fn shutdown(&self) -> std::io::Result<()> {
        self.inline_files.cleanup();
        if let Some(first_file) = self.opts.file.first() {
            self.cache.save(&PreprocCache::sidecar_path(first_file))?;
        }
        Ok(())
    }

    fn sub_evaluator(&mut self) -> SubCommandEvaluator<'_> {
        SubCommandEvaluator {
            cache: &mut self.cache,
            env_hash: &mut self.env_hash,
            elapsed: &mut self.elapsed,
        }
    }

    /// Parse one file: read it line by line, join backslash continuations, classify, gate via the
    /// conditional state machine, expand variables, and dispatch.
    pub fn process_file(&mut self, path: &Path) -> Result<(), MakeError> {
        let dir = path
            .parent()
            .map(PathBuf::from)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        let parent_scope = self.scope_table.active().map(Handle::clone);
        let scope = self.scope_table.activate(dir.clone(), parent_scope.as_ref());
        scope.borrow_mut().current_include_dir = dir;

        let content = std::fs::read_to_string(path).map_err(|source| MakeError::Include {
            path: path.to_path_buf(),
            context: Context::from(path.to_path_buf()),
            source,
        })?;

        let mut accumulator = String::new();
        for (line_index, raw_line) in content.lines().enumerate() {
            let truncated = lexer::truncate_comments(raw_line);
            let (joined, continuing) = lexer::join_line(&accumulator, truncated);

            if continuing {
                accumulator = joined;
                continue;
            }
            accumulator.clear();

            let context = Context {
                path: Some(path.to_path_buf()),
                content: Some(joined.clone()),
                line_index: Some(line_index),
                column_index: None,
            };

            let result = self.process_logical_line(&joined, &scope, &context);
            if let Err(err) = result {
                match &err {
                    MakeError::Parse { line, context: ctx } => {
                        let label = ctx.label().unwrap_or_default();
                        self.logger.write(format!("{} Parse error: {}", label, line));
                    }
                    other => self.logger.error(other.to_string(), Some(other.context())),
                }
                self.error_termination = true;
            }

            if self.error_termination {
                break;
            }
        }

        match parent_scope {
            Some(parent) => self.scope_table.set_active(parent),
            None => self.scope_table.deactivate(),
        }

        Ok(())
    }

    fn process_logical_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let parser_state = scope.borrow().parser_state;

        let line_type = classify::classify(line, parser_state);

        // Preprocessor lines are dispatched unconditionally: `!ELSE*`/`!ENDIF` must update the
        // nesting stack even inside a currently-skipped branch.
        if line_type == LineType::Preprocessor {
            return self.handle_preprocessor_line(line.trim(), scope, context);
        }

        let effective_type = self.reinterpret_for_parser_state(line_type, scope);

        if !scope.borrow().conditional.should_execute() {
            // A `Rule` line that gets skipped here leaves the parser state alone otherwise: the
            // next recipe line would wrongly keep appending to whatever target was active before
            // the conditional closed it off. Reset to `Default` and remember the nesting level the
            // exclusion happened at, so the matching `!ELSE`/`!ENDIF` can lift it again.
            if effective_type == LineType::Rule {
                let mut s = scope.borrow_mut();
                s.parser_state = ParserState::Default;
                s.rule_excluded_nesting_level = Some(s.conditional.depth());
            }
            return Ok(());
        }

        // Everything but the inline-file body is dispatched on the outer-trimmed line; the
        // inline-file body must keep its exact formatting, so it alone gets the untrimmed, only
        // comment/continuation-processed line.
        let trimmed = line.trim();

        match effective_type {
            LineType::Empty => Ok(()),
            LineType::DebugBreak => {
                self.logger.debug("DebugBreak", Some(context));
                Ok(())
            }
            LineType::SetVariable => self.handle_set_variable(trimmed, scope, context),
            LineType::Rule => self.handle_rule_line(trimmed, scope, context),
            LineType::Recipe => self.handle_recipe_line(trimmed, scope, context),
            LineType::InlineFile => self.handle_inline_file_line(line, scope, context),
            LineType::Preprocessor => unreachable!("handled above"),
            LineType::Error => Err(MakeError::parse(trimmed, context.clone())),
        }
    }

    /// Reinterpret a blank line depending on parser state: a blank line while capturing an inline
    /// file or a recipe body means something different than a blank line in the default state.
    fn reinterpret_for_parser_state(&self, line_type: LineType, scope: &Handle<ScopeContext>) -> LineType {
        if line_type != LineType::Empty {
            return line_type;
        }

        let mut s = scope.borrow_mut();
        match s.parser_state {
            ParserState::InlineFileActive => LineType::InlineFile,
            ParserState::RecipeActive => {
                s.parser_state = ParserState::Default;
                LineType::Empty
            }
            ParserState::Default => LineType::Empty,
        }
    }

    fn handle_set_variable(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let (name, value) = lexer::split_top_level(line, '=')
            .ok_or_else(|| MakeError::syntax("variable assignment missing `=`", context.clone()))?;

        scope
            .borrow_mut()
            .variables
            .set(name.trim(), value.trim(), true, Precedence::Makefile)
            .map_err(|msg| MakeError::syntax(msg, context.clone()))
    }

    fn handle_rule_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let effect = self.rule_map.parse_rule_line(line, scope, context)?;
        scope.borrow_mut().parser_state = ParserState::RecipeActive;
        self.current_target = Some(effect.target_name.clone());

        for pending in effect.pending_subdirectories {
            let makefile_path = pending.subdir.join("Makefile");
            if makefile_path.is_file() {
                self.process_file(&makefile_path)?;
            }
            if !self
                .rule_map
                .confirm_subdirectory_dependency(&effect.target_name, &pending.child_target)
            {
                let active_scope = self
                    .scope_table
                    .active()
                    .map(Handle::clone)
                    .unwrap_or_else(|| Handle::clone(scope));
                self.rule_map.ensure_target(&pending.child_target, &active_scope);
            }
        }

        Ok(())
    }

    fn handle_recipe_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let Some(target_name) = self.current_target.clone() else {
            return Err(MakeError::syntax("recipe line with no active target", context.clone()));
        };

        let is_pseudo = self
            .rule_map
            .get(&target_name)
            .map(|t| t.inference_rule_pseudo_target)
            .unwrap_or(false);

        let expanded = {
            let s = scope.borrow();
            expand(line, &s.variables, &AutomaticMacros::default())
        };

        if let Some(idx) = expanded.find("<<") {
            let prefix = &expanded[..idx];
            let temp_dir = self.opts.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
            let temp_path = self
                .inline_files
                .open(&temp_dir)
                .map_err(|source| MakeError::Io {
                    context: context.clone(),
                    source,
                })?;
            let spliced = format!("{}{}", prefix, temp_path.display());
            self.rule_map.append_recipe(&target_name, &spliced);
            scope.borrow_mut().parser_state = ParserState::InlineFileActive;
        } else {
            let to_store = if is_pseudo { line } else { expanded.as_str() };
            self.rule_map.append_recipe(&target_name, to_store);
        }

        Ok(())
    }

    fn handle_inline_file_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let trimmed = line.trim();

        if let Some(suffix) = trimmed.strip_prefix("<<") {
            let keep = if suffix.trim().eq_ignore_ascii_case("KEEP") {
                Keep::Keep
            } else {
                Keep::NoKeep
            };
            self.inline_files.close(keep);
            scope.borrow_mut().parser_state = ParserState::RecipeActive;
            return Ok(());
        }

        self.inline_files.write_line(line).map_err(|source| MakeError::Io {
            context: context.clone(),
            source,
        })
    }

    fn handle_preprocessor_line(
        &mut self,
        line: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        let (directive, arg_offset) = crate::directive::recognize(line)
            .ok_or_else(|| MakeError::syntax(format!("unrecognized directive in `{}`", line), context.clone()))?;
        let arg = line[arg_offset..].trim();

        match directive {
            Directive::If => {
                let condition = self.evaluate_opening_condition(arg, scope, context)?;
                scope.borrow_mut().conditional.open(condition);
                Ok(())
            }
            Directive::IfDef => {
                let condition = self.evaluate_defined(arg, scope, true);
                scope.borrow_mut().conditional.open(condition);
                Ok(())
            }
            Directive::IfNDef => {
                let condition = self.evaluate_defined(arg, scope, false);
                scope.borrow_mut().conditional.open(condition);
                Ok(())
            }
            Directive::ElseIf => {
                let condition = self.evaluate_elseif_condition(arg, scope, context)?;
                scope
                    .borrow_mut()
                    .conditional
                    .else_if(condition)
                    .map_err(|msg| MakeError::syntax(msg, context.clone()))
            }
            Directive::ElseIfDef => {
                let condition = scope.borrow().conditional.needs_branch_evaluation()
                    && self.evaluate_defined(arg, scope, true);
                scope
                    .borrow_mut()
                    .conditional
                    .else_if(condition)
                    .map_err(|msg| MakeError::syntax(msg, context.clone()))
            }
            Directive::ElseIfNDef => {
                let condition = scope.borrow().conditional.needs_branch_evaluation()
                    && self.evaluate_defined(arg, scope, false);
                scope
                    .borrow_mut()
                    .conditional
                    .else_if(condition)
                    .map_err(|msg| MakeError::syntax(msg, context.clone()))
            }
            Directive::Else => {
                let result = scope
                    .borrow_mut()
                    .conditional
                    .else_branch()
                    .map_err(|msg| MakeError::syntax(msg, context.clone()));
                self.clear_rule_exclusion_if_left(scope);
                result
            }
            Directive::EndIf => {
                let result = scope
                    .borrow_mut()
                    .conditional
                    .end_if()
                    .map_err(|msg| MakeError::syntax(msg, context.clone()));
                self.clear_rule_exclusion_if_left(scope);
                result
            }
            Directive::Include => self.handle_include(arg, scope, context),
            Directive::Message => {
                if scope.borrow().conditional.should_execute() {
                    self.logger.info(arg, Some(context));
                }
                Ok(())
            }
            Directive::ErrorDirective => {
                if scope.borrow().conditional.should_execute() {
                    return Err(MakeError::user(arg, context.clone()));
                }
                Ok(())
            }
            Directive::Undef => {
                if scope.borrow().conditional.should_execute() {
                    scope.borrow_mut().variables.undef(arg);
                }
                Ok(())
            }
        }
    }

    /// Clear a pending rule exclusion once the `!ELSE`/`!ENDIF` that closed it off has left that
    /// nesting level, per the conditional-scope state machine.
    fn clear_rule_exclusion_if_left(&self, scope: &Handle<ScopeContext>) {
        let mut s = scope.borrow_mut();
        if let Some(level) = s.rule_excluded_nesting_level {
            if level >= s.conditional.depth() {
                s.rule_excluded_nesting_level = None;
            }
        }
    }

    fn evaluate_opening_condition(
        &mut self,
        expr_text: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<bool, MakeError> {
        if !scope.borrow().conditional.parent_would_be_active() {
            return Ok(false);
        }
        let result = {
            let s = scope.borrow();
            crate::expr::evaluate(expr_text, &s.variables, &mut self.sub_evaluator(), context)
        };
        result
    }

    fn evaluate_elseif_condition(
        &mut self,
        expr_text: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<bool, MakeError> {
        if !scope.borrow().conditional.needs_branch_evaluation() {
            return Ok(false);
        }
        let result = {
            let s = scope.borrow();
            crate::expr::evaluate(expr_text, &s.variables, &mut self.sub_evaluator(), context)
        };
        result
    }

    fn evaluate_defined(&self, name: &str, scope: &Handle<ScopeContext>, want_defined: bool) -> bool {
        let defined = scope.borrow().variables.is_defined(name);
        defined == want_defined
    }

    fn handle_include(
        &mut self,
        arg: &str,
        scope: &Handle<ScopeContext>,
        context: &Context,
    ) -> Result<(), MakeError> {
        if !scope.borrow().conditional.should_execute() {
            return Ok(());
        }

        let name = strip_quotes(arg);
        let current_dir = scope.borrow().current_include_dir.clone();
        let resolved = resolve_include_path(&current_dir, name, &self.opts.include_dirs);
        let saved_include_dir = current_dir;

        let result = self.process_file(&resolved);

        // Restore `current_include_dir` regardless of success or failure.
        scope.borrow_mut().current_include_dir = saved_include_dir;

        result
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn resolve_include_path(current_dir: &Path, name: &str, include_dirs: &[PathBuf]) -> PathBuf {
    let direct = current_dir.join(name);
    if direct.is_file() {
        return direct;
    }
    for dir in include_dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return candidate;
        }
    }
    direct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::test_support::RecordingLogger;
    use std::io::Write;

    fn write_temp(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn simple_rule_and_recipe_build_a_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            dir.path(),
            "Makefile",
            "all: a.o\n\tcc -o all a.o\n",
        );

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert!(!ctx.error_termination);
        let target = ctx.rule_map.get("all").unwrap();
        assert_eq!(target.parent_dependencies, vec!["a.o"]);
        assert!(target.recipe.contains("cc -o all a.o"));
    }

    #[test]
    fn conditional_gates_a_rule() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            dir.path(),
            "Makefile",
            "!IF 0\nskipped: x\n!ENDIF\nall: y\n",
        );

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert!(ctx.rule_map.get("skipped").is_none());
        assert!(ctx.rule_map.get("all").is_some());
    }

    #[test]
    fn variable_assignment_is_visible_to_later_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            dir.path(),
            "Makefile",
            "CC = gcc\nall: a.o\n\t$(CC) -o all a.o\n",
        );

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        let target = ctx.rule_map.get("all").unwrap();
        assert!(target.recipe.contains("gcc -o all a.o"));
    }

    #[test]
    fn error_directive_sets_termination() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "Makefile", "!ERROR boom\n");

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert!(ctx.error_termination);
    }

    #[test]
    fn include_restores_current_include_dir_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_temp(&sub, "inc.mk", "X = 1\n");
        let path = write_temp(
            dir.path(),
            "Makefile",
            "!INCLUDE \"sub/inc.mk\"\nall: a.o\n",
        );

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert!(!ctx.error_termination);
        let root = ctx.scope_table.lookup(&dir.path().to_path_buf()).unwrap();
        assert_eq!(root.borrow().current_include_dir, dir.path().to_path_buf());
    }

    #[test]
    fn skipped_rule_does_not_leak_recipe_into_later_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            dir.path(),
            "Makefile",
            "!IF 0\nskipped: a.o\n\tcc -o skipped a.o\n!ENDIF\nall: b.o\n\tcc -o all b.o\n",
        );

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert!(!ctx.error_termination);
        assert!(ctx.rule_map.get("skipped").is_none());
        let all = ctx.rule_map.get("all").unwrap();
        assert!(all.recipe.contains("cc -o all b.o"));
        assert!(!all.recipe.contains("skipped"));
    }

    #[test]
    fn unclassifiable_line_logs_bare_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "Makefile", "just some text\n");

        let logger = RecordingLogger::default();
        let mut ctx: MakeContext<RecordingLogger> = MakeContext::new(Opts::new(), logger, Env::new());
        ctx.process_file(&path).unwrap();

        assert!(ctx.error_termination);
        let lines = ctx.logger().lines.borrow();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Parse error: just some text"));
        assert!(!lines[0].starts_with("nmk:"));
    }

    #[test]
    fn inference_rule_detected_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(dir.path(), "Makefile", ".c.o:\n\tcc -c $<\n");

        let mut ctx: MakeContext<RecordingLogger> =
            MakeContext::new(Opts::new(), RecordingLogger::default(), Env::new());
        ctx.process_file(&path).unwrap();

        assert_eq!(ctx.rule_map.inference_rules().len(), 1);
        let (rule, candidate) = ctx.rule_map.match_inference_rule("foo.o").unwrap();
        assert_eq!(rule.to_ext, "o");
        assert_eq!(candidate, "foo.c");
    }
}
