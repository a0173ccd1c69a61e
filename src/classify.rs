//! Line classifier: decides what kind of logical line a joined, comment-truncated line is, given
//! the parser's current state.
//!
//! Branching order mirrors a hand-written recursive-descent parser's dispatch (recipe-prefix check
//! first, then rule-colon, then variable-equals), pulled out into an explicit, independently
//! testable function rather than inline `if`/`return` dispatch mixed with side effects.

/// Mirrors `ScopeContext.parser_state`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ParserState {
    #[default]
    Default,
    RecipeActive,
    InlineFileActive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineType {
    Empty,
    Preprocessor,
    SetVariable,
    Rule,
    Recipe,
    InlineFile,
    DebugBreak,
    Error,
}

const DEBUG_BREAK_LITERAL: &str = "DebugBreak";

/// Classify a single logical line. `line` should be the joined, comment-truncated, but
/// *un-trimmed* line, so leading whitespace is still visible for recipe detection.
pub fn classify(line: &str, parser_state: ParserState) -> LineType {
    if line.trim().is_empty() {
        return LineType::Empty;
    }

    let trimmed_start = line.trim_start();
    if trimmed_start.starts_with('!') {
        return LineType::Preprocessor;
    }

    if parser_state == ParserState::RecipeActive && line.chars().next().is_some_and(|c| c.is_whitespace()) {
        return LineType::Recipe;
    }

    if parser_state == ParserState::InlineFileActive {
        return LineType::InlineFile;
    }

    if trimmed_start.trim() == DEBUG_BREAK_LITERAL {
        return LineType::DebugBreak;
    }

    // Scan for `=` and `:` at bracket-depth 0; leftmost qualifying character wins.
    let eq = crate::lexer::find_top_level(line, &['=']);
    let colon = crate::lexer::find_top_level(line, &[':']);

    match (eq, colon) {
        (Some((eq_i, _)), Some((colon_i, _))) => {
            if eq_i < colon_i {
                LineType::SetVariable
            } else {
                LineType::Rule
            }
        }
        (Some(_), None) => LineType::SetVariable,
        (None, Some(_)) => LineType::Rule,
        (None, None) => LineType::Error,
    }
}
