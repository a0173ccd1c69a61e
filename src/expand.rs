//! Variable expansion engine: a stack-based scan for `$(...)`/`${...}`/single-character `$X`
//! references, reading through `Vars` (with its `Precedence` lookup), plus the automatic macros
//! `$@`, `$<`, `$*`, and `$**` for inference-rule recipe instantiation.

use crate::vars::Vars;

/// Values substituted for the automatic macros at recipe-instantiation time. Not every macro is
/// meaningful in every context, so each field is optional; an absent macro expands to the empty
/// string, matching NMAKE's behavior outside a recipe.
#[derive(Clone, Debug, Default)]
pub struct AutomaticMacros<'a> {
    /// `$@`: the target name.
    pub target: Option<&'a str>,
    /// `$<`: the first prerequisite (inference rules only).
    pub first_prereq: Option<&'a str>,
    /// `$*`: the target's stem (name without its final extension).
    pub stem: Option<&'a str>,
    /// `$**`: all prerequisites, space-joined.
    pub all_prereqs: Option<&'a str>,
}

/// Expand all `$(NAME)`, `${NAME}`, and single-character `$X` variable references in `text`,
/// looking each one up in `vars` (falling back to `macros` for the automatic-macro letters).
/// Expansion is recursive: a variable's own value is expanded before substitution. Non-recursive
/// variables freeze their value at definition time; recursive variables are expanded lazily at
/// every reference.
pub fn expand(text: &str, vars: &Vars, macros: &AutomaticMacros) -> String {
    expand_inner(text, vars, macros, 0)
}

const MAX_EXPANSION_DEPTH: usize = 64;

fn expand_inner(text: &str, vars: &Vars, macros: &AutomaticMacros, depth: usize) -> String {
    if depth >= MAX_EXPANSION_DEPTH {
        // Runaway self-reference; stop substituting further rather than recursing forever.
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some((_, '(')) | Some((_, '{')) => {
                let (open, close) = if chars.peek().unwrap().1 == '(' { ('(', ')') } else { ('{', '}') };
                chars.next();
                let body_start = i + 2;
                let mut depth_inner: u32 = 1;
                let mut body_end = text.len();
                let rest = &text[body_start..];
                for (j, bc) in rest.char_indices() {
                    if bc == open {
                        depth_inner += 1;
                    } else if bc == close {
                        depth_inner -= 1;
                        if depth_inner == 0 {
                            body_end = body_start + j;
                            break;
                        }
                    }
                }

                let name = &text[body_start..body_end];
                // Advance the outer iterator past the consumed body and closing delimiter.
                let consumed = body_end + close.len_utf8() - body_start;
                for _ in 0..consumed {
                    chars.next();
                }

                out.push_str(&resolve(name, vars, macros, depth));
            }
            Some((_, '*')) => {
                chars.next();
                if matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    out.push_str(macros.all_prereqs.unwrap_or(""));
                } else {
                    out.push_str(&resolve_macro_char('*', macros));
                }
            }
            Some((_, next_c)) if is_automatic_macro_char(next_c) => {
                chars.next();
                out.push_str(&resolve_macro_char(next_c, macros));
            }
            Some((_, '$')) => {
                chars.next();
                out.push('$');
            }
            _ => out.push('$'),
        }
    }

    out
}

fn is_automatic_macro_char(c: char) -> bool {
    matches!(c, '@' | '<')
}

fn resolve_macro_char(c: char, macros: &AutomaticMacros) -> String {
    match c {
        '@' => macros.target.unwrap_or("").to_string(),
        '<' => macros.first_prereq.unwrap_or("").to_string(),
        '*' => macros.stem.unwrap_or("").to_string(),
        _ => String::new(),
    }
}

fn resolve(name: &str, vars: &Vars, macros: &AutomaticMacros, depth: usize) -> String {
    let var = vars.get(name);
    if var.value.is_empty() && !vars.is_defined(name) {
        return String::new();
    }
    if var.recursive {
        expand_inner(&var.value, vars, macros, depth + 1)
    } else {
        var.value.clone()
    }
}

/// Instantiate an inference rule's stored recipe template for a concrete `(target, prerequisite)`
/// pair, expanding both ordinary variables and the automatic macros `$@`/`$<`/`$*`/`$**`. This is
/// the hook the external dependency walker calls once it has matched an inference rule to a real
/// file; the parser itself never calls it, since the concrete target/prerequisite pair is not
/// known until build time.
pub fn instantiate_inference_recipe(template: &str, vars: &Vars, target: &str, prereq: &str) -> String {
    let stem = target.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(target);
    let macros = AutomaticMacros {
        target: Some(target),
        first_prereq: Some(prereq),
        stem: Some(stem),
        all_prereqs: Some(prereq),
    };
    expand(template, vars, &macros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::Precedence;

    fn vars_with(pairs: &[(&str, &str)]) -> Vars {
        let mut vars = Vars::new([]);
        for (k, v) in pairs {
            vars.set(k, v, true, Precedence::Makefile).unwrap();
        }
        vars
    }

    #[test]
    fn expands_parenthesized_reference() {
        let vars = vars_with(&[("FOO", "bar")]);
        assert_eq!(expand("$(FOO)", &vars, &AutomaticMacros::default()), "bar");
    }

    #[test]
    fn expands_brace_reference() {
        let vars = vars_with(&[("FOO", "bar")]);
        assert_eq!(expand("${FOO}", &vars, &AutomaticMacros::default()), "bar");
    }

    #[test]
    fn undefined_variable_expands_to_empty() {
        let vars = Vars::new([]);
        assert_eq!(expand("$(NOPE)", &vars, &AutomaticMacros::default()), "");
    }

    #[test]
    fn nested_reference_is_expanded_recursively() {
        let vars = vars_with(&[("A", "$(B)"), ("B", "value")]);
        assert_eq!(expand("$(A)", &vars, &AutomaticMacros::default()), "value");
    }

    #[test]
    fn literal_dollar_dollar_is_one_dollar() {
        let vars = Vars::new([]);
        assert_eq!(expand("$$", &vars, &AutomaticMacros::default()), "$");
    }

    #[test]
    fn automatic_macro_target_and_first_prereq() {
        let vars = Vars::new([]);
        let macros = AutomaticMacros {
            target: Some("foo.o"),
            first_prereq: Some("foo.c"),
            stem: Some("foo"),
            all_prereqs: Some("foo.c foo.h"),
        };
        assert_eq!(expand("$@", &vars, &macros), "foo.o");
        assert_eq!(expand("$<", &vars, &macros), "foo.c");
        assert_eq!(expand("$*", &vars, &macros), "foo");
        assert_eq!(expand("$**", &vars, &macros), "foo.c foo.h");
    }

    #[test]
    fn runaway_self_reference_terminates() {
        let vars = vars_with(&[("A", "$(A)")]);
        // Must not hang; result content is irrelevant, termination is the assertion.
        let _ = expand("$(A)", &vars, &AutomaticMacros::default());
    }

    #[test]
    fn non_recursive_variable_freezes_its_value() {
        let mut vars = Vars::new([]);
        vars.set("B", "1", true, Precedence::Makefile).unwrap();
        vars.set("A", "$(B)", false, Precedence::Makefile).unwrap();
        vars.set("B", "2", true, Precedence::Makefile).unwrap();

        // `A` was defined non-recursively while `B` was still "1", so it stays "$(B)" literally
        // and does not pick up `B`'s later reassignment.
        assert_eq!(expand("$(A)", &vars, &AutomaticMacros::default()), "$(B)");
        assert_eq!(expand("$(B)", &vars, &AutomaticMacros::default()), "2");
    }

    #[test]
    fn instantiate_inference_recipe_expands_automatic_macros() {
        let vars = Vars::new([]);
        let out = instantiate_inference_recipe("cc -c $< -o $@", &vars, "foo.o", "foo.c");
        assert_eq!(out, "cc -c foo.c -o foo.o");
    }

    #[test]
    fn text_around_reference_is_preserved() {
        let vars = vars_with(&[("FOO", "bar")]);
        assert_eq!(expand("pre-$(FOO)-post", &vars, &AutomaticMacros::default()), "pre-bar-post");
    }
}
