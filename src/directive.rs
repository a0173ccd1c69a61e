//! Preprocessor directive recognizer: a longest-match scan over the `!IF`/`!IFDEF`/.../`!UNDEF`
//! keyword set.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    If,
    IfDef,
    IfNDef,
    Else,
    ElseIf,
    ElseIfDef,
    ElseIfNDef,
    EndIf,
    Include,
    Message,
    ErrorDirective,
    Undef,
}

/// Recognize the directive keyword starting a `!`-prefixed line and return `(directive,
/// argument_offset)`, where `argument_offset` is the byte offset into `line` at which the
/// directive's argument text begins (after skipping separating whitespace).
pub fn recognize(line: &str) -> Option<(Directive, usize)> {
    let bang = line.find('!')?;
    let after_bang = &line[bang + 1..];
    let keyword_start = bang + 1 + (after_bang.len() - after_bang.trim_start().len());
    let rest = line[keyword_start..].to_string();

    // Longest match first so `IFDEF`/`IFNDEF` aren't shadowed by `IF`.
    const KEYWORDS: &[(&str, Directive)] = &[
        ("IFDEF", Directive::IfDef),
        ("IFNDEF", Directive::IfNDef),
        ("IF", Directive::If),
        ("ELSE", Directive::Else),
        ("ENDIF", Directive::EndIf),
        ("ERROR", Directive::ErrorDirective),
        ("INCLUDE", Directive::Include),
        ("MESSAGE", Directive::Message),
        ("UNDEF", Directive::Undef),
    ];

    let rest_upper = rest.to_ascii_uppercase();
    let (matched_len, mut directive) = KEYWORDS
        .iter()
        .filter(|(kw, _)| rest_upper.starts_with(kw))
        .max_by_key(|(kw, _)| kw.len())
        .map(|(kw, d)| (kw.len(), *d))?;

    let mut offset = keyword_start + matched_len;

    // `!ELSE` may be immediately followed by `IF`/`IFDEF`/`IFNDEF` to form a compound directive.
    if directive == Directive::Else {
        let after = line[offset..].trim_start();
        let skipped = line[offset..].len() - after.len();
        let after_upper = after.to_ascii_uppercase();

        if after_upper.starts_with("IFNDEF") {
            directive = Directive::ElseIfNDef;
            offset += skipped + "IFNDEF".len();
        } else if after_upper.starts_with("IFDEF") {
            directive = Directive::ElseIfDef;
            offset += skipped + "IFDEF".len();
        } else if after_upper.starts_with("IF") {
            directive = Directive::ElseIf;
            offset += skipped + "IF".len();
        }
    }

    let after_keyword = &line[offset..];
    let arg_offset = offset + (after_keyword.len() - after_keyword.trim_start().len());

    Some((directive, arg_offset))
}

impl Directive {
    /// True for directives that open a new conditional nesting level.
    pub fn opens_branch(self) -> bool {
        matches!(self, Directive::If | Directive::IfDef | Directive::IfNDef)
    }

    /// True for the `!ELSE*` family.
    pub fn is_else_family(self) -> bool {
        matches!(
            self,
            Directive::Else | Directive::ElseIf | Directive::ElseIfDef | Directive::ElseIfNDef
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_plain_if() {
        let (d, off) = recognize("!IF 1 == 1").unwrap();
        assert_eq!(d, Directive::If);
        assert_eq!(&"!IF 1 == 1"[off..], "1 == 1");
    }

    #[test]
    fn ifdef_is_not_shadowed_by_if() {
        let (d, off) = recognize("!IFDEF FOO").unwrap();
        assert_eq!(d, Directive::IfDef);
        assert_eq!(&"!IFDEF FOO"[off..], "FOO");
    }

    #[test]
    fn ifndef_matches() {
        let (d, _) = recognize("!IFNDEF FOO").unwrap();
        assert_eq!(d, Directive::IfNDef);
    }

    #[test]
    fn else_if_merges_to_elseif() {
        let (d, off) = recognize("!ELSEIF 1 == 2").unwrap();
        assert_eq!(d, Directive::ElseIf);
        assert_eq!(&"!ELSEIF 1 == 2"[off..], "1 == 2");
    }

    #[test]
    fn else_space_if_merges_identically_to_elseif() {
        let (d, _) = recognize("!ELSE IF 1 == 2").unwrap();
        assert_eq!(d, Directive::ElseIf);
    }

    #[test]
    fn else_ifdef_and_ifndef_variants() {
        assert_eq!(recognize("!ELSEIFDEF X").unwrap().0, Directive::ElseIfDef);
        assert_eq!(recognize("!ELSEIFNDEF X").unwrap().0, Directive::ElseIfNDef);
        assert_eq!(recognize("!ELSE IFDEF X").unwrap().0, Directive::ElseIfDef);
        assert_eq!(recognize("!ELSE IFNDEF X").unwrap().0, Directive::ElseIfNDef);
    }

    #[test]
    fn bare_else_stays_else() {
        assert_eq!(recognize("!ELSE").unwrap().0, Directive::Else);
    }

    #[test]
    fn whitespace_between_bang_and_keyword() {
        let (d, off) = recognize("!   IF 1").unwrap();
        assert_eq!(d, Directive::If);
        assert_eq!(&"!   IF 1"[off..], "1");
    }

    #[test]
    fn other_directives() {
        assert_eq!(recognize("!ENDIF").unwrap().0, Directive::EndIf);
        assert_eq!(recognize("!INCLUDE \"a.mk\"").unwrap().0, Directive::Include);
        assert_eq!(recognize("!MESSAGE hi").unwrap().0, Directive::Message);
        assert_eq!(recognize("!ERROR oops").unwrap().0, Directive::ErrorDirective);
        assert_eq!(recognize("!UNDEF X").unwrap().0, Directive::Undef);
    }

    #[test]
    fn unrecognized_keyword_is_none() {
        assert!(recognize("!BOGUS").is_none());
    }
}
