//! Simple implementation of a `Context` struct designed to track parsing location.

use std::path::PathBuf;

/// Represents parsing/execution context, specifically, which file and where in the file something
/// is happening.
#[derive(Clone, Debug, Default)]
pub struct Context {
    pub path: Option<PathBuf>,
    pub content: Option<String>,

    // Line/column are determined when iterating the input, so we use `usize` here to match the
    // return type of `enumerate()`. Both are `0`-indexed internally; `label()` and `display_line()`
    // add `1` to match the convention other programs (including other make implementations) use
    // when referencing line/column numbers.
    pub line_index: Option<usize>,
    pub column_index: Option<usize>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> Option<String> {
        let path_display = self.path.as_ref().map(|p| p.display())?;

        Some(match self.line_index {
            Some(line) => match self.column_index {
                Some(column) => format!("{}({},{})", path_display, line + 1, column + 1),
                None => format!("{}({})", path_display, line + 1),
            },
            None => path_display.to_string(),
        })
    }

    pub fn display_line(&self) -> Option<String> {
        self.content.as_ref().map(|content| match self.line_index {
            Some(line) => {
                let line_s = (line + 1).to_string();
                let pad = " ".repeat(line_s.len());

                match self.column_index {
                    Some(column) => format!(
                        "{pad} |\n{line_number} | {content}\n{pad} | {caret_padding}^\n",
                        pad = pad,
                        line_number = line_s,
                        content = content,
                        caret_padding = " ".repeat(column),
                    ),
                    None => format!(
                        "{pad} |\n{line_number} | {content}\n{pad} |\n",
                        pad = pad,
                        line_number = line_s,
                        content = content,
                    ),
                }
            }
            None => format!(" | {content}\n", content = content),
        })
    }

    /// Build a context that only carries a line index, used when a `Context` is needed before a
    /// path is known (e.g. for command-line `-D` variable errors).
    pub fn at_line(line_index: usize) -> Self {
        Self {
            line_index: Some(line_index),
            ..Self::default()
        }
    }
}

impl From<PathBuf> for Context {
    fn from(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_without_path_is_none() {
        assert_eq!(Context::new().label(), None);
    }

    #[test]
    fn label_with_path_and_line() {
        let ctx = Context {
            path: Some(PathBuf::from("Makefile")),
            line_index: Some(4),
            ..Context::default()
        };
        assert_eq!(ctx.label().unwrap(), "Makefile(5)");
    }

    #[test]
    fn display_line_pads_to_line_number_width() {
        let ctx = Context {
            content: Some("A: B".to_string()),
            line_index: Some(9),
            ..Context::default()
        };
        let rendered = ctx.display_line().unwrap();
        assert!(rendered.contains("10 | A: B"));
    }
}
