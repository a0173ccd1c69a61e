//! Error taxonomy for the parser/preprocessor/graph-builder.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::context::Context;

/// An error raised while parsing or preprocessing a makefile.
///
/// Every variant carries the `Context` it occurred in so the top-level stream processor can log a
/// uniform `<file>(<line>) <kind>: <msg>` message and set `error_termination`.
#[derive(Debug, Error)]
pub enum MakeError {
    /// A syntax error in a compound `!IF`/`!ELSEIF` expression (missing operator, type mismatch,
    /// non-numeric operand).
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, context: Context },

    /// An unclassifiable line (not a comment, variable assignment, rule, recipe, or directive).
    #[error("Parse error: {line}")]
    Parse { line: String, context: Context },

    /// An `!INCLUDE` (or subdirectory makefile) could not be found or opened.
    #[error("Could not read {path} ({source})")]
    Include {
        path: PathBuf,
        context: Context,
        #[source]
        source: io::Error,
    },

    /// A user-issued `!ERROR text` directive.
    #[error("{msg}")]
    UserError { msg: String, context: Context },

    /// An I/O failure unrelated to an `!INCLUDE` (e.g. reading a file-list, writing the cache).
    #[error("I/O error: {source}")]
    Io {
        context: Context,
        #[source]
        source: io::Error,
    },

    /// Any other invariant violation (duplicate rule conflicts, malformed inference-rule targets,
    /// bad variable names, and so on) that doesn't deserve its own variant.
    #[error("{msg}")]
    Other { msg: String, context: Context },
}

impl MakeError {
    /// Construct the common case: an `Other`-flavored error from any message type.
    pub fn new(msg: impl AsRef<str>, context: Context) -> Self {
        Self::Other {
            msg: msg.as_ref().to_string(),
            context,
        }
    }

    pub fn syntax(msg: impl AsRef<str>, context: Context) -> Self {
        Self::Syntax {
            msg: msg.as_ref().to_string(),
            context,
        }
    }

    pub fn parse(line: impl AsRef<str>, context: Context) -> Self {
        Self::Parse {
            line: line.as_ref().to_string(),
            context,
        }
    }

    pub fn user(msg: impl AsRef<str>, context: Context) -> Self {
        Self::UserError {
            msg: msg.as_ref().to_string(),
            context,
        }
    }

    /// The `Context` carried by any variant, used for log formatting.
    pub fn context(&self) -> &Context {
        match self {
            Self::Syntax { context, .. }
            | Self::Parse { context, .. }
            | Self::Include { context, .. }
            | Self::UserError { context, .. }
            | Self::Io { context, .. }
            | Self::Other { context, .. } => context,
        }
    }
}
