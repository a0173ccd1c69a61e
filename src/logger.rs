//! Generic logging facility with a default implementation.

use crate::context::Context;

pub const DEBUG: &str = "DEBUG";
pub const INFO: &str = "INFO";
pub const WARN: &str = "WARN";
pub const ERROR: &str = "ERROR";

const MAX_SEVERITY_LENGTH: usize = 5;

/// Generic trait any logger must implement.
pub trait Logger {
    /// Write the message somewhere.
    fn write(&self, msg: String);

    /// Log a `DEBUG` message (emitted for the `DebugBreak` line type).
    fn debug(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write(self.format_log(DEBUG, msg, context));
    }

    /// Log an `INFO` message.
    fn info(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write(self.format_log(INFO, msg, context));
    }

    /// Log a `WARN` message.
    fn warn(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write(self.format_log(WARN, msg, context));
    }

    /// Log an `ERROR` message.
    fn error(&self, msg: impl AsRef<str>, context: Option<&Context>) {
        self.write(self.format_log(ERROR, msg, context));
    }

    /// Formatter for all log messages.
    fn format_log(&self, level: &str, msg: impl AsRef<str>, context: Option<&Context>) -> String {
        let level_display = format!("{:<width$}", level, width = MAX_SEVERITY_LENGTH);
        let context_label = context
            .and_then(|c| c.label())
            .map(|l| format!("[{}] ", l))
            .unwrap_or_default();

        // Only show the context line if we are logging warnings or errors.
        let context_line = if level == WARN || level == ERROR {
            context
                .and_then(|c| c.display_line())
                .map(|l| format!("\n{}", l))
                .unwrap_or_default()
        } else {
            String::new()
        };

        format!(
            "nmk: {level_display} {context_label}| {}{}",
            msg.as_ref(),
            context_line
        )
    }
}

/// By default, print to `stderr`.
pub struct DefaultLogger {}

impl Logger for DefaultLogger {
    fn write(&self, msg: String) {
        eprintln!("{}", msg);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingLogger;
    use super::*;

    #[test]
    fn info_has_no_source_snippet() {
        let logger = RecordingLogger::default();
        let ctx = Context {
            path: Some("Makefile".into()),
            content: Some("X=1".to_string()),
            line_index: Some(0),
            ..Context::default()
        };
        logger.info("hello", Some(&ctx));
        assert!(!logger.lines.borrow()[0].contains("X=1"));
    }

    #[test]
    fn warn_includes_source_snippet() {
        let logger = RecordingLogger::default();
        let ctx = Context {
            path: Some("Makefile".into()),
            content: Some("X=1".to_string()),
            line_index: Some(0),
            ..Context::default()
        };
        logger.warn("uh oh", Some(&ctx));
        assert!(logger.lines.borrow()[0].contains("X=1"));
    }
}
