//! Parsed, validated options threaded through `MakeContext`.
//!
//! Covers only the preprocessor/graph-builder's own flags; execution-only flags
//! (`-n`/`--just-print`, `-B`/`--always-make`, `-o`/`--old-file`, `-W`/`--what-if`, parallelism)
//! belong to the external dependency walker and are deliberately absent.

use std::path::PathBuf;

/// Validated options for one preprocessor run.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Explicit makefile path(s) given via `-f`/`--file`; first existing one is used.
    pub file: Vec<PathBuf>,
    /// Additional directories to search for `!INCLUDE`d files, via repeatable `-I`/`--include`.
    pub include_dirs: Vec<PathBuf>,
    /// Command-line variable definitions (`-D NAME=VALUE`), highest precedence.
    pub defines: Vec<(String, String)>,
    /// Variable names to undefine at startup (`-X`/`--undef`).
    pub undefines: Vec<String>,
    /// Emit a warning when an undefined variable is referenced during expansion.
    pub warn_undefined_variables: bool,
    /// Print the constructed graph as text instead of handing it to an external walker.
    pub dump: bool,
    /// Override for the directory inline files are created in; defaults to `std::env::temp_dir()`.
    pub temp_dir: Option<PathBuf>,
}

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_flags_set() {
        let opts = Opts::new();
        assert!(opts.file.is_empty());
        assert!(!opts.dump);
        assert!(!opts.warn_undefined_variables);
    }
}
