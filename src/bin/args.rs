//! `clap`-derived CLI arguments, translated into `nmk::Opts`.
//!
//! Covers only the flags this core's preprocessor/graph-builder actually consumes; execution-only
//! flags (`-B`/`--always-make`, `-o`/`--old-file`, `-n`/`--just-print`) belong to the external
//! dependency walker and are deliberately absent.

use std::path::PathBuf;

use clap::Parser;
use const_format::formatcp;

use nmk::Opts;

#[derive(Clone, Debug, Parser)]
#[clap(
    name = "nmk",
    version,
    about,
    after_help = formatcp!(
        "License:  {}\nSource:   {}", env!("CARGO_PKG_LICENSE"), env!("CARGO_PKG_REPOSITORY")
    ),
)]
pub struct Args {
    /// Read FILE as the makefile.
    #[arg(short, long, visible_alias("makefile"))]
    pub file: Option<PathBuf>,

    /// Search directory for `!INCLUDE`d files (repeatable).
    #[arg(short = 'I', long = "include")]
    pub include_dirs: Vec<PathBuf>,

    /// Define NAME=VALUE at command-line precedence (repeatable).
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    pub define: Vec<String>,

    /// Undefine NAME at startup (repeatable).
    #[arg(short = 'X', long = "undef", value_name = "NAME")]
    pub undef: Vec<String>,

    /// Warn when an undefined variable is referenced during expansion.
    #[arg(long)]
    pub warn_undefined_variables: bool,

    /// Print the constructed graph as text instead of handing it to an external walker.
    #[arg(long)]
    pub dump: bool,
}

impl Args {
    /// Parse each `-D NAME=VALUE` argument, dropping (with a printed warning) any malformed entry
    /// rather than failing the whole invocation.
    pub fn to_opts(&self) -> Opts {
        let mut opts = Opts::new();
        opts.file = self.file.iter().cloned().collect();
        opts.include_dirs = self.include_dirs.clone();
        opts.undefines = self.undef.clone();
        opts.warn_undefined_variables = self.warn_undefined_variables;
        opts.dump = self.dump;

        for entry in &self.define {
            match entry.split_once('=') {
                Some((name, value)) => opts.defines.push((name.to_string(), value.to_string())),
                None => eprintln!("nmk: ignoring malformed -D argument `{}`", entry),
            }
        }

        opts
    }
}
