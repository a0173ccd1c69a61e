//! CLI entry point: locate a makefile, run it through the preprocessor/graph-builder core, and
//! either hand the result to an external dependency walker (not this crate's concern) or print it
//! via `--dump`.

mod args;

use std::path::Path;

use clap::Parser;

use args::Args;
use nmk::{DefaultLogger, Env, MakeContext};

const MAKEFILE_SEARCH: [&str; 6] = [
    "Makefile",
    "makefile",
    "BSDMakefile",
    "BSDmakefile",
    "GNUMakefile",
    "GNUmakefile",
];

fn find_makefile() -> Option<std::path::PathBuf> {
    for file in MAKEFILE_SEARCH {
        if Path::new(file).is_file() {
            return Some(std::path::PathBuf::from(file));
        }
    }
    None
}

fn exit_with<S: Into<String>>(msg: S) -> ! {
    eprintln!("nmk: {}", msg.into());
    std::process::exit(2)
}

fn main() {
    let args = Args::parse();
    let opts = args.to_opts();

    let makefile_path = match opts.file.first() {
        Some(path) => path.clone(),
        None => find_makefile().unwrap_or_else(|| exit_with("No makefile found.")),
    };
    let dump = opts.dump;

    let env: Env = std::env::vars().collect();
    let mut ctx: MakeContext<DefaultLogger> = MakeContext::new(opts, DefaultLogger {}, env);

    if let Err(e) = ctx.process_file(&makefile_path) {
        eprintln!("nmk: {}", e);
        ctx.error_termination = true;
    }

    if let Err(e) = ctx.shutdown() {
        eprintln!("nmk: error during shutdown ({})", e);
    }

    if ctx.error_termination {
        std::process::exit(1);
    }

    if dump {
        for (name, target) in ctx.rule_map.targets() {
            println!("{}: {}", name, target.parent_dependencies.join(" "));
            if !target.recipe.is_empty() {
                for line in target.recipe.lines() {
                    println!("\t{}", line);
                }
            }
        }
    }
}
