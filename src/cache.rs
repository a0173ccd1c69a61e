//! Sub-command result cache: memoizes the exit code of a bracketed `[cmd]` substitution keyed on
//! the environment, the in-scope variables, and the command text, with an `indexmap` backing store
//! so write-back preserves insertion order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

use crate::hashing::{hash32, hash32_hex};
use crate::vars::Vars;

/// Key format: `uppercase-hex(env_hash) || uppercase-hex(var_hash) || cmd-text`, no separator.
fn cache_key(env_hash: u32, var_hash: u32, cmd_text: &str) -> String {
    format!("{}{}{}", hash32_hex(env_hash), hash32_hex(var_hash), cmd_text)
}

/// Lazily-computed, memoised hash of the joined process environment strings.
pub struct EnvHash {
    value: Option<u32>,
}

impl EnvHash {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn get(&mut self) -> u32 {
        *self.value.get_or_insert_with(|| {
            let mut pairs: Vec<(String, String)> = std::env::vars().collect();
            pairs.sort();
            let mut joined = String::new();
            for (k, v) in pairs {
                joined.push_str(&k);
                joined.push('=');
                joined.push_str(&v);
                joined.push('\0');
            }
            hash32(joined.as_bytes())
        })
    }
}

impl Default for EnvHash {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk memoisation of sub-command exit codes keyed on environment + variable state.
#[derive(Default)]
pub struct PreprocCache {
    entries: IndexMap<String, u8>,
}

impl PreprocCache {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Sidecar cache file path: the makefile name with `.pru` appended.
    pub fn sidecar_path(makefile_path: &Path) -> PathBuf {
        let mut name = makefile_path.as_os_str().to_owned();
        name.push(".pru");
        PathBuf::from(name)
    }

    /// Load a cache from its sidecar file. Any malformed line terminates loading; everything read
    /// before that line is kept.
    pub fn load(path: &Path) -> io::Result<Self> {
        let mut cache = Self::new();
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => return Err(e),
        };

        for line in content.lines() {
            match line.split_once(':') {
                Some((code_s, key)) => match code_s.parse::<u8>() {
                    Ok(code) => {
                        cache.entries.insert(key.to_string(), code);
                    }
                    Err(_) => break,
                },
                None => break,
            }
        }

        Ok(cache)
    }

    /// Persist the cache to its sidecar file, one `<decimal_exit_code>:<key>` entry per line, in
    /// insertion order.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut content = String::new();
        for (key, code) in &self.entries {
            content.push_str(&code.to_string());
            content.push(':');
            content.push_str(key);
            content.push('\n');
        }
        fs::write(path, content)
    }

    /// Look up a cached exit code for `(env_hash, var_hash, cmd_text)`.
    pub fn get(&self, env_hash: u32, var_hash: u32, cmd_text: &str) -> Option<u8> {
        self.entries.get(&cache_key(env_hash, var_hash, cmd_text)).copied()
    }

    /// Insert a new entry only if one is not already present.
    pub fn insert(&mut self, env_hash: u32, var_hash: u32, cmd_text: &str, exit_code: u8) {
        self.entries
            .entry(cache_key(env_hash, var_hash, cmd_text))
            .or_insert(exit_code);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bundles the cache with the pieces needed to run (and memoise) a sub-command: the environment
/// hash, a timing accumulator, and a handle to run the process if the cache misses. This is what
/// `src/expr.rs`'s bracketed `[cmd]` substitution calls into.
pub struct SubCommandEvaluator<'a> {
    pub cache: &'a mut PreprocCache,
    pub env_hash: &'a mut EnvHash,
    pub elapsed: &'a mut Duration,
}

impl<'a> SubCommandEvaluator<'a> {
    pub fn eval(&mut self, cmd_text: &str, vars: &Vars) -> u8 {
        let env_hash = self.env_hash.get();
        let var_hash = vars.hash_all();

        if let Some(code) = self.cache.get(env_hash, var_hash, cmd_text) {
            return code;
        }

        let code = crate::process::run_and_get_exit_code(cmd_text, vars, self.elapsed);
        self.cache.insert(env_hash, var_hash, cmd_text, code);
        code
    }
}
