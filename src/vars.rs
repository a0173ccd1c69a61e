//! A wrapper for a `HashMap` storing the variable environment for a scope.
//!
//! The only interesting behavior here (beyond precedence) is that for some special keys we have
//! default values which should be "resettable" by setting the value to blank, and that calling
//! `get` on a key that doesn't exist should return an empty `Var`. To support these behaviors
//! without polluting the underlying `HashMap` with lots of duplicate data, `Vars` keeps fields for
//! those heap-allocated "constant" objects, so `get` can always return a reference.
//!
//! A `Precedence` tracks where each assignment came from, so command-line `-D` definitions win
//! over environment variables, which in turn win over plain makefile assignments.

use std::collections::HashMap;

/// Represents the "raw" environment coming from the OS.
pub type Env = HashMap<String, String>;

/// Relative precedence of a variable assignment. A higher precedence is never overridden by a
/// lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Makefile = 0,
    Environment = 1,
    CommandLine = 2,
}

#[derive(Clone, Debug)]
pub struct Var {
    pub value: String,
    pub recursive: bool,
    pub precedence: Precedence,
}

/// This wraps a `HashMap` and a default value, providing an easy way to get variables, handling
/// special and automatic variables properly.
#[derive(Debug)]
pub struct Vars {
    map: HashMap<String, Var>,

    // Heap-allocated "constant" `Var` objects, set up during initialization, designed to reduce
    // allocations and avoid lifetime gymnastics on `get`.
    blank: Var,
    make_var: Var,
}

impl Vars {
    /// Primary interface for configuring a new instance.
    pub fn new<const N: usize>(init: [(&str, &str); N]) -> Self {
        let exe_path = std::env::current_exe()
            .ok()
            .and_then(|p| p.canonicalize().ok())
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut vars = Self {
            map: HashMap::new(),
            blank: Var {
                value: String::new(),
                recursive: false,
                precedence: Precedence::Makefile,
            },
            make_var: Var {
                value: exe_path,
                recursive: false,
                precedence: Precedence::Makefile,
            },
        };

        for (k, v) in init {
            let _ = vars.set(k, v, false, Precedence::Makefile);
        }

        vars
    }

    /// Seed a new `Vars` from the process environment, at `Environment` precedence.
    pub fn from_env(env: Env) -> Self {
        let mut vars = Self::new([]);
        for (k, v) in env {
            let _ = vars.set(&k, &v, false, Precedence::Environment);
        }
        vars
    }

    /// Public interface for getting variables. For unknown keys, the `blank` object is returned,
    /// and some special keys have default values.
    pub fn get(&self, k: impl AsRef<str>) -> &Var {
        let k = k.as_ref().trim();
        match k {
            "MAKE" => &self.make_var,
            _ => self.map.get(k).unwrap_or(&self.blank),
        }
    }

    /// Iterate over all explicitly-set variables (not the special `MAKE` default), for scope
    /// inheritance (`src/scope.rs`).
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Var)> {
        self.map.iter()
    }

    pub fn is_defined(&self, k: impl AsRef<str>) -> bool {
        let k = k.as_ref().trim();
        k == "MAKE" || self.map.contains_key(k)
    }

    /// Public interface for setting variables. Returns `Ok(())` if set (or silently skipped
    /// because an existing value has strictly higher precedence), `Err` if the name is invalid.
    pub fn set(
        &mut self,
        k: impl AsRef<str>,
        v: impl AsRef<str>,
        recursive: bool,
        precedence: Precedence,
    ) -> Result<(), String> {
        let k = k.as_ref().trim().to_string();

        for ch in k.chars() {
            if ch.is_whitespace() {
                return Err("Variable contains whitespace.".to_string());
            }
            if let ':' | '#' | '=' = ch {
                return Err(format!("Variable contains bad character '{}'.", ch));
            }
        }

        if let Some(existing) = self.map.get(&k) {
            if existing.precedence > precedence {
                return Ok(());
            }
        }

        self.map.insert(
            k,
            Var {
                value: v.as_ref().to_string(),
                recursive,
                precedence,
            },
        );
        Ok(())
    }

    /// Remove a variable, but only if it was set at `Makefile` precedence (`!UNDEF` never touches
    /// an environment- or command-line-precedence definition).
    pub fn undef(&mut self, k: impl AsRef<str>) {
        let k = k.as_ref().trim();
        if matches!(self.map.get(k), Some(v) if v.precedence == Precedence::Makefile) {
            self.map.remove(k);
        }
    }

    /// Deterministic hash over a canonical serialization of all in-scope variables, used as part
    /// of the sub-command result cache key.
    pub fn hash_all(&self) -> u32 {
        let mut names: Vec<&String> = self.map.keys().collect();
        names.sort();
        let mut canonical = String::new();
        for name in names {
            let var = &self.map[name];
            canonical.push_str(name);
            canonical.push('=');
            canonical.push_str(&var.value);
            canonical.push('\n');
        }
        crate::hashing::hash32(canonical.as_bytes())
    }
}
