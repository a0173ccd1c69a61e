//! Sub-command runner: launches a bracketed `!IF` sub-expression (`[cmd]`) through the shell and
//! reports its exit code. This is the only sub-command evaluation this core owns; recipe execution
//! itself belongs to the external dependency walker.

use std::process::Command;
use std::time::{Duration, Instant};

use crate::vars::Vars;

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_SHELL_FLAG: &str = "-c";

/// Launch `$(SHELL) -c cmd_text` and return its exit code. A failure to launch the process at all
/// (e.g. the shell binary is missing) yields `255` and is not treated as an error.
///
/// `elapsed` accumulates wall-clock time spent in sub-command launches, mirroring
/// `MakeContext`'s own timing counter.
pub fn run_and_get_exit_code(cmd_text: &str, vars: &Vars, elapsed: &mut Duration) -> u8 {
    let shell = &vars.get("SHELL").value;
    let shell = if shell.is_empty() { DEFAULT_SHELL } else { shell.as_str() };

    let start = Instant::now();
    let status = Command::new(shell).arg(DEFAULT_SHELL_FLAG).arg(cmd_text).status();
    *elapsed += start.elapsed();

    match status {
        Ok(status) => status.code().unwrap_or(255) as u8,
        Err(_) => 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command_reports_zero() {
        let vars = Vars::new([]);
        let mut elapsed = Duration::ZERO;
        assert_eq!(run_and_get_exit_code("exit 0", &vars, &mut elapsed), 0);
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let vars = Vars::new([]);
        let mut elapsed = Duration::ZERO;
        assert_eq!(run_and_get_exit_code("exit 7", &vars, &mut elapsed), 7);
    }

    #[test]
    fn launch_failure_reports_255() {
        let mut vars = Vars::new([]);
        vars.set(
            "SHELL",
            "/no/such/shell/binary",
            false,
            crate::vars::Precedence::Makefile,
        )
        .unwrap();
        let mut elapsed = Duration::ZERO;
        assert_eq!(run_and_get_exit_code("exit 0", &vars, &mut elapsed), 255);
    }

    #[test]
    fn elapsed_time_accumulates() {
        let vars = Vars::new([]);
        let mut elapsed = Duration::ZERO;
        run_and_get_exit_code("exit 0", &vars, &mut elapsed);
        assert!(elapsed >= Duration::ZERO);
    }
}
