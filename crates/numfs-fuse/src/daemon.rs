//! Detaching the mount from the launching terminal.
//!
//! Background mode re-runs the binary in foreground mode as a new session
//! leader, with all standard streams redirected to /dev/null. This is a
//! single fork with `setsid()`, not the traditional double fork.

use std::process::{Command, Stdio};

/// Spawn a command as a daemon using setsid().
///
/// Returns the child's PID without waiting for it.
#[cfg(unix)]
pub fn spawn_as_daemon(command: &mut Command) -> std::io::Result<u32> {
    use std::os::unix::process::CommandExt;

    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    // setsid() also creates a new process group; process_group(0) would make
    // the child a group leader and setsid() would then fail.
    unsafe {
        command.pre_exec(|| match nix::unistd::setsid() {
            Ok(_) => Ok(()),
            Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
        });
    }

    let child = command.spawn()?;
    Ok(child.id())
}

/// Spawn a command as a daemon (non-Unix fallback).
#[cfg(not(unix))]
pub fn spawn_as_daemon(command: &mut Command) -> std::io::Result<u32> {
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    let child = command.spawn()?;
    Ok(child.id())
}

/// Builds the command that re-runs this binary in the foreground.
///
/// `args` are the original arguments without the program name. Background
/// flags are dropped and `--foreground` is appended last so it wins.
pub fn foreground_command<I, S>(program: &std::path::Path, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(program);
    for arg in args {
        let arg = arg.as_ref();
        if arg == "-b" || arg == "--background" {
            continue;
        }
        command.arg(arg);
    }
    command.arg("--foreground");
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_spawn_as_daemon_true() {
        let mut cmd = Command::new("true");
        let pid = spawn_as_daemon(&mut cmd).expect("Failed to spawn daemon");
        assert!(pid > 0, "PID should be positive");
    }

    #[test]
    fn test_foreground_command_args() {
        let cmd = foreground_command(
            std::path::Path::new("/usr/bin/numfs"),
            ["--storage", "s.json", "-b", "/mnt/calc", "-v"],
        );
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args, ["--storage", "s.json", "/mnt/calc", "-v", "--foreground"]);
        assert_eq!(cmd.get_program(), "/usr/bin/numfs");
    }
}
