//! Launching programs detached from the window manager.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::{debug, warn};

/// DISPLAY for programs started from `screen`.  With more than one screen
/// the screen number replaces whatever the connection string carried, so
/// `host:0` becomes `host:0.1` for the second screen.
pub fn display_for_screen(display: &str, screen: usize, screens: usize) -> String {
    let Some(colon) = display.rfind(':') else {
        return display.to_string();
    };
    if screens < 2 {
        return display.to_string();
    }
    let number_end = display[colon..]
        .find('.')
        .map_or(display.len(), |dot| colon + dot);
    format!("{}.{}", &display[..number_end], screen)
}

/// Run `command` in its own session with DISPLAY set.  The child is reaped
/// on a background thread so it never lingers as a zombie.
pub fn spawn(command: &[String], display: &str) -> io::Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
    };
    let mut cmd = Command::new(program);
    cmd.args(args).env("DISPLAY", display);
    if let Ok(xauth) = std::env::var("XAUTHORITY") {
        cmd.env("XAUTHORITY", xauth);
    }
    // SAFETY: setsid is async-signal-safe and touches no Rust state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn()?;
    let display_name = display;
    debug!("Spawned {} (pid {}) on {}", program, child.id(), display_name);
    let name = program.clone();
    std::thread::spawn(move || {
        if let Err(err) = child.wait() {
            warn!("Failed to reap {}: {}", name, err);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_screen_keeps_display() {
        assert_eq!(display_for_screen(":0", 0, 1), ":0");
        assert_eq!(display_for_screen("host:1.0", 0, 1), "host:1.0");
    }

    #[test]
    fn screen_number_is_replaced() {
        assert_eq!(display_for_screen(":0", 1, 2), ":0.1");
        assert_eq!(display_for_screen("host:1.0", 1, 2), "host:1.1");
        assert_eq!(display_for_screen("unix", 1, 2), "unix");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(spawn(&[], ":0").is_err());
    }
}
