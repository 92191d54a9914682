//! OS process helpers: signalling, liveness and port selection.

use std::io;
use std::net::TcpListener;

use sandbox_types::BackendKind;

use crate::LaunchError;

/// Stops node processes on teardown.
pub trait ProcessSignaler: Send + Sync {
    /// Ask `pid` to stop. Returns `false` when the process was already gone.
    fn terminate(&self, pid: u32) -> io::Result<bool>;
}

/// Sends `SIGTERM`, letting the node flush and exit cleanly.
#[derive(Clone, Copy, Debug, Default)]
pub struct SigtermSignaler;

impl ProcessSignaler for SigtermSignaler {
    fn terminate(&self, pid: u32) -> io::Result<bool> {
        let pid = to_pid(pid)?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

fn to_pid(pid: u32) -> io::Result<libc::pid_t> {
    // pid 0 and negative values address process groups
    match libc::pid_t::try_from(pid) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        )),
    }
}

/// Whether `pid` names an existing process (possibly owned by another user).
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = to_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Draw a random port from `[low, high)` that is currently bindable on loopback.
pub fn pick_free_port(backend: BackendKind, low: u16, high: u16) -> Result<u16, LaunchError> {
    const ATTEMPTS: usize = 64;
    if high <= low {
        return Err(LaunchError::NoFreePort { backend, low, high });
    }
    let span = u32::from(high - low);
    for _ in 0..ATTEMPTS {
        let raw = u32::from_le_bytes(sandbox_crypto::random_bytes::<4>()?);
        let port = low + (raw % span) as u16;
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }
    Err(LaunchError::NoFreePort { backend, low, high })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }

    #[test]
    fn pid_zero_is_never_signalled() {
        assert!(!process_alive(0));
        assert!(SigtermSignaler.terminate(0).is_err());
    }

    #[test]
    fn terminate_reaps_a_real_child() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(SigtermSignaler.terminate(pid).unwrap());
        let status = child.wait().unwrap();
        assert!(!status.success());
        assert!(!SigtermSignaler.terminate(pid).unwrap());
    }

    #[test]
    fn picked_port_is_in_range() {
        let port = pick_free_port(BackendKind::Evm, 30000, 60000).unwrap();
        assert!((30000..60000).contains(&port));
    }

    #[test]
    fn empty_range_fails() {
        assert!(matches!(
            pick_free_port(BackendKind::Evm, 5000, 5000),
            Err(LaunchError::NoFreePort { .. })
        ));
    }
}
