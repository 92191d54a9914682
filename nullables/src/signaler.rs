//! Nullable process signaler.

use sandbox_launcher::ProcessSignaler;
use std::collections::HashSet;
use std::io;
use std::sync::Mutex;

/// Records every pid it is asked to stop. A pid reports `true` the first
/// time and `false` afterwards, like a real process that already exited.
#[derive(Default)]
pub struct RecordingSignaler {
    signalled: Mutex<Vec<u32>>,
    gone: Mutex<HashSet<u32>>,
}

impl RecordingSignaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pid signalled, in order, including repeats.
    pub fn signalled(&self) -> Vec<u32> {
        self.signalled.lock().unwrap().clone()
    }

    /// How many times `pid` was signalled.
    pub fn count(&self, pid: u32) -> usize {
        self.signalled.lock().unwrap().iter().filter(|p| **p == pid).count()
    }
}

impl ProcessSignaler for RecordingSignaler {
    fn terminate(&self, pid: u32) -> io::Result<bool> {
        self.signalled.lock().unwrap().push(pid);
        Ok(self.gone.lock().unwrap().insert(pid))
    }
}
