// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uucore::error::UError;

/// Conditions that abort the whole run. Anything that only affects a single
/// process (it exited, it is a kernel thread) is not an error and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum PsmError {
    #[error("{0} requires root privileges. (try 'sudo `which {0}`')")]
    NotRoot(String),

    #[error("list_pids failed: {}: {source}", .path.display())]
    ListPids { path: PathBuf, source: io::Error },

    #[error("list_pids failed: no processes found in {}", .0.display())]
    NoProcesses(PathBuf),

    #[error("couldn't calibrate smaps layout from {}: {reason}", .path.display())]
    Calibration { path: PathBuf, reason: String },

    #[error("couldn't read details for pid {pid} ({got} != {expected}) - out of sync?")]
    ShortBlock {
        pid: u32,
        expected: usize,
        got: usize,
    },

    #[error("couldn't read details for pid {pid}: expected '{field}' at offset {offset} - out of sync?")]
    FieldMismatch {
        pid: u32,
        field: &'static str,
        offset: usize,
    },

    #[error("couldn't read smaps for pid {pid}: {source}")]
    Read { pid: u32, source: io::Error },
}

impl UError for PsmError {
    fn code(&self) -> i32 {
        1
    }
}
