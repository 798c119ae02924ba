// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

// Length of the kernel's task comm name, including the terminating NUL.
const COMM_MAX: usize = 16;

/// How the executable path is compared against the short command name when
/// picking a display name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Use the basename of the executable when its path sorts at or after the
    /// short command name, the command name otherwise.
    #[default]
    Ordered,
    /// Use the basename of the executable whenever its path differs from the
    /// short command name, the command name otherwise.
    Differs,
}

impl NamePolicy {
    fn prefers_exe(self, exe: &[u8], short: &[u8]) -> bool {
        match self {
            Self::Ordered => exe >= short,
            Self::Differs => exe != short,
        }
    }
}

/// Resolves the display name of the process whose directory is `proc_dir`
/// (e.g. `/proc/1234`).
///
/// Returns `None` when the process has to be skipped: it exited, it has an
/// empty command line, or its `exe` link cannot be read (kernel threads).
pub fn resolve(proc_dir: &Path, policy: NamePolicy) -> Option<String> {
    let cmdline = fs::read(proc_dir.join("cmdline")).ok()?;
    if cmdline.is_empty() {
        return None;
    }
    let exe = fs::read_link(proc_dir.join("exe")).ok()?;

    Some(display_name(exe.as_os_str().as_bytes(), &cmdline, policy))
}

/// Picks between the basename of `exe` and the first argument in `cmdline`.
pub fn display_name(exe: &[u8], cmdline: &[u8], policy: NamePolicy) -> String {
    let command = cmdline.split(|&c| c == 0).next().unwrap_or_default();
    let short = &command[..command.len().min(COMM_MAX)];

    if policy.prefers_exe(exe, short) {
        let basename = Path::new(std::ffi::OsStr::from_bytes(exe))
            .file_name()
            .map(|name| name.as_bytes())
            .unwrap_or(exe);
        String::from_utf8_lossy(basename).into_owned()
    } else {
        String::from_utf8_lossy(command).into_owned()
    }
}
