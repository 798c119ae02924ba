// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::error::PsmError;
use crate::proc_name::{self, NamePolicy};
use crate::smaps_parser::SmapsParser;
use crate::summary::ProcessRecord;
use std::path::Path;
use walkdir::WalkDir;

/// Lists the pids currently present in `proc_root`.
///
/// This is a best effort snapshot: processes that come and go during the
/// scan may or may not be part of it. Only a `proc_root` that cannot be read
/// at all, or that holds no process, is an error.
pub fn list_pids(proc_root: &Path) -> Result<Vec<u32>, PsmError> {
    let mut pids = Vec::new();

    for entry in WalkDir::new(proc_root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(PsmError::ListPids {
                    path: proc_root.to_path_buf(),
                    source: e.into(),
                });
            }
            Err(_) => continue,
        };

        let name = entry.file_name().to_string_lossy();
        if !name.starts_with(|c: char| c.is_ascii_digit()) || !entry.file_type().is_dir() {
            continue;
        }
        if let Ok(pid) = name.parse::<u32>() {
            pids.push(pid);
        }
    }

    if pids.is_empty() {
        return Err(PsmError::NoProcesses(proc_root.to_path_buf()));
    }
    Ok(pids)
}

/// Reads name and memory usage of one process.
///
/// `Ok(None)` means the process is not part of the report: it exited, it is a
/// kernel thread or it has no command line.
pub fn read_process(
    proc_root: &Path,
    pid: u32,
    policy: NamePolicy,
    parser: &SmapsParser,
) -> Result<Option<ProcessRecord>, PsmError> {
    let dir = proc_root.join(pid.to_string());
    let Some(name) = proc_name::resolve(&dir, policy) else {
        return Ok(None);
    };

    match parser.parse_file(pid, &dir.join("smaps")) {
        Ok(Some(usage)) => Ok(Some(ProcessRecord::new(pid, name, usage))),
        // the process went away while we were reading its report
        Ok(None) | Err(PsmError::Read { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Collects a record for every pid that can be read, stopping at the first
/// fatal error.
pub fn collect_records(
    proc_root: &Path,
    pids: &[u32],
    policy: NamePolicy,
    parser: &SmapsParser,
) -> Result<Vec<ProcessRecord>, PsmError> {
    let mut records = Vec::with_capacity(pids.len());
    for &pid in pids {
        if let Some(record) = read_process(proc_root, pid, policy, parser)? {
            records.push(record);
        }
    }
    Ok(records)
}
