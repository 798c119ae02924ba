// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use tempfile::TempDir;
use uu_psm::{process, run, NamePolicy, PsmError, Settings, SmapsParser};

fn psm() -> Command {
    Command::new(env!("CARGO_BIN_EXE_psm"))
}

fn is_root() -> bool {
    uucore::process::geteuid() == 0
}

// A /proc lookalike: `self/smaps` for calibration plus one directory per process.
struct FakeProc {
    root: TempDir,
}

impl FakeProc {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let fake = Self { root };
        fs::create_dir(fake.root.path().join("self")).unwrap();
        fs::write(
            fake.root.path().join("self/smaps"),
            smaps(&[("/usr/bin/psm", 4, 0)]),
        )
        .unwrap();
        fake
    }

    fn add(&self, pid: u32, cmdline: &[u8], exe: Option<&str>, smaps: Option<String>) {
        let dir = self.root.path().join(pid.to_string());
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("cmdline"), cmdline).unwrap();
        if let Some(exe) = exe {
            symlink(exe, dir.join("exe")).unwrap();
        }
        if let Some(smaps) = smaps {
            fs::write(dir.join("smaps"), smaps).unwrap();
        }
    }

    fn settings(&self) -> Settings {
        Settings {
            proc_root: self.root.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }
}

fn detail(key: &str, kb: u64) -> String {
    format!("{:<16}{:>8} kB\n", format!("{key}:"), kb)
}

// (mapping name, Pss, Swap) per mapping, in the format of a 6.x kernel.
fn smaps(mappings: &[(&str, u64, u64)]) -> String {
    let mut s = String::new();
    for &(name, pss, swap) in mappings {
        s += &format!("{:<73}{name}\n", "55d0c9a5f000-55d0c9a80000 r--p 00000000 08:01 1835");
        s += &detail("Size", 132);
        s += &detail("KernelPageSize", 4);
        s += &detail("MMUPageSize", 4);
        s += &detail("Rss", 132);
        s += &detail("Pss", pss);
        s += &detail("Pss_Dirty", 0);
        s += &detail("Shared_Clean", 0);
        s += &detail("Shared_Dirty", 0);
        s += &detail("Private_Clean", 0);
        s += &detail("Private_Dirty", pss / 2);
        s += &detail("Referenced", 132);
        s += &detail("Anonymous", 0);
        s += &detail("KSM", 0);
        s += &detail("LazyFree", 0);
        s += &detail("AnonHugePages", 0);
        s += &detail("ShmemPmdMapped", 0);
        s += &detail("FilePmdMapped", 0);
        s += &detail("Shared_Hugetlb", 0);
        s += &detail("Private_Hugetlb", 0);
        s += &detail("Swap", swap);
        s += &detail("SwapPss", 0);
        s += &detail("Locked", 0);
        s += "THPeligible:    0\n";
        s += "VmFlags: rd mr mw me dw sd\n";
    }
    s
}

#[test]
fn test_invalid_arg() {
    psm().arg("--definitely-invalid").assert().failure().code(1);
}

#[test]
fn test_unexpected_operand() {
    psm().arg("1234").assert().failure().code(1);
}

#[test]
fn test_help() {
    psm()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_requires_root() {
    if is_root() {
        return;
    }
    psm()
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("requires root privileges"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_live_system() {
    if !is_root() {
        return;
    }
    psm()
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "    MB RAM    SHARED   SWAPPED\tPROCESS (COUNT)\n",
        ))
        .stdout(predicate::str::contains("\tTOTAL USED BY PROCESSES\n"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_live_system_quiet() {
    if !is_root() {
        return;
    }
    psm()
        .args(["-q", "--heap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PROCESS (COUNT)").not())
        .stdout(predicate::str::contains("TOTAL USED BY PROCESSES").not());
}

#[test]
fn test_workers_are_grouped() {
    let proc = FakeProc::new();
    proc.add(
        100,
        b"worker\0--queue\0default\0",
        Some("/usr/bin/worker"),
        Some(smaps(&[("/usr/bin/worker", 1024, 0)])),
    );
    proc.add(
        101,
        b"/usr/bin/worker\0",
        Some("/usr/bin/worker"),
        Some(smaps(&[("/usr/bin/worker", 2048, 0)])),
    );

    let expected = concat!(
        "    MB RAM    SHARED   SWAPPED\tPROCESS (COUNT)\n",
        "       3.0       1.5          \tworker (2)\n",
        "#      3.0                 0.0\tTOTAL USED BY PROCESSES\n",
    );
    assert_eq!(run(&proc.settings()).unwrap(), expected);
}

#[test]
fn test_skipped_processes() {
    let proc = FakeProc::new();
    proc.add(
        1,
        b"/sbin/init\0",
        Some("/usr/lib/systemd/systemd"),
        Some(smaps(&[("[heap]", 4096, 2048)])),
    );
    // zombie: empty command line
    proc.add(
        2,
        b"",
        Some("/usr/bin/defunct"),
        Some(smaps(&[("", 512, 0)])),
    );
    // kernel thread: no exe link
    proc.add(3, b"kthreadd\0", None, Some(smaps(&[("", 0, 0)])));
    // exited between the scan and reading its report
    proc.add(4, b"sleep\0", Some("/usr/bin/sleep"), None);

    let settings = Settings {
        show_heap: true,
        ..proc.settings()
    };
    let expected = concat!(
        "    MB RAM    SHARED      HEAP   SWAPPED\tPROCESS (COUNT)\n",
        "       4.0       2.0       4.0       2.0\tsystemd (1)\n",
        "#      4.0                           2.0\tTOTAL USED BY PROCESSES\n",
    );
    assert_eq!(run(&settings).unwrap(), expected);
}

#[test]
fn test_ranked_ascending() {
    let proc = FakeProc::new();
    proc.add(
        10,
        b"firefox\0",
        Some("/usr/lib/firefox/firefox"),
        Some(smaps(&[("", 8192, 0), ("[heap]", 2048, 0)])),
    );
    proc.add(11, b"zsh\0", Some("/usr/bin/zsh"), Some(smaps(&[("", 1024, 0)])));
    proc.add(12, b"bash\0", Some("/usr/bin/bash"), Some(smaps(&[("", 1024, 0)])));

    let settings = Settings {
        quiet: true,
        ..proc.settings()
    };
    let output = run(&settings).unwrap();
    let names: Vec<_> = output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(_, name)| name)
        .collect();
    assert_eq!(names, vec!["bash (1)", "zsh (1)", "firefox (1)"]);
}

#[test]
fn test_filter() {
    let proc = FakeProc::new();
    proc.add(20, b"bash\0", Some("/usr/bin/bash"), Some(smaps(&[("", 1024, 0)])));
    proc.add(
        21,
        b"postgres: walwriter\0",
        Some("/usr/lib/postgresql/16/bin/postgres"),
        Some(smaps(&[("", 2048, 512)])),
    );

    let settings = Settings {
        filter: Some("postgres".into()),
        ..proc.settings()
    };
    let output = run(&settings).unwrap();
    assert!(!output.contains("bash"));
    assert!(output.contains("postgres: walwriter (1)"));
    assert!(output.ends_with("#      2.0                 0.5\tTOTAL USED BY PROCESSES\n"));
}

#[test]
fn test_truncated_report_aborts() {
    let proc = FakeProc::new();
    proc.add(30, b"bash\0", Some("/usr/bin/bash"), Some(smaps(&[("", 1024, 0)])));

    let report = smaps(&[("", 2048, 0)]);
    proc.add(
        31,
        b"postgres\0",
        Some("/usr/bin/postgres"),
        Some(report[..report.len() / 2].to_string()),
    );

    match run(&proc.settings()) {
        Err(PsmError::ShortBlock { pid, .. }) => assert_eq!(pid, 31),
        other => panic!("expected the run to abort, got {other:?}"),
    }
}

#[test]
fn test_missing_calibration_report() {
    let proc = FakeProc::new();
    proc.add(40, b"bash\0", Some("/usr/bin/bash"), Some(smaps(&[("", 1024, 0)])));
    fs::remove_file(proc.path().join("self/smaps")).unwrap();

    assert!(matches!(
        run(&proc.settings()),
        Err(PsmError::Calibration { .. })
    ));
}

#[test]
fn test_empty_proc_root() {
    let proc = FakeProc::new();
    assert!(matches!(
        run(&proc.settings()),
        Err(PsmError::NoProcesses(_))
    ));
}

#[test]
fn test_calibration_read_once() {
    let proc = FakeProc::new();
    for pid in 50..54 {
        let pss = u64::from(pid - 49) * 1024;
        proc.add(
            pid,
            b"worker\0",
            Some("/usr/bin/worker"),
            Some(smaps(&[("", pss, 0)])),
        );
    }

    let parser = SmapsParser::calibrate(&proc.path().join("self/smaps")).unwrap();
    // every process below is parsed without the calibration report
    fs::remove_file(proc.path().join("self/smaps")).unwrap();

    let mut pids = process::list_pids(proc.path()).unwrap();
    pids.sort_unstable();
    assert_eq!(pids, vec![50, 51, 52, 53]);

    let records =
        process::collect_records(proc.path(), &pids, NamePolicy::default(), &parser).unwrap();
    let pss: Vec<f64> = records.iter().map(|r| r.usage.pss_kb).collect();
    assert_eq!(pss, vec![1024.5, 2048.5, 3072.5, 4096.5]);
}
