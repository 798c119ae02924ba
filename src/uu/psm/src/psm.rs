// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use uucore::{error::UResult, format_usage, help_about, help_usage, process::geteuid};

mod error;
pub mod proc_name;
pub mod process;
pub mod report;
pub mod smaps_parser;
pub mod summary;

pub use crate::error::PsmError;
pub use crate::proc_name::NamePolicy;
pub use crate::smaps_parser::{DetailLayout, MemUsage, SmapsParser};
pub use crate::summary::{ProcessGroup, ProcessRecord};

const ABOUT: &str = help_about!("psm.md");
const USAGE: &str = help_usage!("psm.md");

const PROC_ROOT: &str = "/proc";

mod options {
    pub const QUIET: &str = "quiet";
    pub const HEAP: &str = "heap";
    pub const FILTER: &str = "filter";
}

/// Everything a run depends on, taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub show_heap: bool,
    pub quiet: bool,
    pub filter: Option<String>,
    pub name_policy: NamePolicy,
    pub proc_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_heap: false,
            quiet: false,
            filter: None,
            name_policy: NamePolicy::default(),
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }
}

impl From<&ArgMatches> for Settings {
    fn from(matches: &ArgMatches) -> Self {
        Self {
            show_heap: matches.get_flag(options::HEAP),
            quiet: matches.get_flag(options::QUIET),
            filter: matches.get_one::<String>(options::FILTER).cloned(),
            ..Default::default()
        }
    }
}

#[uucore::main]
pub fn uumain(args: impl uucore::Args) -> UResult<()> {
    let matches = uu_app().try_get_matches_from(args)?;
    let settings = Settings::from(&matches);

    // other users' smaps are only readable by root
    if geteuid() != 0 {
        return Err(PsmError::NotRoot(uucore::util_name().into()).into());
    }

    let report = run(&settings)?;
    print!("{report}");

    Ok(())
}

/// Calibrates the parser, reads every process and renders the report.
///
/// Nothing is returned unless every process could be read consistently, so a
/// fatal error never produces a partial report.
pub fn run(settings: &Settings) -> Result<String, PsmError> {
    let parser = SmapsParser::calibrate(&settings.proc_root.join("self").join("smaps"))?;
    let pids = process::list_pids(&settings.proc_root)?;
    let records =
        process::collect_records(&settings.proc_root, &pids, settings.name_policy, &parser)?;

    let mut groups = summary::aggregate(records);
    summary::rank(&mut groups);

    Ok(report::render(&groups, settings))
}

pub fn uu_app() -> Command {
    Command::new(uucore::util_name())
        .version(crate_version!())
        .about(ABOUT)
        .override_usage(format_usage(USAGE))
        .infer_long_args(true)
        .arg(
            Arg::new(options::QUIET)
                .short('q')
                .long(options::QUIET)
                .help("do not display column header and total footer")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(options::HEAP)
                .short('H')
                .long(options::HEAP)
                .help("show heap column")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(options::FILTER)
                .short('f')
                .long(options::FILTER)
                .value_name("STRING")
                .help("only show processes whose name contains STRING")
                .action(ArgAction::Set),
        )
}
