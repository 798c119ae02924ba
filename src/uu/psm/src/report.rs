// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::summary::ProcessGroup;
use crate::Settings;

const CMD_DISPLAY_MAX: usize = 32;
const KB_PER_MB: f64 = 1024.0;

/// Renders ranked groups as the text table printed by psm.
///
/// Groups not matching the name filter are left out, and so is their
/// contribution to the totals in the footer.
pub fn render(groups: &[ProcessGroup], settings: &Settings) -> String {
    let mut out = String::new();

    if !settings.quiet {
        out.push_str(&header(settings.show_heap));
    }

    let mut total_pss = 0.0;
    let mut total_swap = 0.0;

    for group in groups
        .iter()
        .filter(|group| matches_filter(settings.filter.as_deref(), &group.name))
    {
        // the swap column stays blank for processes that have nothing swapped out
        let swap = if group.swap_kb > 0.0 {
            let swap = group.swap_kb / KB_PER_MB;
            total_swap += swap;
            format!("{swap:10.1}")
        } else {
            String::new()
        };
        let pss = group.pss_kb / KB_PER_MB;
        total_pss += pss;

        out.push_str(&format!("{pss:10.1}{:10.1}", group.shared_kb / KB_PER_MB));
        if settings.show_heap {
            out.push_str(&format!("{:10.1}", group.heap_kb / KB_PER_MB));
        }
        out.push_str(&format!(
            "{swap:>10}\t{} ({})\n",
            truncate_name(&group.name),
            group.count
        ));
    }

    if !settings.quiet {
        let width = if settings.show_heap { 30 } else { 20 };
        out.push_str(&format!(
            "#{total_pss:9.1}{total_swap:width$.1}\tTOTAL USED BY PROCESSES\n"
        ));
    }

    out
}

fn header(show_heap: bool) -> String {
    if show_heap {
        format!(
            "{:>10}{:>10}{:>10}{:>10}\t{}\n",
            "MB RAM", "SHARED", "HEAP", "SWAPPED", "PROCESS (COUNT)"
        )
    } else {
        format!(
            "{:>10}{:>10}{:>10}\t{}\n",
            "MB RAM", "SHARED", "SWAPPED", "PROCESS (COUNT)"
        )
    }
}

fn matches_filter(filter: Option<&str>, name: &str) -> bool {
    match filter {
        Some(filter) => name.contains(filter),
        None => true,
    }
}

// Pseudo names like "[kthreadd] with some suffix" are cut right after the bracket.
fn truncate_name(name: &str) -> &str {
    let Some((cut, _)) = name.char_indices().nth(CMD_DISPLAY_MAX) else {
        return name;
    };

    if name.starts_with('[') {
        if let Some(end) = name.find(']') {
            return &name[..=end];
        }
    }
    &name[..cut]
}
