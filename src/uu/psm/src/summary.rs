// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::smaps_parser::MemUsage;
use std::cmp::Ordering;

/// Memory usage of a single process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub usage: MemUsage,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: String, usage: MemUsage) -> Self {
        Self { pid, name, usage }
    }
}

/// Memory usage of all processes sharing a display name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessGroup {
    pub name: String,
    pub pss_kb: f64,
    pub shared_kb: f64,
    pub heap_kb: f64,
    pub swap_kb: f64,
    pub count: usize,
}

impl From<ProcessRecord> for ProcessGroup {
    fn from(record: ProcessRecord) -> Self {
        Self {
            name: record.name,
            pss_kb: record.usage.pss_kb,
            shared_kb: record.usage.shared_kb,
            heap_kb: record.usage.heap_kb,
            swap_kb: record.usage.swap_kb,
            count: 1,
        }
    }
}

impl ProcessGroup {
    fn merge(&mut self, record: &ProcessRecord) {
        self.pss_kb += record.usage.pss_kb;
        self.shared_kb += record.usage.shared_kb;
        self.heap_kb += record.usage.heap_kb;
        self.swap_kb += record.usage.swap_kb;
        self.count += 1;
    }
}

// Merges records by full display name. Groups come out in name order.
pub fn aggregate(mut records: Vec<ProcessRecord>) -> Vec<ProcessGroup> {
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let mut groups: Vec<ProcessGroup> = Vec::new();
    for record in records {
        if let Some(group) = groups.last_mut().filter(|g| g.name == record.name) {
            group.merge(&record);
            continue;
        }
        groups.push(record.into());
    }
    groups
}

// Ascending by pss so the biggest consumers end up next to the prompt.
pub fn rank(groups: &mut [ProcessGroup]) {
    groups.sort_by(|a, b| match a.pss_kb.total_cmp(&b.pss_kb) {
        Ordering::Equal => a.name.cmp(&b.name),
        ordering => ordering,
    });
}
