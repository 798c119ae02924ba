// This file is part of the uutils procps package.
//
// For the full copyright and license information, please view the LICENSE
// file that was distributed with this source code.

use crate::error::PsmError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

pub mod smaps_field_name {
    pub const PSS: &str = "Pss";
    pub const PRIVATE_CLEAN: &str = "Private_Clean";
    pub const PRIVATE_DIRTY: &str = "Private_Dirty";
    pub const SWAP: &str = "Swap";
    pub const NONLINEAR: &str = "Nonlinear";
    pub const VMFLAGS: &str = "VmFlags";
}

// Average error due to truncation in the kernel's pss calculation, added once per mapping.
const PSS_ADJUST: f64 = 0.5;

// The kernel pads "Key:" to 16 columns and right-aligns the value after it.
const DETAIL_VALUE_OFFSET: usize = 16;

// Column where the pathname starts in a VMA header line (73 on 64-bit).
const HEADER_NAME_OFFSET: usize = 25 + 6 * std::mem::size_of::<usize>();

const HEAP_TAG: &[u8] = b"[heap]";
const VMFLAGS_TAG: &[u8] = b"VmFlags:";

/// Memory totals of one process, in kB.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemUsage {
    pub pss_kb: f64,
    pub shared_kb: f64,
    pub heap_kb: f64,
    pub swap_kb: f64,
}

/// Position of one extracted field inside the detail block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub label: &'static str,
    pub offset: usize,
}

impl FieldSlot {
    // Reads the value of this slot. A value wider than its 8 columns (mappings of 100 GB and
    // more) pushes every following line a few bytes further, so the labelled line is looked up
    // from the calibrated offset up to `max_shift` bytes later. A label that cannot be found
    // means the block no longer has the calibrated shape.
    fn value(&self, pid: u32, block: &[u8], max_shift: usize) -> Result<f64, PsmError> {
        let mismatch = || PsmError::FieldMismatch {
            pid,
            field: self.label,
            offset: self.offset,
        };

        let start = (self.offset..=self.offset + max_shift)
            .take_while(|&start| start < block.len())
            .find(|&start| {
                (start == 0 || block[start - 1] == b'\n') && self.labels(&block[start..])
            })
            .ok_or_else(mismatch)?;

        block[start..]
            .get(DETAIL_VALUE_OFFSET..)
            .and_then(parse_decimal)
            .ok_or_else(mismatch)
    }

    fn labels(&self, line: &[u8]) -> bool {
        line.starts_with(self.label.as_bytes()) && line.get(self.label.len()) == Some(&b':')
    }
}

/// The shape of the fixed detail block that follows every VMA header line. It depends on the
/// running kernel only, so it is measured once from our own report and reused for every process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLayout {
    pub block_len: usize,
    pub line_len: usize,
    pub pss: FieldSlot,
    pub private_clean: FieldSlot,
    pub private_dirty: FieldSlot,
    pub swap: Option<FieldSlot>,
}

impl DetailLayout {
    // Measures the detail block of the first mapping in a smaps report: everything between the
    // header line and the terminator (VmFlags, Nonlinear, the next header or end of file).
    pub fn calibrate<R: BufRead>(mut reader: R) -> Result<Self, String> {
        let mut line = Vec::new();
        if reader
            .read_until(b'\n', &mut line)
            .map_err(|e| e.to_string())?
            == 0
        {
            return Err("report is empty".into());
        }

        let mut block_len = 0;
        let mut line_len = None;
        let mut pss = None;
        let mut private_clean = None;
        let mut private_dirty = None;
        let mut swap = None;

        loop {
            line.clear();
            if reader
                .read_until(b'\n', &mut line)
                .map_err(|e| e.to_string())?
                == 0
            {
                break;
            }

            let Some(key) = detail_key(&line) else {
                break;
            };
            let slot = |label| {
                Some(FieldSlot {
                    label,
                    offset: block_len,
                })
            };
            match key {
                smaps_field_name::VMFLAGS | smaps_field_name::NONLINEAR => break,
                smaps_field_name::PSS => pss = slot(smaps_field_name::PSS),
                smaps_field_name::PRIVATE_CLEAN => {
                    private_clean = slot(smaps_field_name::PRIVATE_CLEAN);
                }
                smaps_field_name::PRIVATE_DIRTY => {
                    private_dirty = slot(smaps_field_name::PRIVATE_DIRTY);
                }
                smaps_field_name::SWAP => swap = slot(smaps_field_name::SWAP),
                _ => (),
            }

            line_len.get_or_insert(trim_newline(&line).len());
            block_len += line.len();
        }

        let missing = |name: &str| format!("no '{name}' line in the first mapping");
        Ok(Self {
            block_len,
            line_len: line_len.ok_or_else(|| "first mapping has no detail lines".to_string())?,
            pss: pss.ok_or_else(|| missing(smaps_field_name::PSS))?,
            private_clean: private_clean
                .ok_or_else(|| missing(smaps_field_name::PRIVATE_CLEAN))?,
            private_dirty: private_dirty
                .ok_or_else(|| missing(smaps_field_name::PRIVATE_DIRTY))?,
            swap,
        })
    }
}

/// Parses `/proc/<PID>/smaps` reports using a layout calibrated once per run.
#[derive(Debug, Clone)]
pub struct SmapsParser {
    layout: DetailLayout,
}

impl SmapsParser {
    pub fn new(layout: DetailLayout) -> Self {
        Self { layout }
    }

    /// Calibrates from a report of the current process, normally `/proc/self/smaps`.
    pub fn calibrate(path: &Path) -> Result<Self, PsmError> {
        let calibration_error = |reason: String| PsmError::Calibration {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| calibration_error(e.to_string()))?;
        let layout = DetailLayout::calibrate(BufReader::new(file)).map_err(calibration_error)?;

        Ok(Self::new(layout))
    }

    pub fn layout(&self) -> &DetailLayout {
        &self.layout
    }

    /// Parses the report at `path`. Returns `Ok(None)` when it cannot be opened, which happens
    /// when the process exits between enumeration and now.
    pub fn parse_file(&self, pid: u32, path: &Path) -> Result<Option<MemUsage>, PsmError> {
        let Ok(file) = File::open(path) else {
            return Ok(None);
        };

        self.parse(pid, BufReader::new(file)).map(Some)
    }

    // Each mapping is a variable length header line, a detail block of exactly
    // `layout.block_len` bytes, then optional short lines up to VmFlags. A short block means the
    // layout no longer matches the report, which is fatal for the whole run. Bytes pushed out of
    // the block by an oversized value are picked up by the scan to VmFlags.
    pub fn parse<R: BufRead>(&self, pid: u32, mut reader: R) -> Result<MemUsage, PsmError> {
        let layout = &self.layout;
        let read_error = |source: io::Error| PsmError::Read { pid, source };

        let mut usage = MemUsage::default();
        let mut private_kb = 0.0;
        let mut header = Vec::new();
        let mut line = Vec::new();
        let mut block = Vec::with_capacity(layout.block_len);
        let mut have_header = false;

        'mappings: loop {
            if !have_header {
                header.clear();
                reader.read_until(b'\n', &mut header).map_err(read_error)?;
            }
            have_header = false;

            if trim_newline(&header).is_empty() {
                break;
            }
            let is_heap = header
                .get(HEADER_NAME_OFFSET..)
                .is_some_and(|name| name.starts_with(HEAP_TAG));

            block.clear();
            let got = (&mut reader)
                .take(layout.block_len as u64)
                .read_to_end(&mut block)
                .map_err(read_error)?;
            if got != layout.block_len {
                return Err(PsmError::ShortBlock {
                    pid,
                    expected: layout.block_len,
                    got,
                });
            }

            let pss = layout.pss.value(pid, &block, layout.line_len)?;
            usage.pss_kb += pss + PSS_ADJUST;
            // heap pages are private and anonymous, no truncation to compensate for
            if is_heap {
                usage.heap_kb += pss;
            }
            private_kb += layout.private_clean.value(pid, &block, layout.line_len)?;
            private_kb += layout.private_dirty.value(pid, &block, layout.line_len)?;
            if let Some(swap) = &layout.swap {
                usage.swap_kb += swap.value(pid, &block, layout.line_len)?;
            }

            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line).map_err(read_error)? == 0 {
                    break 'mappings;
                }
                if line.starts_with(VMFLAGS_TAG) {
                    break;
                }
                // Older kernels have no VmFlags line. Anything longer than a detail line is the
                // header of the next mapping.
                if trim_newline(&line).len() > layout.line_len {
                    std::mem::swap(&mut header, &mut line);
                    have_header = true;
                    break;
                }
            }
        }

        usage.shared_kb = usage.pss_kb - private_kb;
        Ok(usage)
    }
}

// Returns the key of a "Key:   value" detail line, or None for anything else (e.g. a VMA header,
// whose first token is an address range).
fn detail_key(line: &[u8]) -> Option<&str> {
    let token = line
        .split(|&c| c == b' ' || c == b'\t' || c == b'\n')
        .next()?;
    let key = token.strip_suffix(b":")?;
    std::str::from_utf8(key).ok().filter(|key| !key.is_empty())
}

fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

// Like atoi: skips leading blanks, reads digits up to the first non-digit.
fn parse_decimal(bytes: &[u8]) -> Option<f64> {
    let start = bytes.iter().position(|&c| c != b' ' && c != b'\t')?;
    let digits = &bytes[start..];
    let len = digits.iter().take_while(|c| c.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }

    let mut value = 0u64;
    for &c in &digits[..len] {
        value = value.checked_mul(10)?.checked_add(u64::from(c - b'0'))?;
    }
    Some(value as f64)
}
