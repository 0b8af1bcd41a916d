// SPDX-License-Identifier: AGPL-3.0

//! Solidity source map codec
//!
//! The compiler emits one `start:length:file:jump` record per instruction,
//! separated by `;`. Empty fields repeat the value of the previous record, so
//! `1:2:0:-;:5;;` expands to `1:2:0:-;1:5:0:-;1:5:0:-;1:5:0:-`.

use solcov_exceptions::{CoverageError, CoverageResult};
use std::fmt;

/// Kind of jump an instruction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpType {
    /// `i`: jump into a function
    Into,
    /// `o`: return from a function
    Out,
    /// `-`: ordinary jump or no jump
    Regular,
    /// Any other marker, including the empty default
    Unknown,
}

/// One decoded source-map record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub start: i64,
    pub length: i64,
    pub file_index: i64,
    pub jump: String,
}

impl SourceMapEntry {
    pub fn new(start: i64, length: i64, file_index: i64, jump: impl Into<String>) -> Self {
        Self {
            start,
            length,
            file_index,
            jump: jump.into(),
        }
    }

    pub fn jump_type(&self) -> JumpType {
        match self.jump.as_str() {
            "i" => JumpType::Into,
            "o" => JumpType::Out,
            "-" => JumpType::Regular,
            _ => JumpType::Unknown,
        }
    }

    /// Source byte range as `start..end`, `None` for compiler-generated code
    pub fn range(&self) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(self.start).ok()?;
        let length = usize::try_from(self.length).ok()?;
        Some(start..start + length)
    }

    /// Returns true when the entry points into the source file `file_index`
    pub fn belongs_to(&self, file_index: usize) -> bool {
        usize::try_from(self.file_index).map_or(false, |f| f == file_index)
    }

    /// `"start:length:"` key used to look up the AST node of this entry
    pub fn range_prefix(&self) -> String {
        format!("{}:{}:", self.start, self.length)
    }
}

impl fmt::Display for SourceMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.start, self.length, self.file_index, self.jump
        )
    }
}

/// Decoded source map, one entry per instruction in program order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap(pub Vec<SourceMapEntry>);

impl SourceMap {
    pub fn entries(&self) -> &[SourceMapEntry] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&SourceMapEntry> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceMapEntry> {
        self.0.iter()
    }

    /// Encode back into the shortest positional-diff form
    pub fn compress(&self) -> String {
        let mut prev = SourceMapEntry::default();
        let mut parts = Vec::with_capacity(self.0.len());

        for (i, entry) in self.0.iter().enumerate() {
            let mut fields = [String::new(), String::new(), String::new(), String::new()];
            // the first record spells out every non-default field
            if i == 0 || entry.start != prev.start {
                fields[0] = entry.start.to_string();
            }
            if i == 0 || entry.length != prev.length {
                fields[1] = entry.length.to_string();
            }
            if i == 0 || entry.file_index != prev.file_index {
                fields[2] = entry.file_index.to_string();
            }
            if entry.jump != prev.jump {
                fields[3] = entry.jump.clone();
            }

            let used = fields.iter().rposition(|f| !f.is_empty()).map_or(0, |p| p + 1);
            parts.push(fields[..used].join(":"));
            prev = entry.clone();
        }

        parts.join(";")
    }
}

impl fmt::Display for SourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", entry)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SourceMap {
    type Item = &'a SourceMapEntry;
    type IntoIter = std::slice::Iter<'a, SourceMapEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::str::FromStr for SourceMap {
    type Err = CoverageError;

    fn from_str(s: &str) -> CoverageResult<Self> {
        decode(s)
    }
}

fn parse_field(entry: usize, field: usize, value: &str) -> CoverageResult<i64> {
    value.parse().map_err(|_| CoverageError::Format {
        entry,
        field,
        value: value.to_string(),
    })
}

fn next_entry(index: usize, element: &str, prev: &SourceMapEntry) -> CoverageResult<SourceMapEntry> {
    let mut entry = prev.clone();
    if element.is_empty() {
        return Ok(entry);
    }

    // a 5th modifier-depth field may follow; it carries nothing we track
    for (field, value) in element.split(':').take(4).enumerate() {
        if value.is_empty() {
            continue;
        }
        match field {
            0 => entry.start = parse_field(index, field, value)?,
            1 => entry.length = parse_field(index, field, value)?,
            2 => entry.file_index = parse_field(index, field, value)?,
            _ => entry.jump = value.to_string(),
        }
    }

    Ok(entry)
}

/// Expand a compressed source map into one entry per instruction.
pub fn decode(compressed: &str) -> CoverageResult<SourceMap> {
    let mut prev = SourceMapEntry::default();
    let mut entries = Vec::new();

    for (index, element) in compressed.split(';').enumerate() {
        let entry = next_entry(index, element, &prev)?;
        entries.push(entry.clone());
        prev = entry;
    }

    tracing::trace!(entries = entries.len(), "decoded source map");
    Ok(SourceMap(entries))
}
