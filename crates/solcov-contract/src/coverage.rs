// SPDX-License-Identifier: AGPL-3.0

//! Per-byte coverage of one source file

use colored::*;
use solcov_exceptions::{CoverageError, CoverageResult};
use std::io::{self, Write};
use std::ops::Range;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoverageState {
    /// Not part of any statement
    #[default]
    Unmarked,
    /// Statement emitted by the compiler, not executed yet
    Reachable,
    Executed,
}

#[derive(Debug, Clone)]
pub struct SourceCoverage {
    name: String,
    source: String,
    states: Vec<CoverageState>,
}

impl SourceCoverage {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let states = vec![CoverageState::Unmarked; source.len()];
        Self {
            name: name.into(),
            source,
            states,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn states(&self) -> &[CoverageState] {
        &self.states
    }

    pub fn state_at(&self, offset: usize) -> Option<CoverageState> {
        self.states.get(offset).copied()
    }

    /// A range past the end of the source means the compiler output was
    /// produced from a different file.
    pub fn check_bounds(&self, range: &Range<usize>) -> CoverageResult<()> {
        if range.start > range.end || range.end > self.states.len() {
            return Err(CoverageError::StaleArtifact {
                contract: self.name.clone(),
                start: range.start,
                end: range.end,
                len: self.states.len(),
            });
        }
        Ok(())
    }

    /// Mark `range` as a statement
    pub fn paint_reachable(&mut self, range: Range<usize>) -> CoverageResult<()> {
        self.check_bounds(&range)?;
        self.states[range].fill(CoverageState::Reachable);
        Ok(())
    }

    /// Reachable bytes in `range` become executed; unmarked bytes stay unmarked.
    pub fn paint_executed(&mut self, range: Range<usize>) {
        let end = range.end.min(self.states.len());
        let start = range.start.min(end);
        for state in &mut self.states[start..end] {
            if *state == CoverageState::Reachable {
                *state = CoverageState::Executed;
            }
        }
    }

    /// `(executed, reachable)` byte counts
    pub fn counts(&self) -> (usize, usize) {
        self.states
            .iter()
            .fold((0, 0), |(executed, reachable), state| match state {
                CoverageState::Executed => (executed + 1, reachable),
                CoverageState::Reachable => (executed, reachable + 1),
                CoverageState::Unmarked => (executed, reachable),
            })
    }

    pub fn percentage_covered(&self) -> f64 {
        let (executed, reachable) = self.counts();
        if executed == 0 && reachable == 0 {
            return 100.0;
        }
        executed as f64 / (executed + reachable) as f64 * 100.0
    }

    /// Maximal runs of bytes sharing a state, in source order
    pub fn runs(&self) -> Vec<(CoverageState, Range<usize>)> {
        let mut runs = Vec::new();
        let mut from = 0;
        while from < self.states.len() {
            let state = self.states[from];
            let mut to = from + 1;
            while to < self.states.len() && self.states[to] == state {
                to += 1;
            }
            runs.push((state, from..to));
            from = to;
        }
        runs
    }

    /// Write the source with reachable runs in red and executed runs in green
    pub fn render<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (state, range) in self.runs() {
            let text = String::from_utf8_lossy(&self.source.as_bytes()[range]);
            match state {
                CoverageState::Reachable => write!(writer, "{}", text.red())?,
                CoverageState::Executed => write!(writer, "{}", text.green())?,
                CoverageState::Unmarked => write!(writer, "{}", text)?,
            }
        }
        Ok(())
    }
}
