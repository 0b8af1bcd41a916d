// SPDX-License-Identifier: AGPL-3.0

//! Run results

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exitcode {
    Pass = 0,
    InsufficientCoverage = 1,
    /// Setup or execution error, nothing was reported
    Fatal = 2,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractReport {
    pub name: String,
    pub coverage: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MainResult {
    pub exitcode: i32,
    pub contracts: Vec<ContractReport>,
}

impl MainResult {
    pub fn empty() -> Self {
        Self {
            exitcode: Exitcode::Pass as i32,
            contracts: Vec::new(),
        }
    }

    pub fn from_reports(contracts: Vec<ContractReport>) -> Self {
        let exitcode = if contracts.iter().all(|c| c.passed) {
            Exitcode::Pass
        } else {
            Exitcode::InsufficientCoverage
        };
        Self {
            exitcode: exitcode as i32,
            contracts,
        }
    }

    pub fn total_failed(&self) -> usize {
        self.contracts.iter().filter(|c| !c.passed).count()
    }
}
