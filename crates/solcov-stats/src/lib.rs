// SPDX-License-Identifier: AGPL-3.0

//! Gas usage statistics. Every function returns 0 for an empty sample.

use serde::Serialize;

pub fn min(data: &[u64]) -> u64 {
    data.iter().copied().min().unwrap_or(0)
}

pub fn max(data: &[u64]) -> u64 {
    data.iter().copied().max().unwrap_or(0)
}

/// Upper median: element `len / 2` of the sorted sample. The input is not
/// reordered.
pub fn median(data: &[u64]) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    sorted[sorted.len() / 2]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GasSummary {
    pub min: u64,
    pub median: u64,
    pub max: u64,
    pub calls: usize,
}

impl GasSummary {
    pub fn from_samples(data: &[u64]) -> Self {
        Self {
            min: min(data),
            median: median(data),
            max: max(data),
            calls: data.len(),
        }
    }
}
