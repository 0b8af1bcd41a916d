// SPDX-License-Identifier: AGPL-3.0

//! Hashing utilities for bytecode identity and ABI selectors

use alloy_primitives::B256;
use sha3::{Digest, Keccak256};

/// Four-byte ABI function selector
pub type Selector = [u8; 4];

/// Compute Keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Content hash of deployed bytecode, as reported by the EVM for a code account
pub fn code_hash(code: &[u8]) -> B256 {
    B256::from(keccak256(code))
}

/// Compute function selector (first 4 bytes of keccak256)
pub fn function_selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Read the selector prefix of ABI-encoded call data
pub fn selector_of(calldata: &[u8]) -> Option<Selector> {
    calldata.get(..4)?.try_into().ok()
}

/// Hex-encode a selector with a `0x` prefix
pub fn hex_selector(selector: &Selector) -> String {
    format!("0x{}", hex::encode(selector))
}
