// SPDX-License-Identifier: AGPL-3.0

//! Instruction boundaries of EVM bytecode

use std::collections::HashMap;

pub const OP_PUSH0: u8 = 0x5F;
pub const OP_PUSH1: u8 = 0x60;
pub const OP_PUSH32: u8 = 0x7F;

/// Byte length of the instruction starting with `opcode`, immediates included
pub fn insn_len(opcode: u8) -> usize {
    if (OP_PUSH1..=OP_PUSH32).contains(&opcode) {
        1 + (opcode - OP_PUSH0) as usize
    } else {
        1
    }
}

/// Map every instruction start offset to its dense instruction index.
/// PUSH immediates get no entry of their own.
pub fn pc_to_instruction_index(code: &[u8]) -> HashMap<usize, usize> {
    let mut mapping = HashMap::new();
    let mut pc = 0;
    let mut index = 0;
    while pc < code.len() {
        mapping.insert(pc, index);
        pc += insn_len(code[pc]);
        index += 1;
    }
    mapping
}
