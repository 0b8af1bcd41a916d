// SPDX-License-Identifier: AGPL-3.0

//! Simulated chain boundary
//!
//! The chain itself lives outside this crate. [`TestBackend`] is the narrow
//! surface the rig needs from it, and [`InterceptingBackend`] wraps one to
//! feed committed transactions into the rig's gas statistics.

use crate::{InstructionHook, TestRig};
use alloy_primitives::{Address, B256, U256};
use anyhow::{anyhow, Result};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub data: Vec<u8>,
    pub value: U256,
}

impl Transaction {
    pub fn create(from: Address, init_code: Vec<u8>) -> Self {
        Self {
            from,
            to: None,
            data: init_code,
            value: U256::ZERO,
        }
    }

    pub fn call(from: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            value: U256::ZERO,
        }
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub success: bool,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
}

/// Simulated chain driven by a test. Methods that execute code report every
/// instruction to `hook` and must return its errors.
pub trait TestBackend {
    fn send_transaction(
        &mut self,
        tx: &Transaction,
        hook: &mut dyn InstructionHook,
    ) -> Result<B256>;

    /// Read-only execution, never mined
    fn call(&mut self, tx: &Transaction, hook: &mut dyn InstructionHook) -> Result<Vec<u8>>;

    /// Mine pending transactions into a block
    fn commit(&mut self) -> Result<()>;

    /// `None` until the transaction is mined
    fn transaction_receipt(&self, tx_hash: &B256) -> Result<Option<Receipt>>;

    /// Release caches held by the backend
    fn close(&mut self) -> Result<()>;
}

/// Whether a mined transaction succeeded
pub fn is_successful<B: TestBackend + ?Sized>(backend: &B, tx_hash: &B256) -> Result<bool> {
    backend
        .transaction_receipt(tx_hash)?
        .map(|receipt| receipt.success)
        .ok_or_else(|| anyhow!("no receipt for transaction {}", tx_hash))
}

/// Routes execution through the rig and, on commit, charges the gas of each
/// successful call to the function it invoked.
pub struct InterceptingBackend<'r, B: TestBackend> {
    backend: B,
    rig: &'r mut TestRig,
    sent: Vec<(B256, Transaction)>,
}

impl<'r, B: TestBackend> InterceptingBackend<'r, B> {
    pub fn new(backend: B, rig: &'r mut TestRig) -> Self {
        Self {
            backend,
            rig,
            sent: Vec::new(),
        }
    }

    pub fn send_transaction(&mut self, tx: Transaction) -> Result<B256> {
        let tx_hash = self.backend.send_transaction(&tx, &mut *self.rig)?;
        self.sent.push((tx_hash, tx));
        Ok(tx_hash)
    }

    pub fn call(&mut self, tx: &Transaction) -> Result<Vec<u8>> {
        self.backend.call(tx, &mut *self.rig)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.backend.commit()?;

        for (tx_hash, tx) in std::mem::take(&mut self.sent) {
            let receipt = self
                .backend
                .transaction_receipt(&tx_hash)?
                .ok_or_else(|| anyhow!("no receipt for committed transaction {}", tx_hash))?;

            match tx.to {
                Some(to) if receipt.success => {
                    self.rig
                        .on_transaction_committed(&to, &tx.data, receipt.gas_used);
                }
                _ => debug!(%tx_hash, success = receipt.success, "gas not attributed"),
            }
        }
        Ok(())
    }

    pub fn transaction_receipt(&self, tx_hash: &B256) -> Result<Option<Receipt>> {
        self.backend.transaction_receipt(tx_hash)
    }

    pub fn is_successful(&self, tx_hash: &B256) -> Result<bool> {
        is_successful(&self.backend, tx_hash)
    }

    pub fn close(&mut self) -> Result<()> {
        self.backend.close()
    }

    pub fn rig(&self) -> &TestRig {
        self.rig
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_inner(self) -> B {
        self.backend
    }
}
