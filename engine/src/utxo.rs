//! Native-coin unspent outputs as seen by the engine. Selection and signing
//! live outside; the engine only spends referenced inputs, restores them on
//! rollback and materialises settlement outputs.

use model::{error::ExchangeError, payload::UtxoRef, ProfileId};
use serde::{Deserialize, Serialize};

/// An unspent native-coin output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub utxo: UtxoRef,
    pub owner: ProfileId,
    pub value_nanos: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait UtxoSource {
    fn lookup(&self, utxo: &UtxoRef) -> Option<UtxoEntry>;
    fn spend(&mut self, utxo: &UtxoRef) -> Result<UtxoEntry, ExchangeError>;
    fn unspend(&mut self, entry: UtxoEntry) -> Result<(), ExchangeError>;
    /// Unspent outputs currently owned by `owner`, in deterministic order.
    fn spendable_for(&self, owner: ProfileId) -> Vec<UtxoEntry>;
    fn create(&mut self, entry: UtxoEntry) -> Result<(), ExchangeError>;
    fn destroy(&mut self, utxo: &UtxoRef) -> Result<UtxoEntry, ExchangeError>;
}
