//! The ordered log of state mutations a connected transaction produced. Each
//! variant knows its inverse by tag alone, which is what makes disconnection
//! a pure reverse walk.

use crate::utxo::UtxoEntry;
use model::{order::OrderEntry, CoinId, ProfileId};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateOp {
    /// A new resting order entered the book.
    PlaceOrder { order: OrderEntry },
    /// A resting order left the book: filled, cancelled by its owner, or
    /// cancelled in place as undeliverable.
    RemoveOrder { order: OrderEntry },
    /// A resting order's remainder shrank through a partial fill.
    UpdateOrder {
        previous: OrderEntry,
        updated: OrderEntry,
    },
    /// A coin balance moved through the ledger.
    TransferCoin {
        from: ProfileId,
        to: ProfileId,
        coin: CoinId,
        amount: U256,
    },
    /// A native input was consumed.
    SpendUtxo { entry: UtxoEntry },
    /// A settlement output was materialised.
    CreateOutput { entry: UtxoEntry },
    /// Two identities were transposed. The swap is its own inverse.
    SwapIdentities {
        first: ProfileId,
        second: ProfileId,
    },
}

impl StateOp {
    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            StateOp::PlaceOrder { .. } => "place_order",
            StateOp::RemoveOrder { .. } => "remove_order",
            StateOp::UpdateOrder { .. } => "update_order",
            StateOp::TransferCoin { .. } => "transfer_coin",
            StateOp::SpendUtxo { .. } => "spend_utxo",
            StateOp::CreateOutput { .. } => "create_output",
            StateOp::SwapIdentities { .. } => "swap_identities",
        }
    }
}
