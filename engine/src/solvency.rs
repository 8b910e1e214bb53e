//! Deliverability accounting: how much of a coin a transactor can still sell
//! once the commitments of their other resting orders are reserved.

use crate::{book::OrderBook, identity, ledger::CoinLedger, store::Store};
use model::{error::ExchangeError, order::OrderId, CoinId, ProfileId};
use primitive_types::U256;

/// Spendable balance of `coin` for the owner whose records live under the
/// physical id `owner_stored`, minus the sell-side remainder of every other
/// resting order of theirs in the same coin. `exclude` names the order under
/// consideration so it does not reserve against itself.
///
/// `coin` is a current identity; stored records resolve before comparison.
pub fn available_to_sell<S: Store, L: CoinLedger>(
    book: &OrderBook<S>,
    ledger: &L,
    owner_stored: ProfileId,
    coin: CoinId,
    exclude: Option<OrderId>,
) -> Result<U256, ExchangeError> {
    let owner = identity::current(book.store(), owner_stored);
    let total = match coin {
        CoinId::Native => U256::from(ledger.native_balance(owner)),
        dao => ledger.balance(owner, dao),
    };

    let mut reserved = U256::zero();
    for order in book.orders_by_transactor(&owner_stored)? {
        if Some(order.order_id) == exclude {
            continue;
        }
        if identity::current_coin(book.store(), order.sell_coin) != coin {
            continue;
        }
        reserved = reserved
            .checked_add(order.remaining_to_sell()?)
            .ok_or(ExchangeError::TotalCostOverflowsUint256)?;
    }

    // Over-reserved owners are simply insolvent for any further sell.
    Ok(total.saturating_sub(reserved))
}
