//! External balance ledger the engine settles against. The ledger owns all
//! coin balances; the engine owns only the order book.

use model::{error::ExchangeError, CoinId, ProfileId};
use primitive_types::U256;

/// Balances and profile existence, keyed by current identities. `transfer`
/// must be exactly invertible by the mirrored transfer, matching the engine's
/// rollback contract.
#[cfg_attr(test, mockall::automock)]
pub trait CoinLedger {
    fn profile_exists(&self, id: ProfileId) -> bool;
    fn balance(&self, id: ProfileId, coin: CoinId) -> U256;
    fn native_balance(&self, id: ProfileId) -> u64;
    fn transfer(
        &mut self,
        from: ProfileId,
        to: ProfileId,
        coin: CoinId,
        amount: U256,
    ) -> Result<(), ExchangeError>;
}
