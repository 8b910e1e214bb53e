//! Consensus-level data types of the DAO-coin limit-order exchange: assets,
//! exchange rates, order records and the signed transaction envelope, together
//! with their canonical byte encodings.

pub mod encoding;
pub mod error;
pub mod hexadecimal;
pub mod order;
pub mod payload;
pub mod rate;

use primitive_types::H160;
use serde::{Deserialize, Serialize};

/// Stable identity of a profile. Zero is reserved and never a valid
/// transactor.
pub type ProfileId = H160;

/// A fungible asset: the native chain currency or the DAO coin minted against
/// a creator profile.
///
/// The derived ordering (`Native` before any `Dao`, `Dao` bytewise) is part of
/// the persistent key layout and must not change.
#[derive(
    Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum CoinId {
    #[default]
    Native,
    Dao(ProfileId),
}

impl CoinId {
    pub fn is_native(&self) -> bool {
        matches!(self, CoinId::Native)
    }

    /// The creator profile behind a DAO coin, if any.
    pub fn creator(&self) -> Option<ProfileId> {
        match self {
            CoinId::Native => None,
            CoinId::Dao(profile) => Some(*profile),
        }
    }
}
