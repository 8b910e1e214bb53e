//! Profile-swap remapping. A governance swap of two identities never moves
//! order records: the book keeps its physical keys and every read resolves
//! stored identities to their current counterparts (and query identities back
//! to their stored counterparts) through this map.

use crate::store::{self, Store};
use model::{CoinId, ProfileId};

/// The identity a stored profile id currently resolves to.
pub fn current(store: &impl Store, stored: ProfileId) -> ProfileId {
    store
        .get(&store::current_identity_key(&stored))
        .map(|bytes| ProfileId::from_slice(&bytes))
        .unwrap_or(stored)
}

/// The physical key a current identity's records live under.
pub fn stored(store: &impl Store, current: ProfileId) -> ProfileId {
    store
        .get(&store::stored_identity_key(&current))
        .map(|bytes| ProfileId::from_slice(&bytes))
        .unwrap_or(current)
}

pub fn current_coin(store: &impl Store, coin: CoinId) -> CoinId {
    match coin {
        CoinId::Native => CoinId::Native,
        CoinId::Dao(profile) => CoinId::Dao(current(store, profile)),
    }
}

pub fn stored_coin(store: &impl Store, coin: CoinId) -> CoinId {
    match coin {
        CoinId::Native => CoinId::Native,
        CoinId::Dao(profile) => CoinId::Dao(stored(store, profile)),
    }
}

/// Transposes the two current identities `first` and `second`. Applying the
/// same swap a second time restores the previous mapping, which is what the
/// disconnector relies on.
pub fn apply_swap(store: &mut impl Store, first: ProfileId, second: ProfileId) {
    let stored_first = stored(store, first);
    let stored_second = stored(store, second);
    store.put(
        store::current_identity_key(&stored_first),
        second.as_bytes().to_vec(),
    );
    store.put(
        store::current_identity_key(&stored_second),
        first.as_bytes().to_vec(),
    );
    store.put(
        store::stored_identity_key(&first),
        stored_second.as_bytes().to_vec(),
    );
    store.put(
        store::stored_identity_key(&second),
        stored_first.as_bytes().to_vec(),
    );
}

