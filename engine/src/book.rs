//! The resting-order book over the persistent store: one record per order
//! plus the pair-priority and per-transactor indices, kept in lockstep.

use crate::store::{self, Store};
use model::{
    error::ExchangeError,
    order::{OrderEntry, OrderId},
    CoinId, ProfileId,
};

pub struct OrderBook<S> {
    store: S,
}

impl<S: Store> OrderBook<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn order(&self, order_id: &OrderId) -> Result<Option<OrderEntry>, ExchangeError> {
        self.store
            .get(&store::order_key(order_id))
            .map(|bytes| OrderEntry::decode(&bytes))
            .transpose()
    }

    pub fn insert(&mut self, order: &OrderEntry) {
        self.store
            .put(store::order_key(&order.order_id), order.encode());
        self.store
            .put(store::pair_key(order), order.order_id.as_bytes().to_vec());
        self.store.put(
            store::transactor_key(&order.transactor, &order.order_id),
            Vec::new(),
        );
    }

    /// Rewrites an order after a partial fill. Only `quantity_remaining` may
    /// differ from the stored record; the index keys derive from the
    /// immutable fields and stay untouched.
    pub fn update(&mut self, order: &OrderEntry) {
        self.store
            .put(store::order_key(&order.order_id), order.encode());
    }

    pub fn remove(&mut self, order_id: &OrderId) -> Result<Option<OrderEntry>, ExchangeError> {
        let order = match self.order(order_id)? {
            Some(order) => order,
            None => return Ok(None),
        };
        self.store.delete(&store::order_key(order_id));
        self.store.delete(&store::pair_key(&order));
        self.store
            .delete(&store::transactor_key(&order.transactor, order_id));
        Ok(Some(order))
    }

    /// Resting orders selling `sell_coin` to acquire `buy_coin`, best priced
    /// first (then oldest, then smallest id). Arguments are physical (stored)
    /// coin identities.
    pub fn orders_by_pair(
        &self,
        buy_coin: &CoinId,
        sell_coin: &CoinId,
    ) -> Result<Vec<OrderEntry>, ExchangeError> {
        self.store
            .scan_prefix(&store::pair_prefix(buy_coin, sell_coin))
            .into_iter()
            .map(|(_, value)| {
                if value.len() != 32 {
                    return Err(ExchangeError::InvalidTransactionEncoding);
                }
                let order_id = OrderId(primitive_types::H256::from_slice(&value));
                self.order(&order_id)?
                    .ok_or(ExchangeError::InvalidTransactionEncoding)
            })
            .collect()
    }

    /// Resting orders owned by the physical (stored) transactor id, ordered
    /// by order id.
    pub fn orders_by_transactor(
        &self,
        transactor: &ProfileId,
    ) -> Result<Vec<OrderEntry>, ExchangeError> {
        let prefix = store::transactor_prefix(transactor);
        self.store
            .scan_prefix(&prefix)
            .into_iter()
            .map(|(key, _)| {
                if key.len() != prefix.len() + 32 {
                    return Err(ExchangeError::InvalidTransactionEncoding);
                }
                let order_id = OrderId(primitive_types::H256::from_slice(&key[prefix.len()..]));
                self.order(&order_id)?
                    .ok_or(ExchangeError::InvalidTransactionEncoding)
            })
            .collect()
    }

    /// Every resting order. Diagnostics and replay only, never on the match
    /// path.
    pub fn orders_all(&self) -> Result<Vec<OrderEntry>, ExchangeError> {
        self.store
            .scan_prefix(&store::order_prefix())
            .into_iter()
            .map(|(_, value)| OrderEntry::decode(&value))
            .collect()
    }
}

