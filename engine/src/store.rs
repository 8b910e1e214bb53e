//! The order book's persistence contract: a key/value store with prefix scans
//! and the exact key layout the book writes. The layout is consensus-critical;
//! every node must produce byte-identical keys for the same state.

use model::{order::OrderEntry, order::OrderId, CoinId, ProfileId};

/// `order_id → encoded OrderEntry`.
pub const PREFIX_ORDER: u8 = 0x01;
/// `(buy, sell, !rate, height, order_id) → order_id`; prefix scans over a
/// pair yield counter-orders in match priority order.
pub const PREFIX_PAIR: u8 = 0x02;
/// `(transactor, order_id) → ()`.
pub const PREFIX_TRANSACTOR: u8 = 0x03;
/// `stored profile id → current profile id` (profile-swap remapping).
pub const PREFIX_CURRENT_IDENTITY: u8 = 0x04;
/// `current profile id → stored profile id` (inverse remapping).
pub const PREFIX_STORED_IDENTITY: u8 = 0x05;

/// Persistent key/value storage consumed by the engine. Implementations must
/// scan in ascending lexicographic byte order and be deterministic.
pub trait Store {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);
    fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>>;
    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

pub fn order_key(order_id: &OrderId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(PREFIX_ORDER);
    key.extend_from_slice(order_id.as_bytes());
    key
}

pub fn order_prefix() -> Vec<u8> {
    vec![PREFIX_ORDER]
}

pub fn pair_prefix(buy_coin: &CoinId, sell_coin: &CoinId) -> Vec<u8> {
    let mut key = Vec::with_capacity(45);
    key.push(PREFIX_PAIR);
    model::encoding::put_coin(&mut key, buy_coin);
    model::encoding::put_coin(&mut key, sell_coin);
    key
}

/// Priority key of a resting order within its pair. The rate is complemented
/// bitwise so ascending byte order walks rates descending: the maker asking
/// the smallest price in the incoming order's terms sorts first, ties broken
/// by acceptance height and then order id.
pub fn pair_key(order: &OrderEntry) -> Vec<u8> {
    let mut key = pair_prefix(&order.buy_coin, &order.sell_coin);
    let mut rate = [0u8; 32];
    order.scaled_rate.as_scaled().to_big_endian(&mut rate);
    for byte in &mut rate {
        *byte = !*byte;
    }
    key.extend_from_slice(&rate);
    key.extend_from_slice(&order.block_height.to_be_bytes());
    key.extend_from_slice(order.order_id.as_bytes());
    key
}

pub fn transactor_prefix(transactor: &ProfileId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_TRANSACTOR);
    key.extend_from_slice(transactor.as_bytes());
    key
}

pub fn transactor_key(transactor: &ProfileId, order_id: &OrderId) -> Vec<u8> {
    let mut key = transactor_prefix(transactor);
    key.extend_from_slice(order_id.as_bytes());
    key
}

pub fn current_identity_key(stored: &ProfileId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_CURRENT_IDENTITY);
    key.extend_from_slice(stored.as_bytes());
    key
}

pub fn stored_identity_key(current: &ProfileId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_STORED_IDENTITY);
    key.extend_from_slice(current.as_bytes());
    key
}
