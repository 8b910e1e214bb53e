//! Convenience utilities for unit-testing used across other crates: a
//! deterministic in-memory store, a coin ledger and utxo set backed by one
//! shared chain state, and envelope fixtures.

use engine::{CoinLedger, EngineParams, Store, UtxoEntry, UtxoSource};
use model::{
    error::ExchangeError,
    order::{FillType, OrderId, Side},
    payload::{BidderInputs, CancelOrder, Envelope, OrderPayload, SubmitOrder, UtxoRef},
    CoinId, ProfileId,
};
use primitive_types::{H256, U256};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

/// In-memory [`engine::Store`] with lexicographic prefix scans.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.map.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.remove(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Balances, profiles and unspent outputs of the simulated chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainSnapshot {
    pub profiles: BTreeSet<ProfileId>,
    pub balances: BTreeMap<(ProfileId, CoinId), U256>,
    pub utxos: BTreeMap<UtxoRef, UtxoEntry>,
}

/// Shared chain state handed to the engine as separate [`CoinLedger`] and
/// [`UtxoSource`] views, so native balances and the utxo set can never drift
/// apart in tests.
#[derive(Clone, Default)]
pub struct TestChain {
    state: Rc<RefCell<ChainSnapshot>>,
    next_funding: Rc<RefCell<u64>>,
}

impl TestChain {
    pub fn ledger(&self) -> MemoryLedger {
        MemoryLedger(self.clone())
    }

    pub fn utxos(&self) -> MemoryUtxoSet {
        MemoryUtxoSet(self.clone())
    }

    pub fn register_profile(&self, id: ProfileId) {
        self.state.borrow_mut().profiles.insert(id);
    }

    pub fn set_dao_balance(&self, owner: ProfileId, coin: CoinId, amount: U256) {
        self.state.borrow_mut().balances.insert((owner, coin), amount);
    }

    pub fn dao_balance(&self, owner: ProfileId, coin: CoinId) -> U256 {
        self.state
            .borrow()
            .balances
            .get(&(owner, coin))
            .copied()
            .unwrap_or_default()
    }

    /// Mints a fresh unspent output for `owner` and returns its reference.
    pub fn fund_native(&self, owner: ProfileId, value_nanos: u64) -> UtxoRef {
        let mut counter = self.next_funding.borrow_mut();
        *counter += 1;
        let utxo = UtxoRef::new(H256::from_low_u64_be(*counter), u32::MAX);
        self.state.borrow_mut().utxos.insert(
            utxo,
            UtxoEntry {
                utxo,
                owner,
                value_nanos,
            },
        );
        utxo
    }

    pub fn native_balance(&self, owner: ProfileId) -> u64 {
        self.state
            .borrow()
            .utxos
            .values()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.value_nanos)
            .sum()
    }

    /// Total unspent native value, for conservation audits.
    pub fn native_supply(&self) -> u128 {
        self.state
            .borrow()
            .utxos
            .values()
            .map(|entry| u128::from(entry.value_nanos))
            .sum()
    }

    /// Total supply of a DAO coin across all holders.
    pub fn dao_supply(&self, coin: CoinId) -> U256 {
        self.state
            .borrow()
            .balances
            .iter()
            .filter(|((_, c), _)| *c == coin)
            .fold(U256::zero(), |total, (_, amount)| total + *amount)
    }

    /// References of all outputs currently spendable by `owner`.
    pub fn utxo_refs_for(&self, owner: ProfileId) -> Vec<UtxoRef> {
        self.state
            .borrow()
            .utxos
            .values()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.utxo)
            .collect()
    }

    /// The external collaborator's half of a profile swap: rekeys profiles,
    /// balances (owners and coin creators) and utxo ownership from one
    /// identity to the other. The engine's own `connect_identity_swap`
    /// handles the order book's referential side.
    pub fn swap_identities(&self, first: ProfileId, second: ProfileId) {
        let remap = |id: ProfileId| {
            if id == first {
                second
            } else if id == second {
                first
            } else {
                id
            }
        };
        let remap_coin = |coin: CoinId| match coin {
            CoinId::Native => CoinId::Native,
            CoinId::Dao(creator) => CoinId::Dao(remap(creator)),
        };
        let mut state = self.state.borrow_mut();
        let profiles = state.profiles.iter().map(|id| remap(*id)).collect();
        state.profiles = profiles;
        let balances = state
            .balances
            .iter()
            .map(|((owner, coin), amount)| ((remap(*owner), remap_coin(*coin)), *amount))
            .collect();
        state.balances = balances;
        for entry in state.utxos.values_mut() {
            entry.owner = remap(entry.owner);
        }
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        self.state.borrow().clone()
    }
}

pub struct MemoryLedger(TestChain);

impl CoinLedger for MemoryLedger {
    fn profile_exists(&self, id: ProfileId) -> bool {
        self.0.state.borrow().profiles.contains(&id)
    }

    fn balance(&self, id: ProfileId, coin: CoinId) -> U256 {
        self.0.dao_balance(id, coin)
    }

    fn native_balance(&self, id: ProfileId) -> u64 {
        self.0.native_balance(id)
    }

    fn transfer(
        &mut self,
        from: ProfileId,
        to: ProfileId,
        coin: CoinId,
        amount: U256,
    ) -> Result<(), ExchangeError> {
        let mut state = self.0.state.borrow_mut();
        let from_balance = state.balances.get(&(from, coin)).copied().unwrap_or_default();
        let debited = from_balance
            .checked_sub(amount)
            .ok_or(ExchangeError::CoinTransferFailed)?;
        state.balances.insert((from, coin), debited);
        let to_balance = state.balances.get(&(to, coin)).copied().unwrap_or_default();
        let credited = to_balance
            .checked_add(amount)
            .ok_or(ExchangeError::CoinTransferFailed)?;
        state.balances.insert((to, coin), credited);
        Ok(())
    }
}

pub struct MemoryUtxoSet(TestChain);

impl UtxoSource for MemoryUtxoSet {
    fn lookup(&self, utxo: &UtxoRef) -> Option<UtxoEntry> {
        self.0.state.borrow().utxos.get(utxo).cloned()
    }

    fn spend(&mut self, utxo: &UtxoRef) -> Result<UtxoEntry, ExchangeError> {
        self.0
            .state
            .borrow_mut()
            .utxos
            .remove(utxo)
            .ok_or(ExchangeError::BidderInputNoLongerExists)
    }

    fn unspend(&mut self, entry: UtxoEntry) -> Result<(), ExchangeError> {
        let replaced = self
            .0
            .state
            .borrow_mut()
            .utxos
            .insert(entry.utxo, entry);
        match replaced {
            None => Ok(()),
            Some(_) => Err(ExchangeError::InvalidTransactionEncoding),
        }
    }

    fn spendable_for(&self, owner: ProfileId) -> Vec<UtxoEntry> {
        self.0
            .state
            .borrow()
            .utxos
            .values()
            .filter(|entry| entry.owner == owner)
            .cloned()
            .collect()
    }

    fn create(&mut self, entry: UtxoEntry) -> Result<(), ExchangeError> {
        let replaced = self
            .0
            .state
            .borrow_mut()
            .utxos
            .insert(entry.utxo, entry);
        match replaced {
            None => Ok(()),
            Some(_) => Err(ExchangeError::InvalidTransactionEncoding),
        }
    }

    fn destroy(&mut self, utxo: &UtxoRef) -> Result<UtxoEntry, ExchangeError> {
        self.0
            .state
            .borrow_mut()
            .utxos
            .remove(utxo)
            .ok_or(ExchangeError::BidderInputNoLongerExists)
    }
}

// ---- envelope fixtures ----------------------------------------------------

pub fn submit(
    transactor: ProfileId,
    buy_coin: CoinId,
    sell_coin: CoinId,
    rate: &str,
    quantity: u64,
    side: Side,
    fill_type: FillType,
) -> Envelope {
    Envelope {
        transactor,
        inputs: Vec::new(),
        bidder_inputs: Vec::new(),
        payload: OrderPayload::Submit(SubmitOrder {
            buy_coin,
            sell_coin,
            scaled_rate: rate.parse().expect("fixture rate must parse"),
            quantity: quantity.into(),
            side,
            fill_type,
        }),
        fee_nanos: 0,
    }
}

pub fn cancel(transactor: ProfileId, order_id: OrderId) -> Envelope {
    Envelope {
        transactor,
        inputs: Vec::new(),
        bidder_inputs: Vec::new(),
        payload: OrderPayload::Cancel(CancelOrder { order_id }),
        fee_nanos: 0,
    }
}

pub fn with_bidder_inputs(mut envelope: Envelope, bidder: ProfileId, inputs: Vec<UtxoRef>) -> Envelope {
    envelope.bidder_inputs.push(BidderInputs { bidder, inputs });
    envelope
}

/// Sets the envelope's fee to the exact size-implied minimum. The fee field
/// is fixed width, so setting it does not change the serialized size.
pub fn finalize_fee(envelope: &mut Envelope, params: &EngineParams) {
    envelope.fee_nanos = params.min_fee_nanos(envelope.serialized_size());
}
