//! Connects order transactions to state: envelope validation, the matching
//! loop, coin settlement and native input/output reconciliation. Every
//! mutation is recorded in an ordered op-log; disconnection replays the log
//! backwards, and a mid-connect failure replays the partial log so a failed
//! transaction leaves no trace.

use crate::{
    book::OrderBook,
    identity,
    ledger::CoinLedger,
    matching::{self, MatchStep, TakerDemand},
    ops::StateOp,
    solvency,
    store::Store,
    utxo::{UtxoEntry, UtxoSource},
};
use model::{
    error::ExchangeError,
    order::{FillType, OrderEntry, OrderId, Side},
    payload::{CancelOrder, Envelope, OrderPayload, SubmitOrder, UtxoRef},
    CoinId, ProfileId,
};
use primitive_types::U256;
use std::collections::BTreeMap;

/// Chain parameters the engine is instantiated with.
#[derive(Copy, Clone, Debug)]
pub struct EngineParams {
    /// Fee rate in nanos per kilobyte of serialized transaction. The carried
    /// fee must equal the implied minimum exactly.
    pub fee_rate_nanos_per_kb: u64,
}

impl EngineParams {
    pub fn min_fee_nanos(&self, size_bytes: usize) -> u64 {
        (size_bytes as u64).saturating_mul(self.fee_rate_nanos_per_kb) / 1000
    }
}

/// One realised match, in the incoming order's orientation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker: ProfileId,
    /// Buy-coin base units the taker received.
    pub taker_bought: U256,
    /// Sell-coin base units the taker delivered.
    pub taker_sold: U256,
}

/// The record of a connected transaction: the reversible op-log plus what the
/// outer runtime wants to index.
#[derive(Clone, Debug)]
pub struct ConnectedTransaction {
    pub ops: Vec<StateOp>,
    pub fills: Vec<Fill>,
    pub outputs: Vec<UtxoEntry>,
    pub fee_nanos: u64,
}

pub struct Engine<S, L, U> {
    book: OrderBook<S>,
    ledger: L,
    utxos: U,
    params: EngineParams,
}

impl<S: Store, L: CoinLedger, U: UtxoSource> Engine<S, L, U> {
    pub fn new(store: S, ledger: L, utxos: U, params: EngineParams) -> Self {
        Self {
            book: OrderBook::new(store),
            ledger,
            utxos,
            params,
        }
    }

    /// Processes one signed order transaction atomically. On any error the
    /// partial op-log is unwound before returning, so state is untouched.
    pub fn connect_transaction(
        &mut self,
        envelope: &Envelope,
        block_height: u32,
    ) -> Result<ConnectedTransaction, ExchangeError> {
        let mut ops = Vec::new();
        match self.apply_envelope(envelope, block_height, &mut ops) {
            Ok((fills, outputs)) => Ok(ConnectedTransaction {
                ops,
                fills,
                outputs,
                fee_nanos: envelope.fee_nanos,
            }),
            Err(err) => {
                self.unwind(&ops);
                Err(err)
            }
        }
    }

    /// Transposes two identities. Resting orders are reinterpreted in place,
    /// never rewritten.
    pub fn connect_identity_swap(
        &mut self,
        first: ProfileId,
        second: ProfileId,
    ) -> ConnectedTransaction {
        identity::apply_swap(self.book.store_mut(), first, second);
        ConnectedTransaction {
            ops: vec![StateOp::SwapIdentities { first, second }],
            fills: Vec::new(),
            outputs: Vec::new(),
            fee_nanos: 0,
        }
    }

    /// Restores the state from before `transaction` was connected. Ops are
    /// inverted in reverse order; the inverse is determined by the op kind
    /// alone.
    pub fn disconnect(
        &mut self,
        transaction: &ConnectedTransaction,
    ) -> Result<(), ExchangeError> {
        for op in transaction.ops.iter().rev() {
            self.apply_inverse(op)?;
        }
        Ok(())
    }

    // ---- read-side snapshot queries -------------------------------------

    /// Read access to the underlying book, for snapshot layers and replay
    /// tooling.
    pub fn book(&self) -> &OrderBook<S> {
        &self.book
    }

    /// A resting order by id, with identities resolved to their current
    /// form.
    pub fn order(&self, order_id: &OrderId) -> Result<Option<OrderEntry>, ExchangeError> {
        Ok(self.book.order(order_id)?.map(|o| self.resolved_view(o)))
    }

    /// Resting orders selling `sell_coin` for `buy_coin` in priority order.
    /// Arguments and results are current identities.
    pub fn orders_by_pair(
        &self,
        buy_coin: CoinId,
        sell_coin: CoinId,
    ) -> Result<Vec<OrderEntry>, ExchangeError> {
        let buy = identity::stored_coin(self.book.store(), buy_coin);
        let sell = identity::stored_coin(self.book.store(), sell_coin);
        Ok(self
            .book
            .orders_by_pair(&buy, &sell)?
            .into_iter()
            .map(|o| self.resolved_view(o))
            .collect())
    }

    /// Resting orders owned by the (current) identity `transactor`.
    pub fn orders_by_transactor(
        &self,
        transactor: ProfileId,
    ) -> Result<Vec<OrderEntry>, ExchangeError> {
        let stored = identity::stored(self.book.store(), transactor);
        Ok(self
            .book
            .orders_by_transactor(&stored)?
            .into_iter()
            .map(|o| self.resolved_view(o))
            .collect())
    }

    /// Every resting order. Diagnostics and replay only.
    pub fn orders_all(&self) -> Result<Vec<OrderEntry>, ExchangeError> {
        Ok(self
            .book
            .orders_all()?
            .into_iter()
            .map(|o| self.resolved_view(o))
            .collect())
    }

    fn resolved_view(&self, mut order: OrderEntry) -> OrderEntry {
        let store = self.book.store();
        order.transactor = identity::current(store, order.transactor);
        order.buy_coin = identity::current_coin(store, order.buy_coin);
        order.sell_coin = identity::current_coin(store, order.sell_coin);
        order
    }

    // ---- connect internals ----------------------------------------------

    fn apply_envelope(
        &mut self,
        envelope: &Envelope,
        block_height: u32,
        ops: &mut Vec<StateOp>,
    ) -> Result<(Vec<Fill>, Vec<UtxoEntry>), ExchangeError> {
        if envelope.transactor.is_zero() {
            return Err(ExchangeError::InvalidTransactionEncoding);
        }
        match &envelope.payload {
            OrderPayload::Cancel(cancel) => self.apply_cancel(envelope, cancel, ops),
            OrderPayload::Submit(submit) => {
                self.apply_submit(envelope, submit, block_height, ops)
            }
        }
    }

    fn apply_cancel(
        &mut self,
        envelope: &Envelope,
        cancel: &CancelOrder,
        ops: &mut Vec<StateOp>,
    ) -> Result<(Vec<Fill>, Vec<UtxoEntry>), ExchangeError> {
        let order = self
            .book
            .order(&cancel.order_id)?
            .ok_or(ExchangeError::ToCancelNotFound)?;
        if identity::current(self.book.store(), order.transactor) != envelope.transactor {
            return Err(ExchangeError::ToCancelNotYours);
        }
        self.check_fee(envelope)?;

        self.remove_order(&order.order_id, ops)?;
        // Cancels never match; the native side only needs to satisfy the fee
        // identity (and refund any bidder inputs that came along).
        let outputs = self.settle_native(envelope, &BTreeMap::new(), &[], ops)?;
        Ok((Vec::new(), outputs))
    }

    fn apply_submit(
        &mut self,
        envelope: &Envelope,
        submit: &SubmitOrder,
        block_height: u32,
        ops: &mut Vec<StateOp>,
    ) -> Result<(Vec<Fill>, Vec<UtxoEntry>), ExchangeError> {
        let store = self.book.store();
        let buy_coin = identity::current_coin(store, submit.buy_coin);
        let sell_coin = identity::current_coin(store, submit.sell_coin);
        if buy_coin == sell_coin {
            return Err(ExchangeError::CannotBuyAndSellSameCoin);
        }
        if let Some(creator) = buy_coin.creator() {
            if !self.ledger.profile_exists(creator) {
                return Err(ExchangeError::BuyingDAOCoinCreatorMissingProfile);
            }
        }
        if let Some(creator) = sell_coin.creator() {
            if !self.ledger.profile_exists(creator) {
                return Err(ExchangeError::SellingDAOCoinCreatorMissingProfile);
            }
        }
        if submit.quantity.is_zero() {
            return Err(ExchangeError::InvalidQuantity);
        }
        let market = submit.scaled_rate.is_zero();
        if market && submit.fill_type == FillType::GoodTillCancelled {
            // Market orders never rest.
            return Err(ExchangeError::InvalidFillType);
        }

        // For limit orders the full cost must be computable in both
        // denominations before anything is matched.
        let implied_sell = if market {
            match submit.side {
                // A market ask caps its own outflow by its quantity; a market
                // bid's outflow is unknowable up front and is enforced at
                // settlement.
                Side::Ask => Some(submit.quantity),
                Side::Bid => None,
            }
        } else {
            let (to_buy, to_sell) = match submit.side {
                Side::Bid => (
                    submit.quantity,
                    submit.scaled_rate.sell_units(submit.quantity)?,
                ),
                Side::Ask => (
                    submit.scaled_rate.buy_units(submit.quantity)?,
                    submit.quantity,
                ),
            };
            if to_buy.is_zero() || to_sell.is_zero() {
                return Err(ExchangeError::TotalCostIsLessThanOneNano);
            }
            Some(to_sell)
        };

        self.check_fee(envelope)?;
        self.check_taker_funding(envelope, &sell_coin, implied_sell)?;

        // ---- the matching loop ----
        let stored_buy = identity::stored_coin(self.book.store(), sell_coin);
        let stored_sell = identity::stored_coin(self.book.store(), buy_coin);
        let candidates = self.book.orders_by_pair(&stored_buy, &stored_sell)?;

        let mut remaining = submit.quantity;
        let mut fills = Vec::new();
        let mut native_deltas: BTreeMap<ProfileId, i128> = BTreeMap::new();
        let mut maker_sequence: Vec<ProfileId> = Vec::new();

        for maker in candidates {
            if remaining.is_zero() {
                break;
            }
            // Candidates arrive best-priced first: the first maker the taker
            // is unwilling to pay ends the loop.
            if !submit.scaled_rate.crosses(maker.scaled_rate) {
                break;
            }
            let maker_current = identity::current(self.book.store(), maker.transactor);
            if maker_current == envelope.transactor {
                return Err(ExchangeError::MatchingOwnOrder);
            }

            let demand = match submit.side {
                Side::Bid => TakerDemand::Buy(remaining),
                Side::Ask => TakerDemand::Sell(remaining),
            };
            let (maker_delivers, maker_receives, maker_closed) =
                match matching::match_step(&maker, demand)? {
                    MatchStep::MakerDust => {
                        tracing::debug!(order_id = %maker.order_id, "cancelling stale maker");
                        self.remove_order(&maker.order_id, ops)?;
                        continue;
                    }
                    MatchStep::TakerDust => break,
                    MatchStep::Fill {
                        maker_delivers,
                        maker_receives,
                        maker_closed,
                    } => (maker_delivers, maker_receives, maker_closed),
                };

            // The maker may have become unable to deliver since posting; such
            // orders are cancelled in place and matching moves on.
            let available = solvency::available_to_sell(
                &self.book,
                &self.ledger,
                maker.transactor,
                buy_coin,
                Some(maker.order_id),
            )?;
            if available < maker_delivers {
                tracing::debug!(
                    order_id = %maker.order_id,
                    "cancelling undeliverable maker"
                );
                self.remove_order(&maker.order_id, ops)?;
                continue;
            }

            self.transfer_leg(
                maker_current,
                envelope.transactor,
                buy_coin,
                maker_delivers,
                &mut native_deltas,
                ops,
            )?;
            self.transfer_leg(
                envelope.transactor,
                maker_current,
                sell_coin,
                maker_receives,
                &mut native_deltas,
                ops,
            )?;

            if maker_closed {
                self.remove_order(&maker.order_id, ops)?;
            } else {
                let mut updated = maker.clone();
                updated.apply_fill(maker_receives, maker_delivers)?;
                self.book.update(&updated);
                ops.push(StateOp::UpdateOrder {
                    previous: maker.clone(),
                    updated,
                });
            }

            let consumed = match submit.side {
                Side::Bid => maker_delivers,
                Side::Ask => maker_receives,
            };
            remaining = remaining
                .checked_sub(consumed)
                .ok_or(ExchangeError::InvalidQuantity)?;
            if !maker_sequence.contains(&maker_current) {
                maker_sequence.push(maker_current);
            }
            fills.push(Fill {
                maker_order_id: maker.order_id,
                maker: maker_current,
                taker_bought: maker_delivers,
                taker_sold: maker_receives,
            });
        }

        // ---- fill-type post-conditions ----
        match submit.fill_type {
            FillType::FillOrKill if !remaining.is_zero() => {
                return Err(ExchangeError::FillOrKillOrderUnfulfilled);
            }
            FillType::GoodTillCancelled if !remaining.is_zero() => {
                let store = self.book.store();
                let resting = OrderEntry {
                    order_id: OrderId(envelope.txid()),
                    transactor: identity::stored(store, envelope.transactor),
                    buy_coin: identity::stored_coin(store, buy_coin),
                    sell_coin: identity::stored_coin(store, sell_coin),
                    scaled_rate: submit.scaled_rate,
                    quantity_remaining: remaining,
                    side: submit.side,
                    fill_type: submit.fill_type,
                    block_height,
                };
                self.book.insert(&resting);
                ops.push(StateOp::PlaceOrder { order: resting });
            }
            // ImmediateOrCancel residuals are simply discarded.
            _ => {}
        }

        let outputs = self.settle_native(envelope, &native_deltas, &maker_sequence, ops)?;
        Ok((fills, outputs))
    }

    /// The fee must equal the size-implied minimum exactly: a deficit is
    /// underpayment and an excess would break the input/output identity.
    fn check_fee(&self, envelope: &Envelope) -> Result<(), ExchangeError> {
        let minimum = self.params.min_fee_nanos(envelope.serialized_size());
        if envelope.fee_nanos != minimum {
            return Err(ExchangeError::FeeNanosBelowMinTxFee);
        }
        Ok(())
    }

    /// Opening preconditions on the submitter's funding: native sellers must
    /// bring inputs covering fee plus maximum outflow, DAO sellers must be
    /// solvent for the implied sell quantity net of their other resting
    /// orders.
    fn check_taker_funding(
        &self,
        envelope: &Envelope,
        sell_coin: &CoinId,
        implied_sell: Option<U256>,
    ) -> Result<(), ExchangeError> {
        match sell_coin {
            CoinId::Native => {
                let mut own_inputs: u128 = 0;
                for input in &envelope.inputs {
                    let entry = self
                        .utxos
                        .lookup(input)
                        .ok_or(ExchangeError::BidderInputNoLongerExists)?;
                    if entry.owner != envelope.transactor {
                        return Err(
                            ExchangeError::InputWithPublicKeyDifferentFromTxnPublicKey,
                        );
                    }
                    own_inputs += u128::from(entry.value_nanos);
                }
                let outflow = match implied_sell {
                    Some(amount) if amount > U256::from(u64::MAX) => {
                        return Err(ExchangeError::InsufficientDESOToOpenOrder);
                    }
                    Some(amount) => amount.as_u64(),
                    None => 0,
                };
                if own_inputs < u128::from(outflow) + u128::from(envelope.fee_nanos) {
                    return Err(ExchangeError::InsufficientDESOToOpenOrder);
                }
            }
            dao => {
                if let Some(required) = implied_sell {
                    let stored =
                        identity::stored(self.book.store(), envelope.transactor);
                    let available = solvency::available_to_sell(
                        &self.book,
                        &self.ledger,
                        stored,
                        *dao,
                        None,
                    )?;
                    if available < required {
                        return Err(ExchangeError::InsufficientDAOCoinsToOpenOrder);
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies one transfer leg. DAO legs go through the ledger immediately
    /// (so later solvency probes observe them); native legs accumulate into
    /// per-participant deltas settled by inputs and outputs.
    fn transfer_leg(
        &mut self,
        from: ProfileId,
        to: ProfileId,
        coin: CoinId,
        amount: U256,
        native_deltas: &mut BTreeMap<ProfileId, i128>,
        ops: &mut Vec<StateOp>,
    ) -> Result<(), ExchangeError> {
        if amount.is_zero() {
            return Ok(());
        }
        match coin {
            CoinId::Native => {
                let value = native_value(amount)?;
                *native_deltas.entry(from).or_default() -= i128::from(value);
                *native_deltas.entry(to).or_default() += i128::from(value);
            }
            dao => {
                if self.ledger.balance(from, dao) < amount {
                    return Err(ExchangeError::InsufficientDAOCoinsToOpenOrder);
                }
                self.ledger.transfer(from, to, dao, amount)?;
                ops.push(StateOp::TransferCoin {
                    from,
                    to,
                    coin: dao,
                    amount,
                });
            }
        }
        Ok(())
    }

    /// Spends the referenced inputs and emits outputs covering every
    /// participant's entitlement: unused bidder value refunds to its owner,
    /// native purchases credit the makers, the submitter takes the change,
    /// and the whole thing must balance to exactly the fee.
    fn settle_native(
        &mut self,
        envelope: &Envelope,
        native_deltas: &BTreeMap<ProfileId, i128>,
        maker_sequence: &[ProfileId],
        ops: &mut Vec<StateOp>,
    ) -> Result<Vec<UtxoEntry>, ExchangeError> {
        let mut taker_in: i128 = 0;
        for input in &envelope.inputs {
            let entry = self.spend_input(input, envelope.transactor, ops)?;
            taker_in += i128::from(entry.value_nanos);
        }

        let mut bidder_totals: BTreeMap<ProfileId, i128> = BTreeMap::new();
        let mut bidder_sequence: Vec<ProfileId> = Vec::new();
        for group in &envelope.bidder_inputs {
            if !bidder_sequence.contains(&group.bidder) {
                bidder_sequence.push(group.bidder);
            }
            for input in &group.inputs {
                let entry = self.spend_input(input, group.bidder, ops)?;
                *bidder_totals.entry(group.bidder).or_default() +=
                    i128::from(entry.value_nanos);
            }
        }

        // Output order is consensus: bidder-list order, then makers in match
        // order, then the submitter's change.
        let mut participants = bidder_sequence;
        for maker in maker_sequence {
            if !participants.contains(maker) {
                participants.push(*maker);
            }
        }
        participants.retain(|p| *p != envelope.transactor);

        let txid = envelope.txid();
        let mut outputs: Vec<UtxoEntry> = Vec::new();
        let mut total_out: i128 = 0;
        for participant in participants {
            let entitlement = bidder_totals.get(&participant).copied().unwrap_or(0)
                + native_deltas.get(&participant).copied().unwrap_or(0);
            if entitlement < 0 {
                // The maker's native outflow was not covered by the inputs
                // brought for them.
                return Err(ExchangeError::OverspendingDESO);
            }
            if entitlement > 0 {
                total_out += entitlement;
                let value = u64::try_from(entitlement)
                    .map_err(|_| ExchangeError::OverspendingDESO)?;
                self.create_output(txid, &mut outputs, participant, value, ops)?;
            }
        }

        let own_bidder_share = bidder_totals
            .get(&envelope.transactor)
            .copied()
            .unwrap_or(0);
        let taker_delta = native_deltas
            .get(&envelope.transactor)
            .copied()
            .unwrap_or(0);
        let change =
            taker_in + own_bidder_share + taker_delta - i128::from(envelope.fee_nanos);
        if change < 0 {
            return Err(ExchangeError::OverspendingDESO);
        }
        if change > 0 {
            total_out += change;
            let value = u64::try_from(change).map_err(|_| ExchangeError::OverspendingDESO)?;
            self.create_output(txid, &mut outputs, envelope.transactor, value, ops)?;
        }

        let total_in: i128 = taker_in + bidder_totals.values().sum::<i128>();
        if total_in != total_out + i128::from(envelope.fee_nanos) {
            return Err(ExchangeError::TotalInputMinusTotalOutputNotEqualToFee);
        }
        Ok(outputs)
    }

    fn spend_input(
        &mut self,
        input: &UtxoRef,
        expected_owner: ProfileId,
        ops: &mut Vec<StateOp>,
    ) -> Result<UtxoEntry, ExchangeError> {
        let entry = self
            .utxos
            .lookup(input)
            .ok_or(ExchangeError::BidderInputNoLongerExists)?;
        if entry.owner != expected_owner {
            return Err(ExchangeError::InputWithPublicKeyDifferentFromTxnPublicKey);
        }
        let entry = self.utxos.spend(input)?;
        ops.push(StateOp::SpendUtxo {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    fn create_output(
        &mut self,
        txid: primitive_types::H256,
        outputs: &mut Vec<UtxoEntry>,
        owner: ProfileId,
        value_nanos: u64,
        ops: &mut Vec<StateOp>,
    ) -> Result<(), ExchangeError> {
        let entry = UtxoEntry {
            utxo: UtxoRef::new(txid, outputs.len() as u32),
            owner,
            value_nanos,
        };
        self.utxos.create(entry.clone())?;
        ops.push(StateOp::CreateOutput {
            entry: entry.clone(),
        });
        outputs.push(entry);
        Ok(())
    }

    fn remove_order(
        &mut self,
        order_id: &OrderId,
        ops: &mut Vec<StateOp>,
    ) -> Result<(), ExchangeError> {
        let order = self
            .book
            .remove(order_id)?
            .ok_or(ExchangeError::ToCancelNotFound)?;
        ops.push(StateOp::RemoveOrder { order });
        Ok(())
    }

    fn apply_inverse(&mut self, op: &StateOp) -> Result<(), ExchangeError> {
        match op {
            StateOp::PlaceOrder { order } => {
                self.book
                    .remove(&order.order_id)?
                    .ok_or(ExchangeError::ToCancelNotFound)?;
                Ok(())
            }
            StateOp::RemoveOrder { order } => {
                self.book.insert(order);
                Ok(())
            }
            StateOp::UpdateOrder { previous, .. } => {
                self.book.update(previous);
                Ok(())
            }
            StateOp::TransferCoin {
                from,
                to,
                coin,
                amount,
            } => self.ledger.transfer(*to, *from, *coin, *amount),
            StateOp::SpendUtxo { entry } => self.utxos.unspend(entry.clone()),
            StateOp::CreateOutput { entry } => {
                self.utxos.destroy(&entry.utxo)?;
                Ok(())
            }
            StateOp::SwapIdentities { first, second } => {
                identity::apply_swap(self.book.store_mut(), *first, *second);
                Ok(())
            }
        }
    }

    /// Best-effort unwind of a partially applied transaction. Inversion of
    /// already-applied ops cannot legitimately fail; a failure here is logged
    /// and the remaining ops are still unwound.
    fn unwind(&mut self, ops: &[StateOp]) {
        for op in ops.iter().rev() {
            if let Err(err) = self.apply_inverse(op) {
                tracing::error!(kind = op.kind(), ?err, "failed to unwind operation");
            }
        }
    }
}

fn native_value(amount: U256) -> Result<u64, ExchangeError> {
    if amount > U256::from(u64::MAX) {
        return Err(ExchangeError::OverspendingDESO);
    }
    Ok(amount.as_u64())
}
