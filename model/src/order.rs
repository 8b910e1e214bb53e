//! The canonical record of a resting order and its consensus byte encoding.

use crate::{
    encoding::{self, Reader},
    error::ExchangeError,
    rate::ScaledRate,
    CoinId, ProfileId,
};
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display, Formatter};

/// Which leg of the pair an order's quantity is denominated in. Both sides
/// deliver `sell_coin` and acquire `buy_coin`; a bid counts its quantity in
/// the coin being bought, an ask in the coin being sold.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Side {
    #[default]
    Bid,
    Ask,
}

impl Side {
    pub fn to_wire(self) -> u8 {
        match self {
            Side::Bid => 1,
            Side::Ask => 2,
        }
    }

    pub fn from_wire(byte: u8) -> Result<Self, ExchangeError> {
        match byte {
            1 => Ok(Side::Bid),
            2 => Ok(Side::Ask),
            _ => Err(ExchangeError::InvalidOperationType),
        }
    }
}

/// What happens to the unfilled remainder of an incoming order.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FillType {
    #[default]
    GoodTillCancelled,
    ImmediateOrCancel,
    FillOrKill,
}

impl FillType {
    pub fn to_wire(self) -> u8 {
        match self {
            FillType::GoodTillCancelled => 1,
            FillType::ImmediateOrCancel => 2,
            FillType::FillOrKill => 3,
        }
    }

    pub fn from_wire(byte: u8) -> Result<Self, ExchangeError> {
        match byte {
            1 => Ok(FillType::GoodTillCancelled),
            2 => Ok(FillType::ImmediateOrCancel),
            3 => Ok(FillType::FillOrKill),
            _ => Err(ExchangeError::InvalidFillType),
        }
    }
}

/// Unique identifier of an order: the digest of the transaction that opened
/// it.
#[derive(
    Copy, Clone, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OrderId(#[serde(with = "crate::hexadecimal")] pub H256);

impl OrderId {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for OrderId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A resting order. Only the owning transactor can cancel it, and only
/// matching can shrink `quantity_remaining`; any other mutation is a
/// consensus violation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEntry {
    pub order_id: OrderId,
    pub transactor: ProfileId,
    pub buy_coin: CoinId,
    pub sell_coin: CoinId,
    pub scaled_rate: ScaledRate,
    pub quantity_remaining: U256,
    pub side: Side,
    pub fill_type: FillType,
    pub block_height: u32,
}

impl OrderEntry {
    /// Remaining quantity expressed in base units of `buy_coin`.
    pub fn remaining_to_buy(&self) -> Result<U256, ExchangeError> {
        match self.side {
            Side::Bid => Ok(self.quantity_remaining),
            Side::Ask => self.scaled_rate.buy_units(self.quantity_remaining),
        }
    }

    /// Remaining quantity expressed in base units of `sell_coin`: what the
    /// owner still has to deliver if the order fills completely.
    pub fn remaining_to_sell(&self) -> Result<U256, ExchangeError> {
        match self.side {
            Side::Bid => self.scaled_rate.sell_units(self.quantity_remaining),
            Side::Ask => Ok(self.quantity_remaining),
        }
    }

    /// Shrinks the remainder after a fill of `bought` buy-coin units against
    /// `sold` sell-coin units, in the order's own denomination.
    pub fn apply_fill(&mut self, bought: U256, sold: U256) -> Result<(), ExchangeError> {
        let consumed = match self.side {
            Side::Bid => bought,
            Side::Ask => sold,
        };
        self.quantity_remaining = self
            .quantity_remaining
            .checked_sub(consumed)
            .ok_or(ExchangeError::InvalidQuantity)?;
        Ok(())
    }

    pub fn is_filled(&self) -> bool {
        self.quantity_remaining.is_zero()
    }

    /// Priority among counter-orders of the same pair: highest rate first
    /// (the cheapest price from the incoming order's perspective), then the
    /// earliest accepted, then the smallest id. Must be stable across nodes.
    pub fn priority_cmp(&self, other: &OrderEntry) -> Ordering {
        other
            .scaled_rate
            .cmp(&self.scaled_rate)
            .then(self.block_height.cmp(&other.block_height))
            .then(self.order_id.cmp(&other.order_id))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        encoding::put_h256(&mut buf, &self.order_id.0);
        encoding::put_profile(&mut buf, &self.transactor);
        encoding::put_coin(&mut buf, &self.buy_coin);
        encoding::put_coin(&mut buf, &self.sell_coin);
        encoding::put_u256(&mut buf, &self.scaled_rate.as_scaled());
        encoding::put_u256(&mut buf, &self.quantity_remaining);
        encoding::put_u8(&mut buf, self.side.to_wire());
        encoding::put_u8(&mut buf, self.fill_type.to_wire());
        encoding::put_u32(&mut buf, self.block_height);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ExchangeError> {
        let mut reader = Reader::new(bytes);
        let entry = Self {
            order_id: OrderId(reader.h256()?),
            transactor: reader.profile()?,
            buy_coin: reader.coin()?,
            sell_coin: reader.coin()?,
            scaled_rate: ScaledRate::from_scaled(reader.u256()?),
            quantity_remaining: reader.u256()?,
            side: Side::from_wire(reader.u8()?)?,
            fill_type: FillType::from_wire(reader.u8()?)?,
            block_height: reader.u32()?,
        };
        reader.finish()?;
        Ok(entry)
    }
}

/// Convenience builder for constructing order entries in tests and tools.
#[derive(Default)]
pub struct OrderBuilder(OrderEntry);

impl OrderBuilder {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.0.order_id = order_id;
        self
    }

    pub fn with_transactor(mut self, transactor: ProfileId) -> Self {
        self.0.transactor = transactor;
        self
    }

    pub fn with_buy_coin(mut self, coin: CoinId) -> Self {
        self.0.buy_coin = coin;
        self
    }

    pub fn with_sell_coin(mut self, coin: CoinId) -> Self {
        self.0.sell_coin = coin;
        self
    }

    pub fn with_rate(mut self, rate: ScaledRate) -> Self {
        self.0.scaled_rate = rate;
        self
    }

    pub fn with_quantity(mut self, quantity: U256) -> Self {
        self.0.quantity_remaining = quantity;
        self
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.0.side = side;
        self
    }

    pub fn with_fill_type(mut self, fill_type: FillType) -> Self {
        self.0.fill_type = fill_type;
        self
    }

    pub fn with_block_height(mut self, block_height: u32) -> Self {
        self.0.block_height = block_height;
        self
    }

    pub fn build(self) -> OrderEntry {
        self.0
    }
}
