//! Fixed-point exchange rates with exactly 38 decimals, stored in 256 bits.
//! All order-book pricing math happens on these scaled integers; floating
//! point never touches a consensus path.

use crate::error::ExchangeError;
use lazy_static::lazy_static;
use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Debug, Formatter},
    str::FromStr,
};

/// Decimal places an exchange rate is scaled by.
pub const RATE_DECIMALS: usize = 38;

lazy_static! {
    static ref ONE_38: U256 = U256::exp10(RATE_DECIMALS);
    /// `10^76`, the scaled product of two unit rates. Crossing checks compare
    /// full-width rate products against this.
    static ref ONE_76: U512 = U512::from(*ONE_38) * U512::from(*ONE_38);
}

/// An exchange rate denominating coins to sell per coin to buy, multiplied by
/// `10^38`. A zero rate on an incoming order denotes a market order; resting
/// orders always carry a non-zero rate.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScaledRate(U256);

impl ScaledRate {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn one() -> Self {
        Self(*ONE_38)
    }

    /// Wraps an already-scaled integer.
    pub fn from_scaled(raw: U256) -> Self {
        Self(raw)
    }

    pub fn as_scaled(self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Base units of the selling coin delivered for acquiring
    /// `quantity_to_buy` base units at this rate, truncated toward zero.
    pub fn sell_units(self, quantity_to_buy: U256) -> Result<U256, ExchangeError> {
        let product = self
            .0
            .checked_mul(quantity_to_buy)
            .ok_or(ExchangeError::TotalCostOverflowsUint256)?;
        Ok(product / *ONE_38)
    }

    /// Base units of the buying coin acquired by delivering
    /// `quantity_to_sell` base units at this rate, truncated toward zero.
    pub fn buy_units(self, quantity_to_sell: U256) -> Result<U256, ExchangeError> {
        if self.0.is_zero() {
            return Err(ExchangeError::InvalidExchangeRate);
        }
        let product = quantity_to_sell
            .checked_mul(*ONE_38)
            .ok_or(ExchangeError::TotalCostOverflowsUint256)?;
        Ok(product / self.0)
    }

    /// Whether an incoming order quoting `self` is willing to pay at least
    /// what a counter-order quoting `maker` demands. The two rates denominate
    /// mirrored pairs, so they cross when their product reaches unity. A zero
    /// (market) incoming rate crosses everything.
    pub fn crosses(self, maker: ScaledRate) -> bool {
        if self.is_zero() {
            return true;
        }
        self.0.full_mul(maker.0) >= *ONE_76
    }
}

impl FromStr for ScaledRate {
    type Err = ExchangeError;

    /// Parses a decimal string. At most 38 fractional digits are accepted, a
    /// consumed dot must be followed by at least one digit, and the empty
    /// string parses as the zero (market) rate.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::zero());
        }
        let mut split_dot = s.splitn(2, '.');
        let units = split_dot.next().unwrap_or_default();
        let decimals = split_dot.next().unwrap_or("0");
        if units.is_empty() || decimals.is_empty() || decimals.len() > RATE_DECIMALS {
            return Err(ExchangeError::InvalidExchangeRate);
        }
        let fractional = U256::from_dec_str(&format!("{:0<38}", decimals))
            .map_err(|_| ExchangeError::InvalidExchangeRate)?;
        let whole = U256::from_dec_str(units)
            .map_err(|_| ExchangeError::InvalidExchangeRate)?
            .checked_mul(*ONE_38)
            .ok_or(ExchangeError::InvalidExchangeRate)?;
        let scaled = whole
            .checked_add(fractional)
            .ok_or(ExchangeError::InvalidExchangeRate)?;
        Ok(Self(scaled))
    }
}

impl Debug for ScaledRate {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "{}.{:0>38}",
            self.0 / *ONE_38,
            (self.0 % *ONE_38).to_string()
        )
    }
}
