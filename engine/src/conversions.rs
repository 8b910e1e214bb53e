//! Conversions between 256-bit amounts and arbitrary-precision integers,
//! used by the test suites to cross-check price and conservation laws with
//! exact rational arithmetic. Nothing here runs on a consensus path.

use model::error::ExchangeError;
use num::bigint::Sign;
use num::{BigInt, BigRational};
use primitive_types::U256;

pub fn u256_to_big_int(input: &U256) -> BigInt {
    let mut bytes = [0; 32];
    input.to_big_endian(&mut bytes);
    BigInt::from_bytes_be(Sign::Plus, &bytes)
}

pub fn u256_to_big_rational(input: &U256) -> BigRational {
    BigRational::new(u256_to_big_int(input), 1.into())
}

pub fn big_int_to_u256(input: &BigInt) -> Result<U256, ExchangeError> {
    let (sign, bytes) = input.to_bytes_be();
    if sign == Sign::Minus || bytes.len() > 32 {
        return Err(ExchangeError::TotalCostOverflowsUint256);
    }
    Ok(U256::from_big_endian(&bytes))
}

// Convenience:

pub trait U256Ext {
    fn to_big_int(&self) -> BigInt;
    fn to_big_rational(&self) -> BigRational;
}

impl U256Ext for U256 {
    fn to_big_int(&self) -> BigInt {
        u256_to_big_int(self)
    }
    fn to_big_rational(&self) -> BigRational {
        u256_to_big_rational(self)
    }
}
