//! Canonical byte encoding primitives shared by order records and transaction
//! envelopes. All integers are big-endian, all lists are length-prefixed, and
//! decoding consumes exactly the bytes encoding produced: the layout is
//! consensus-critical and must match across implementations.

use crate::{error::ExchangeError, CoinId, ProfileId};
use primitive_types::{H256, U256};

const COIN_TAG_NATIVE: u8 = 0x00;
const COIN_TAG_DAO: u8 = 0x01;

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_u256(buf: &mut Vec<u8>, value: &U256) {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    buf.extend_from_slice(&bytes);
}

pub fn put_h256(buf: &mut Vec<u8>, value: &H256) {
    buf.extend_from_slice(value.as_bytes());
}

pub fn put_profile(buf: &mut Vec<u8>, value: &ProfileId) {
    buf.extend_from_slice(value.as_bytes());
}

pub fn put_coin(buf: &mut Vec<u8>, value: &CoinId) {
    match value {
        CoinId::Native => buf.push(COIN_TAG_NATIVE),
        CoinId::Dao(profile) => {
            buf.push(COIN_TAG_DAO);
            buf.extend_from_slice(profile.as_bytes());
        }
    }
}

/// Sequential reader over an encoded record. Every accessor fails with
/// [`ExchangeError::InvalidTransactionEncoding`] instead of reading past the
/// end, and [`Reader::finish`] rejects trailing bytes.
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ExchangeError> {
        if self.bytes.len() < len {
            return Err(ExchangeError::InvalidTransactionEncoding);
        }
        let (head, tail) = self.bytes.split_at(len);
        self.bytes = tail;
        Ok(head)
    }

    pub fn u8(&mut self) -> Result<u8, ExchangeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> Result<u32, ExchangeError> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn u64(&mut self) -> Result<u64, ExchangeError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn u256(&mut self) -> Result<U256, ExchangeError> {
        Ok(U256::from_big_endian(self.take(32)?))
    }

    pub fn h256(&mut self) -> Result<H256, ExchangeError> {
        Ok(H256::from_slice(self.take(32)?))
    }

    pub fn profile(&mut self) -> Result<ProfileId, ExchangeError> {
        Ok(ProfileId::from_slice(self.take(20)?))
    }

    pub fn coin(&mut self) -> Result<CoinId, ExchangeError> {
        match self.u8()? {
            COIN_TAG_NATIVE => Ok(CoinId::Native),
            COIN_TAG_DAO => Ok(CoinId::Dao(self.profile()?)),
            _ => Err(ExchangeError::InvalidTransactionEncoding),
        }
    }

    /// List length prefix. Bounded so a corrupted prefix cannot drive an
    /// allocation of arbitrary size.
    pub fn list_len(&mut self) -> Result<usize, ExchangeError> {
        let len = self.u32()? as usize;
        if len > self.bytes.len() {
            return Err(ExchangeError::InvalidTransactionEncoding);
        }
        Ok(len)
    }

    pub fn finish(self) -> Result<(), ExchangeError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(ExchangeError::InvalidTransactionEncoding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H160;

    #[test]
    fn coin_round_trip() {
        for coin in [CoinId::Native, CoinId::Dao(H160::from_low_u64_be(7))] {
            let mut buf = Vec::new();
            put_coin(&mut buf, &coin);
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.coin().unwrap(), coin);
            reader.finish().unwrap();
        }
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut buf = Vec::new();
        put_u256(&mut buf, &U256::from(42));
        let mut reader = Reader::new(&buf[..31]);
        assert_eq!(
            reader.u256().unwrap_err(),
            ExchangeError::InvalidTransactionEncoding
        );
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let reader = Reader::new(&[0u8]);
        assert_eq!(
            reader.finish().unwrap_err(),
            ExchangeError::InvalidTransactionEncoding
        );
    }

    #[test]
    fn unknown_coin_tag_is_rejected() {
        let mut reader = Reader::new(&[0x02]);
        assert_eq!(
            reader.coin().unwrap_err(),
            ExchangeError::InvalidTransactionEncoding
        );
    }
}
