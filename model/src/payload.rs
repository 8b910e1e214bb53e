//! The signed transaction envelope submitted to the exchange: an open or
//! cancel payload plus the native-coin inputs funding it.

use crate::{
    encoding::{self, Reader},
    error::ExchangeError,
    order::{FillType, OrderId, Side},
    rate::ScaledRate,
    CoinId, ProfileId,
};
use primitive_types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const PAYLOAD_TAG_SUBMIT: u8 = 1;
const PAYLOAD_TAG_CANCEL: u8 = 2;

/// Reference to an unspent native-coin output.
#[derive(
    Copy, Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UtxoRef {
    #[serde(with = "crate::hexadecimal")]
    pub txid: H256,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(txid: H256, index: u32) -> Self {
        Self { txid, index }
    }
}

/// Native-coin inputs owned by a counterparty the submitter expects to match:
/// the submitter cannot sign the maker's coins directly, so the maker's
/// spendable outputs ride along in the envelope and any unused value is
/// refunded at settlement.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidderInputs {
    pub bidder: ProfileId,
    pub inputs: Vec<UtxoRef>,
}

/// Payload opening a new order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub buy_coin: CoinId,
    pub sell_coin: CoinId,
    pub scaled_rate: ScaledRate,
    pub quantity: U256,
    pub side: Side,
    pub fill_type: FillType,
}

/// Payload cancelling a resting order owned by the submitter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPayload {
    Submit(SubmitOrder),
    Cancel(CancelOrder),
}

/// A complete order transaction as signed by the transactor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub transactor: ProfileId,
    pub inputs: Vec<UtxoRef>,
    pub bidder_inputs: Vec<BidderInputs>,
    pub payload: OrderPayload,
    pub fee_nanos: u64,
}

impl Envelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        encoding::put_profile(&mut buf, &self.transactor);
        match &self.payload {
            OrderPayload::Submit(submit) => {
                encoding::put_u8(&mut buf, PAYLOAD_TAG_SUBMIT);
                encoding::put_coin(&mut buf, &submit.buy_coin);
                encoding::put_coin(&mut buf, &submit.sell_coin);
                encoding::put_u256(&mut buf, &submit.scaled_rate.as_scaled());
                encoding::put_u256(&mut buf, &submit.quantity);
                encoding::put_u8(&mut buf, submit.side.to_wire());
                encoding::put_u8(&mut buf, submit.fill_type.to_wire());
            }
            OrderPayload::Cancel(cancel) => {
                encoding::put_u8(&mut buf, PAYLOAD_TAG_CANCEL);
                encoding::put_h256(&mut buf, &cancel.order_id.0);
            }
        }
        encoding::put_u64(&mut buf, self.fee_nanos);
        encoding::put_u32(&mut buf, self.inputs.len() as u32);
        for input in &self.inputs {
            put_utxo_ref(&mut buf, input);
        }
        encoding::put_u32(&mut buf, self.bidder_inputs.len() as u32);
        for bidder in &self.bidder_inputs {
            encoding::put_profile(&mut buf, &bidder.bidder);
            encoding::put_u32(&mut buf, bidder.inputs.len() as u32);
            for input in &bidder.inputs {
                put_utxo_ref(&mut buf, input);
            }
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ExchangeError> {
        let mut reader = Reader::new(bytes);
        let transactor = reader.profile()?;
        let payload = match reader.u8()? {
            PAYLOAD_TAG_SUBMIT => OrderPayload::Submit(SubmitOrder {
                buy_coin: reader.coin()?,
                sell_coin: reader.coin()?,
                scaled_rate: ScaledRate::from_scaled(reader.u256()?),
                quantity: reader.u256()?,
                side: Side::from_wire(reader.u8()?)?,
                fill_type: FillType::from_wire(reader.u8()?)?,
            }),
            PAYLOAD_TAG_CANCEL => OrderPayload::Cancel(CancelOrder {
                order_id: OrderId(reader.h256()?),
            }),
            _ => return Err(ExchangeError::InvalidOperationType),
        };
        let fee_nanos = reader.u64()?;
        let mut inputs = Vec::new();
        for _ in 0..reader.list_len()? {
            inputs.push(read_utxo_ref(&mut reader)?);
        }
        let mut bidder_inputs = Vec::new();
        for _ in 0..reader.list_len()? {
            let bidder = reader.profile()?;
            let mut refs = Vec::new();
            for _ in 0..reader.list_len()? {
                refs.push(read_utxo_ref(&mut reader)?);
            }
            bidder_inputs.push(BidderInputs {
                bidder,
                inputs: refs,
            });
        }
        reader.finish()?;
        Ok(Self {
            transactor,
            inputs,
            bidder_inputs,
            payload,
            fee_nanos,
        })
    }

    /// Number of bytes the envelope serializes to; the basis of the minimum
    /// fee.
    pub fn serialized_size(&self) -> usize {
        self.encode().len()
    }

    /// Digest identifying this transaction. Orders opened by the transaction
    /// take it as their order id.
    pub fn txid(&self) -> H256 {
        let digest = Sha256::digest(self.encode());
        H256::from_slice(&digest)
    }
}

fn put_utxo_ref(buf: &mut Vec<u8>, utxo: &UtxoRef) {
    encoding::put_h256(buf, &utxo.txid);
    encoding::put_u32(buf, utxo.index);
}

fn read_utxo_ref(reader: &mut Reader) -> Result<UtxoRef, ExchangeError> {
    Ok(UtxoRef {
        txid: reader.h256()?,
        index: reader.u32()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H160;

    fn submit_envelope() -> Envelope {
        Envelope {
            transactor: H160::from_low_u64_be(1),
            inputs: vec![UtxoRef::new(H256::repeat_byte(1), 0)],
            bidder_inputs: vec![BidderInputs {
                bidder: H160::from_low_u64_be(2),
                inputs: vec![
                    UtxoRef::new(H256::repeat_byte(2), 1),
                    UtxoRef::new(H256::repeat_byte(2), 2),
                ],
            }],
            payload: OrderPayload::Submit(SubmitOrder {
                buy_coin: CoinId::Native,
                sell_coin: CoinId::Dao(H160::from_low_u64_be(3)),
                scaled_rate: "10".parse().unwrap(),
                quantity: 10.into(),
                side: Side::Bid,
                fill_type: FillType::GoodTillCancelled,
            }),
            fee_nanos: 120,
        }
    }

    #[test]
    fn round_trips_submit_and_cancel() {
        let submit = submit_envelope();
        assert_eq!(Envelope::decode(&submit.encode()).unwrap(), submit);

        let cancel = Envelope {
            transactor: H160::from_low_u64_be(1),
            inputs: vec![],
            bidder_inputs: vec![],
            payload: OrderPayload::Cancel(CancelOrder {
                order_id: OrderId(H256::repeat_byte(9)),
            }),
            fee_nanos: 40,
        };
        assert_eq!(Envelope::decode(&cancel.encode()).unwrap(), cancel);
    }

    #[test]
    fn rejects_unknown_payload_side_and_fill_bytes() {
        let envelope = submit_envelope();
        let bytes = envelope.encode();

        // Payload tag is right after the 20 byte transactor.
        let mut bad_op = bytes.clone();
        bad_op[20] = 9;
        assert_eq!(
            Envelope::decode(&bad_op).unwrap_err(),
            ExchangeError::InvalidOperationType
        );

        // Side and fill type trail the two 32 byte amounts and two coin ids.
        let side_offset = 20 + 1 + 1 + 21 + 32 + 32;
        let mut bad_side = bytes.clone();
        bad_side[side_offset] = 0;
        assert_eq!(
            Envelope::decode(&bad_side).unwrap_err(),
            ExchangeError::InvalidOperationType
        );
        let mut bad_fill = bytes.clone();
        bad_fill[side_offset + 1] = 4;
        assert_eq!(
            Envelope::decode(&bad_fill).unwrap_err(),
            ExchangeError::InvalidFillType
        );
    }

    #[test]
    fn rejects_truncated_envelopes() {
        let bytes = submit_envelope().encode();
        for len in [0, 10, bytes.len() - 1] {
            assert_eq!(
                Envelope::decode(&bytes[..len]).unwrap_err(),
                ExchangeError::InvalidTransactionEncoding
            );
        }
    }

    #[test]
    fn txid_is_stable_and_payload_sensitive() {
        let envelope = submit_envelope();
        assert_eq!(envelope.txid(), envelope.txid());

        let mut other = envelope.clone();
        other.fee_nanos += 1;
        assert_ne!(envelope.txid(), other.txid());
    }
}
