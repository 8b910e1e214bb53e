//! Shared harness for the end-to-end suites: an engine wired to the
//! in-memory chain doubles, plus short constructors for identities and
//! coins.

use engine::{Engine, EngineParams};
use model::{CoinId, ProfileId};
use testlib::{MemoryLedger, MemoryStore, MemoryUtxoSet, TestChain};

pub type TestEngine = Engine<MemoryStore, MemoryLedger, MemoryUtxoSet>;

pub fn engine(chain: &TestChain, fee_rate_nanos_per_kb: u64) -> TestEngine {
    Engine::new(
        MemoryStore::default(),
        chain.ledger(),
        chain.utxos(),
        EngineParams {
            fee_rate_nanos_per_kb,
        },
    )
}

pub fn profile(n: u64) -> ProfileId {
    ProfileId::from_low_u64_be(n)
}

pub fn dao(n: u64) -> CoinId {
    CoinId::Dao(profile(n))
}
