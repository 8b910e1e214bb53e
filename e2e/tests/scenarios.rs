//! End-to-end exchange scenarios: literal multi-party flows through order
//! submission, matching, settlement and cancellation.

use e2e::{dao, engine, profile};
use engine::Store;
use model::{
    error::ExchangeError,
    order::{FillType, Side},
    CoinId,
};
use primitive_types::U256;
use testlib::TestChain;

fn fill_amounts(connected: &engine::ConnectedTransaction) -> Vec<(u64, u64)> {
    connected
        .fills
        .iter()
        .map(|fill| (fill.taker_bought.as_u64(), fill.taker_sold.as_u64()))
        .collect()
}

#[test]
fn simple_match_clears_both_orders() {
    let chain = TestChain::default();
    let maker = profile(1);
    let taker = profile(2);
    chain.register_profile(profile(10));
    let m0 = dao(10);
    chain.set_dao_balance(taker, m0, 100.into());
    let maker_funding = chain.fund_native(maker, 10);

    let mut exchange = engine(&chain, 0);

    // The maker bids for 100 M0 at 0.1 native each, bringing the 10 native
    // the order can consume.
    let mut open = testlib::submit(
        maker,
        m0,
        CoinId::Native,
        "0.1",
        100,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    open.inputs.push(maker_funding);
    exchange.connect_transaction(&open, 1).unwrap();
    // The maker's native cycled into the change output of their submission.
    assert_eq!(chain.native_balance(maker), 10);

    let hit = testlib::with_bidder_inputs(
        testlib::submit(
            taker,
            CoinId::Native,
            m0,
            "10",
            10,
            Side::Bid,
            FillType::GoodTillCancelled,
        ),
        maker,
        chain.utxo_refs_for(maker),
    );
    let connected = exchange.connect_transaction(&hit, 2).unwrap();

    assert_eq!(fill_amounts(&connected), vec![(10, 100)]);
    assert_eq!(chain.dao_balance(maker, m0), U256::from(100));
    assert_eq!(chain.dao_balance(taker, m0), U256::zero());
    assert_eq!(chain.native_balance(maker), 0);
    assert_eq!(chain.native_balance(taker), 10);
    assert!(exchange.orders_all().unwrap().is_empty());
}

#[test]
fn price_ladder_partial_fill() {
    let chain = TestChain::default();
    chain.register_profile(profile(10));
    let m0 = dao(10);
    let (rung_11, rung_12_first, rung_12_second) = (profile(1), profile(2), profile(3));
    let taker = profile(4);
    chain.set_dao_balance(rung_11, m0, 220.into());
    chain.set_dao_balance(rung_12_first, m0, 60.into());
    chain.set_dao_balance(rung_12_second, m0, 60.into());
    let funding = chain.fund_native(taker, 30);

    let mut exchange = engine(&chain, 0);
    for (maker, rate, quantity, height) in [
        (rung_12_first, "12", 5, 1),
        (rung_12_second, "12", 5, 2),
        (rung_11, "11", 20, 3),
    ] {
        let open = testlib::submit(
            maker,
            CoinId::Native,
            m0,
            rate,
            quantity,
            Side::Bid,
            FillType::GoodTillCancelled,
        );
        exchange.connect_transaction(&open, height).unwrap();
    }

    // 240 M0 wanted at up to 0.125 native each: both rate-12 rungs clear in
    // full, then the rate-11 rung fills 10 of its 20 native.
    let mut hit = testlib::submit(
        taker,
        m0,
        CoinId::Native,
        "0.125",
        240,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    hit.inputs.push(funding);
    let connected = exchange.connect_transaction(&hit, 4).unwrap();

    assert_eq!(
        fill_amounts(&connected),
        vec![(60, 5), (60, 5), (110, 10)]
    );
    assert_eq!(chain.dao_balance(taker, m0), U256::from(230));
    assert_eq!(chain.native_balance(rung_12_first), 5);
    assert_eq!(chain.native_balance(rung_12_second), 5);
    assert_eq!(chain.native_balance(rung_11), 10);
    assert_eq!(chain.native_balance(taker), 10);

    // Residual 10 native remains on the rate-11 bid; the taker's own 10-coin
    // remainder rests.
    let rung_orders = exchange.orders_by_transactor(rung_11).unwrap();
    assert_eq!(rung_orders.len(), 1);
    assert_eq!(rung_orders[0].quantity_remaining, U256::from(10));
    let taker_orders = exchange.orders_by_transactor(taker).unwrap();
    assert_eq!(taker_orders.len(), 1);
    assert_eq!(taker_orders[0].quantity_remaining, U256::from(10));
    assert_eq!(taker_orders[0].buy_coin, m0);
}

#[test]
fn undeliverable_maker_is_cancelled_mid_loop() {
    let chain = TestChain::default();
    chain.register_profile(profile(10));
    let m0 = dao(10);
    let (diluted, solvent, taker) = (profile(1), profile(2), profile(3));
    chain.set_dao_balance(diluted, m0, 60.into());
    chain.set_dao_balance(solvent, m0, 55.into());
    let funding = chain.fund_native(taker, 30);

    let mut exchange = engine(&chain, 0);
    let open_diluted = testlib::submit(
        diluted,
        CoinId::Native,
        m0,
        "12",
        5,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    exchange.connect_transaction(&open_diluted, 1).unwrap();
    let open_solvent = testlib::submit(
        solvent,
        CoinId::Native,
        m0,
        "11",
        5,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    exchange.connect_transaction(&open_solvent, 2).unwrap();

    // The best-priced maker transfers away the coins backing their bid.
    chain.set_dao_balance(diluted, m0, 10.into());

    let mut hit = testlib::submit(
        taker,
        m0,
        CoinId::Native,
        "0.125",
        120,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    hit.inputs.push(funding);
    let connected = exchange.connect_transaction(&hit, 3).unwrap();

    // No error: the stale order is removed in place and the solvent maker
    // fills.
    assert_eq!(fill_amounts(&connected), vec![(55, 5)]);
    assert!(exchange.orders_by_transactor(diluted).unwrap().is_empty());
    assert_eq!(chain.dao_balance(diluted, m0), U256::from(10));
    assert_eq!(chain.native_balance(solvent), 5);

    // The taker's 65-coin remainder rests.
    let rest = exchange.orders_by_transactor(taker).unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].quantity_remaining, U256::from(65));
}

#[test]
fn fill_or_kill_market_order_with_thin_book_aborts_whole() {
    let chain = TestChain::default();
    chain.register_profile(profile(11));
    let m1 = dao(11);
    let (maker, taker) = (profile(1), profile(2));
    chain.set_dao_balance(maker, m1, 100.into());

    let mut exchange = engine(&chain, 0);
    let open = testlib::submit(
        maker,
        CoinId::Native,
        m1,
        "10",
        10,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    exchange.connect_transaction(&open, 1).unwrap();

    let chain_before = chain.snapshot();
    let book_before = exchange.book().store().scan_prefix(&[]);

    // A market order for double the available liquidity.
    let hit = testlib::submit(
        taker,
        m1,
        CoinId::Native,
        "",
        200,
        Side::Bid,
        FillType::FillOrKill,
    );
    assert_eq!(
        exchange.connect_transaction(&hit, 2).unwrap_err(),
        ExchangeError::FillOrKillOrderUnfulfilled
    );

    // Nothing changed and no fee was charged.
    assert_eq!(chain.snapshot(), chain_before);
    assert_eq!(exchange.book().store().scan_prefix(&[]), book_before);
}

#[test]
fn identity_swap_creates_retroactive_self_match() {
    let chain = TestChain::default();
    let (first, second) = (profile(1), profile(2));
    chain.register_profile(first);
    chain.set_dao_balance(first, dao(1), 100.into());

    let mut exchange = engine(&chain, 0);
    // An ask disposing of 100 of the submitter's own coin at parity.
    let open = testlib::submit(
        first,
        CoinId::Native,
        dao(1),
        "1",
        100,
        Side::Ask,
        FillType::GoodTillCancelled,
    );
    exchange.connect_transaction(&open, 1).unwrap();
    let inherited = exchange.orders_by_transactor(first).unwrap()[0].clone();

    // Governance transposes the two identities; the ledger rekeys its half,
    // the engine reinterprets the book in place.
    chain.swap_identities(first, second);
    exchange.connect_identity_swap(first, second);

    // The order now answers to the second identity, denominated in the
    // renamed coin.
    assert!(exchange.orders_by_transactor(first).unwrap().is_empty());
    let seen = exchange.orders_by_transactor(second).unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].order_id, inherited.order_id);
    assert_eq!(seen[0].transactor, second);
    assert_eq!(seen[0].sell_coin, dao(2));

    // Hitting the inherited order is now a self-match.
    let mut hit = testlib::submit(
        second,
        dao(2),
        CoinId::Native,
        "1",
        10,
        Side::Bid,
        FillType::ImmediateOrCancel,
    );
    hit.inputs.push(chain.fund_native(second, 10));
    assert_eq!(
        exchange.connect_transaction(&hit, 3).unwrap_err(),
        ExchangeError::MatchingOwnOrder
    );

    // Cancellation rights moved with the identity.
    assert_eq!(
        exchange
            .connect_transaction(&testlib::cancel(first, inherited.order_id), 4)
            .unwrap_err(),
        ExchangeError::ToCancelNotYours
    );
    exchange
        .connect_transaction(&testlib::cancel(second, inherited.order_id), 5)
        .unwrap();
    assert!(exchange.orders_all().unwrap().is_empty());
}

#[test]
fn excess_bidder_input_value_is_refunded() {
    let chain = TestChain::default();
    chain.register_profile(profile(10));
    let m0 = dao(10);
    let (maker, taker) = (profile(1), profile(2));
    chain.set_dao_balance(taker, m0, 20.into());
    let maker_funding = chain.fund_native(maker, 10);

    let mut exchange = engine(&chain, 0);
    let mut open = testlib::submit(
        maker,
        m0,
        CoinId::Native,
        "0.1",
        100,
        Side::Bid,
        FillType::GoodTillCancelled,
    );
    open.inputs.push(maker_funding);
    exchange.connect_transaction(&open, 1).unwrap();

    let supply_before = chain.native_supply();

    // The taker only needs 2 native but references a 10 native input of the
    // maker's: the 8 surplus comes back to the maker as a refund output.
    let hit = testlib::with_bidder_inputs(
        testlib::submit(
            taker,
            CoinId::Native,
            m0,
            "10",
            2,
            Side::Bid,
            FillType::ImmediateOrCancel,
        ),
        maker,
        chain.utxo_refs_for(maker),
    );
    let connected = exchange.connect_transaction(&hit, 2).unwrap();

    assert_eq!(fill_amounts(&connected), vec![(2, 20)]);
    let output_values: Vec<(model::ProfileId, u64)> = connected
        .outputs
        .iter()
        .map(|entry| (entry.owner, entry.value_nanos))
        .collect();
    assert_eq!(output_values, vec![(maker, 8), (taker, 2)]);

    assert_eq!(chain.native_balance(maker), 8);
    assert_eq!(chain.native_balance(taker), 2);
    assert_eq!(chain.dao_balance(maker, m0), U256::from(20));
    // Total input equals total output plus the (zero) fee.
    assert_eq!(chain.native_supply(), supply_before);

    // The maker's bid keeps its 80-coin remainder.
    let rest = exchange.orders_by_transactor(maker).unwrap();
    assert_eq!(rest[0].quantity_remaining, U256::from(80));
}
