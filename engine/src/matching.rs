//! A single step of the price-time-priority matching loop: given the best
//! remaining counter-order and the incoming order's residual demand, compute
//! the two transfer amounts. Both legs price through the maker's rate, with
//! truncation toward zero, so a resting order never realises a worse price
//! than it posted.

use model::{error::ExchangeError, order::OrderEntry};
use primitive_types::U256;

/// The incoming order's residual, denominated in the maker's units: a
/// buy-denominated taker caps what the maker delivers, a sell-denominated
/// taker caps what the maker receives.
#[derive(Copy, Clone, Debug)]
pub enum TakerDemand {
    /// Remaining base units the taker wants to acquire (the maker's sell
    /// coin).
    Buy(U256),
    /// Remaining base units the taker wants to dispose of (the maker's buy
    /// coin).
    Sell(U256),
}

#[derive(Debug, PartialEq, Eq)]
pub enum MatchStep {
    /// The maker's remainder no longer moves a whole base unit on one of its
    /// legs; the order is stale and gets cancelled in place.
    MakerDust,
    /// The taker's remainder no longer moves a whole base unit at this (or
    /// any worse) price; the loop ends and the residual follows the fill
    /// type.
    TakerDust,
    Fill {
        /// Sell-coin base units the maker delivers to the taker.
        maker_delivers: U256,
        /// Buy-coin base units the maker receives from the taker.
        maker_receives: U256,
        /// Whether the maker's remainder is fully consumed.
        maker_closed: bool,
    },
}

pub fn match_step(maker: &OrderEntry, demand: TakerDemand) -> Result<MatchStep, ExchangeError> {
    let maker_receives_max = maker.remaining_to_buy()?;
    let maker_delivers_max = maker.remaining_to_sell()?;
    if maker_receives_max.is_zero() || maker_delivers_max.is_zero() {
        return Ok(MatchStep::MakerDust);
    }

    let step = match demand {
        TakerDemand::Buy(cap) => {
            if maker_delivers_max <= cap {
                MatchStep::Fill {
                    maker_delivers: maker_delivers_max,
                    maker_receives: maker_receives_max,
                    maker_closed: true,
                }
            } else {
                let maker_receives = maker.scaled_rate.buy_units(cap)?;
                let maker_delivers = maker.scaled_rate.sell_units(maker_receives)?;
                if maker_receives.is_zero() || maker_delivers.is_zero() {
                    return Ok(MatchStep::TakerDust);
                }
                MatchStep::Fill {
                    maker_delivers,
                    maker_receives,
                    maker_closed: false,
                }
            }
        }
        TakerDemand::Sell(cap) => {
            if maker_receives_max <= cap {
                MatchStep::Fill {
                    maker_delivers: maker_delivers_max,
                    maker_receives: maker_receives_max,
                    maker_closed: true,
                }
            } else {
                let maker_delivers = maker.scaled_rate.sell_units(cap)?;
                if maker_delivers.is_zero() {
                    return Ok(MatchStep::TakerDust);
                }
                MatchStep::Fill {
                    maker_delivers,
                    maker_receives: cap,
                    maker_closed: false,
                }
            }
        }
    };
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::order::{OrderBuilder, Side};
    use model::CoinId;
    use primitive_types::H160;

    fn bid(rate: &str, quantity: u64) -> OrderEntry {
        OrderBuilder::default()
            .with_buy_coin(CoinId::Native)
            .with_sell_coin(CoinId::Dao(H160::from_low_u64_be(1)))
            .with_rate(rate.parse().unwrap())
            .with_quantity(quantity.into())
            .build()
    }

    #[test]
    fn maker_bound_fill_consumes_the_maker_exactly() {
        // Maker bids for 5 native at 12 coins each: delivers 60, receives 5.
        let maker = bid("12", 5);
        assert_eq!(
            match_step(&maker, TakerDemand::Buy(240.into())).unwrap(),
            MatchStep::Fill {
                maker_delivers: 60.into(),
                maker_receives: 5.into(),
                maker_closed: true,
            }
        );
    }

    #[test]
    fn taker_bound_fill_floors_through_the_maker_rate() {
        // Maker bids for 20 native at 11 each; the taker only wants 120 more
        // coins. 120/11 floors to 10 native, priced back to 110 coins: the
        // maker's realised rate stays exactly 11.
        let maker = bid("11", 20);
        assert_eq!(
            match_step(&maker, TakerDemand::Buy(120.into())).unwrap(),
            MatchStep::Fill {
                maker_delivers: 110.into(),
                maker_receives: 10.into(),
                maker_closed: false,
            }
        );
    }

    #[test]
    fn sell_demand_caps_what_the_maker_receives() {
        let maker = bid("12", 5);
        assert_eq!(
            match_step(&maker, TakerDemand::Sell(2.into())).unwrap(),
            MatchStep::Fill {
                maker_delivers: 24.into(),
                maker_receives: 2.into(),
                maker_closed: false,
            }
        );
        assert_eq!(
            match_step(&maker, TakerDemand::Sell(5.into())).unwrap(),
            MatchStep::Fill {
                maker_delivers: 60.into(),
                maker_receives: 5.into(),
                maker_closed: true,
            }
        );
    }

    #[test]
    fn ask_makers_denominate_in_their_sell_coin() {
        // Ask disposing of 60 coins at 12 per native: receives up to 5.
        let mut maker = bid("12", 60);
        maker.side = Side::Ask;
        assert_eq!(
            match_step(&maker, TakerDemand::Buy(200.into())).unwrap(),
            MatchStep::Fill {
                maker_delivers: 60.into(),
                maker_receives: 5.into(),
                maker_closed: true,
            }
        );
    }

    #[test]
    fn dust_remainders_are_detected() {
        // A taker asking for less than one native's worth of coins cannot
        // move a unit at rate 11.
        let maker = bid("11", 20);
        assert_eq!(
            match_step(&maker, TakerDemand::Buy(10.into())).unwrap(),
            MatchStep::TakerDust
        );

        // A maker bidding so little that its remainder sells zero coins is
        // stale.
        let maker = bid("0.1", 5);
        assert_eq!(
            match_step(&maker, TakerDemand::Buy(100.into())).unwrap(),
            MatchStep::MakerDust
        );
    }
}
