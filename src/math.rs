//! Constant-product pool math shared by the quote and execution paths.
//!
//! Every function here is pure integer arithmetic. The on-chain pool program
//! works in truncating fixed-point, so the client-side quote has to reproduce
//! the exact same integers or the minimum-output guard would reject (or worse,
//! under-protect) the transaction it was computed for. No floating point.

/// Swap fee taken from the input amount: 3/1000 = 0.3%.
pub const FEE_NUMERATOR: u128 = 3;
/// Denominator of the swap fee rate.
pub const FEE_DENOMINATOR: u128 = 1000;

/// Denominator for slippage tolerance. The pool program checks minimum output
/// against five-digit basis points, not the usual 10_000.
pub const SLIPPAGE_DENOMINATOR: u128 = 100_000;

/// Denominator for price-impact reporting (regular basis points).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Expected output of a constant-product (x·y=k) swap with the fee deducted
/// from the input before the curve is applied.
///
/// Total over its whole domain: degenerate inputs (empty reserve, zero input)
/// quote as 0, and the caller treats 0 as "no viable route". Intermediate
/// products are computed in u128 since `reserve_in * reserve_out` overflows
/// u64 for realistic vault balances.
pub fn constant_product_quote(amount_in: u64, reserve_in: u64, reserve_out: u64) -> u64 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }

    let amount_in = amount_in as u128;
    let reserve_in = reserve_in as u128;
    let reserve_out = reserve_out as u128;

    let amount_in_after_fee = amount_in * (FEE_DENOMINATOR - FEE_NUMERATOR) / FEE_DENOMINATOR;

    let k = reserve_in * reserve_out;
    let new_reserve_in = reserve_in + amount_in_after_fee;
    if new_reserve_in == 0 {
        return 0;
    }
    let new_reserve_out = k / new_reserve_in;

    // Truncation above can only make new_reserve_out smaller, in favor of the
    // pool. Clamp anyway so the function stays total.
    let amount_out = reserve_out.saturating_sub(new_reserve_out);
    amount_out.min(u64::MAX as u128) as u64
}

/// Minimum acceptable output after applying a slippage tolerance in basis
/// points. Divides by 100_000 to match the on-chain check exactly.
pub fn min_amount_out(amount_out: u64, slippage_bps: u64) -> u64 {
    let slippage = (slippage_bps as u128).min(SLIPPAGE_DENOMINATOR);
    let min_out = (amount_out as u128) * (SLIPPAGE_DENOMINATOR - slippage) / SLIPPAGE_DENOMINATOR;
    min_out as u64
}

/// Share of the output reserve consumed by a trade, in basis points. Purely
/// informational, shown next to quotes in the UI.
pub fn price_impact_bps(amount_out: u64, reserve_out: u64) -> u64 {
    if reserve_out == 0 {
        return 0;
    }
    ((amount_out as u128) * BPS_DENOMINATOR / (reserve_out as u128)) as u64
}

/// Second leg of a proportional liquidity deposit: the token-B amount that
/// keeps the pool ratio when `amount_a` of token A is deposited.
pub fn proportional_deposit(amount_a: u64, reserve_a: u64, reserve_b: u64) -> u64 {
    if reserve_a == 0 {
        return 0;
    }
    let amount_b = (amount_a as u128) * (reserve_b as u128) / (reserve_a as u128);
    amount_b.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn quote_reference_scenario() {
        // reserves 1e9 / 2e9, input 1e7, fee 3/1000:
        //   after fee  = 9_970_000
        //   k          = 2×10^18
        //   new in     = 1_009_970_000
        //   new out    = floor(2×10^18 / 1_009_970_000) = 1_980_256_839
        let out = constant_product_quote(10_000_000, 1_000_000_000, 2_000_000_000);
        assert_eq!(out, 2_000_000_000 - 1_980_256_839);
        assert_eq!(out, 19_743_161);
    }

    #[test]
    fn quote_small_pool() {
        assert_eq!(constant_product_quote(1_000, 5_000, 5_000), 832);
    }

    #[test]
    fn degenerate_inputs_quote_zero() {
        assert_eq!(constant_product_quote(0, 1_000, 1_000), 0);
        assert_eq!(constant_product_quote(1_000, 0, 1_000), 0);
        assert_eq!(constant_product_quote(1_000, 1_000, 0), 0);
    }

    #[test]
    fn quote_survives_max_reserves() {
        // reserve product saturates u128 territory well past u64
        let out = constant_product_quote(u64::MAX, u64::MAX, u64::MAX);
        assert!(out < u64::MAX);
    }

    #[test]
    fn fee_is_actually_applied() {
        let (amount_in, reserve_in, reserve_out) = (10_000_000u64, 1_000_000_000u64, 2_000_000_000u64);
        let with_fee = constant_product_quote(amount_in, reserve_in, reserve_out);
        let k = reserve_in as u128 * reserve_out as u128;
        let fee_free = reserve_out as u128 - k / (reserve_in as u128 + amount_in as u128);
        assert!((with_fee as u128) < fee_free);
        assert_eq!(fee_free, 19_801_981);
    }

    #[test]
    fn min_out_reference_scenario() {
        assert_eq!(min_amount_out(1_000_000, 100), 999_000);
    }

    #[test]
    fn min_out_edges() {
        assert_eq!(min_amount_out(0, 100), 0);
        assert_eq!(min_amount_out(1_000_000, 0), 1_000_000);
        // tolerance beyond 100% clamps to zero output instead of underflowing
        assert_eq!(min_amount_out(1_000_000, 200_000), 0);
    }

    #[test]
    fn price_impact_reference() {
        assert_eq!(price_impact_bps(19_743_161, 2_000_000_000), 98);
        assert_eq!(price_impact_bps(1, 0), 0);
    }

    #[test]
    fn proportional_deposit_keeps_ratio() {
        assert_eq!(proportional_deposit(500_000, 1_000_000_000, 2_000_000_000), 1_000_000);
        assert_eq!(proportional_deposit(1, 0, 5), 0);
    }

    proptest! {
        #[test]
        fn output_never_drains_pool(
            seed in 1u64..=u64::MAX,
            reserve_in in 1u64..=u64::MAX,
            reserve_out in 2u64..=u64::MAX,
        ) {
            // trades bounded by the input reserve; beyond that new_reserve_out
            // truncates to 0 and the formula hands over the whole reserve
            let amount_in = seed % reserve_in + 1;
            let out = constant_product_quote(amount_in, reserve_in, reserve_out);
            prop_assert!(out < reserve_out);
        }

        #[test]
        fn output_monotone_in_input(
            amount_in in 0u64..u64::MAX,
            step in 1u64..1_000_000u64,
            reserve_in in 1u64..=u64::MAX,
            reserve_out in 1u64..=u64::MAX,
        ) {
            let bigger = amount_in.saturating_add(step);
            let a = constant_product_quote(amount_in, reserve_in, reserve_out);
            let b = constant_product_quote(bigger, reserve_in, reserve_out);
            prop_assert!(b >= a);
        }

        #[test]
        fn min_out_never_exceeds_quote(
            amount_out in 0u64..=u64::MAX,
            slippage_bps in 0u64..=100_000u64,
        ) {
            prop_assert!(min_amount_out(amount_out, slippage_bps) <= amount_out);
        }
    }
}
