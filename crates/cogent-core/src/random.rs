//! Random draws shared by the cognitive processes.
//!
//! Every draw takes the caller's RNG so a run seeded once is reproducible
//! end to end. Shuffles and uniform tie-breaks use `rand`'s slice helpers
//! directly; this module holds the two draws with engine-specific shape.

use rand::Rng;

/// Resolution of the goal-ranking draw: each goal gets
/// `round(weight * WEIGHT_SLOTS)` slots.
pub const WEIGHT_SLOTS: f64 = 100.0;

/// Draw a value between `from` and `to` with a power-law bias toward
/// `from`.
///
/// The step fraction `t` in `[0, 1]` has density `(n + 1)(1 - t)^n` for
/// exponent `n`, so larger exponents keep the result closer to `from`. The
/// result is clamped into the closed interval spanned by the two ends, which
/// may be given in either order.
pub fn power_law_between(rng: &mut impl Rng, from: f64, to: f64, exponent: f64) -> f64 {
    let u: f64 = rng.random::<f64>();
    let fraction = 1.0 - u.powf(1.0 / (exponent + 1.0));
    let value = (to - from).mul_add(fraction, from);
    let (low, high) = if from <= to { (from, to) } else { (to, from) };
    value.clamp(low, high)
}

/// Weighted draw without replacement over a 100-slot vector.
///
/// Each item gets `round(weight * 100)` slots; a uniformly drawn slot picks
/// the next item, whose slots are then removed. Items with no slots are not
/// returned; the caller orders that remainder.
pub fn weighted_order<T: Clone>(rng: &mut impl Rng, items: &[(T, f64)]) -> Vec<T> {
    let mut slots: Vec<usize> = Vec::new();
    for (index, (_, weight)) in items.iter().enumerate() {
        let count = slot_count(*weight);
        slots.extend(std::iter::repeat_n(index, count));
    }

    let mut order = Vec::new();
    while !slots.is_empty() {
        let pick = rng.random_range(0..slots.len());
        let Some(&chosen) = slots.get(pick) else {
            break;
        };
        slots.retain(|&s| s != chosen);
        if let Some((item, _)) = items.get(chosen) {
            order.push(item.clone());
        }
    }
    order
}

fn slot_count(weight: f64) -> usize {
    if !weight.is_finite() || weight <= 0.0 {
        return 0;
    }
    let scaled = (weight * WEIGHT_SLOTS).round().min(WEIGHT_SLOTS);
    // Within 0..=100 after the clamp above.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let count = scaled as usize;
    count
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn power_law_stays_within_bounds() {
        for seed in 0..1000 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let up = power_law_between(&mut rng, 2.0, 10.0, 2.0);
            assert!((2.0..=10.0).contains(&up));
            let down = power_law_between(&mut rng, 2.0, -4.0, 0.5);
            assert!((-4.0..=2.0).contains(&down));
        }
    }

    #[test]
    fn power_law_favors_the_source_end() {
        let mut rng = SmallRng::seed_from_u64(11);
        let n = 2000;
        let near = (0..n)
            .map(|_| power_law_between(&mut rng, 0.0, 1.0, 3.0))
            .filter(|v| *v < 0.5)
            .count();
        // P(t < 0.5) = 1 - 0.5^4 for exponent 3.
        assert!(near > n * 8 / 10);
    }

    #[test]
    fn power_law_with_equal_ends_returns_that_value() {
        let mut rng = SmallRng::seed_from_u64(5);
        assert_eq!(power_law_between(&mut rng, 3.0, 3.0, 2.0), 3.0);
    }

    #[test]
    fn weighted_order_skips_zero_weights() {
        let mut rng = SmallRng::seed_from_u64(42);
        let order = weighted_order(&mut rng, &[("a", 0.5), ("b", 0.0), ("c", 0.5)]);
        assert_eq!(order.len(), 2);
        assert!(order.contains(&"a"));
        assert!(order.contains(&"c"));
    }

    #[test]
    fn weighted_order_is_reproducible_and_biased() {
        let items = [("heavy", 0.9), ("light", 0.1)];
        let first = weighted_order(&mut SmallRng::seed_from_u64(9), &items);
        let again = weighted_order(&mut SmallRng::seed_from_u64(9), &items);
        assert_eq!(first, again);

        let heavy_first = (0..500)
            .filter(|&seed| {
                weighted_order(&mut SmallRng::seed_from_u64(seed), &items).first() == Some(&"heavy")
            })
            .count();
        assert!(heavy_first > 400);
    }
}
