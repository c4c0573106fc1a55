//! Xorshift32 pseudo-random sequence used for per-point noise.

/// Multiplier mixed with the request id when deriving a seed.
pub const SEED_MULTIPLIER: u32 = 2_654_435_761;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// Derive a seed from a request id and a wall-clock reading:
/// `(request_id * 2654435761 + now_ms) mod 2^32`.
///
/// The wall-clock component means two runs of the same request id differ
/// unless the clock is frozen.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn seed_for(request_id: u64, now_ms: u64) -> u32 {
    request_id
        .wrapping_mul(SEED_MULTIPLIER as u64)
        .wrapping_add(now_ms) as u32
}

/// 32-bit xorshift generator (shifts 13, 17, 5).
///
/// Not cryptographically secure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// Create a generator. A zero seed is replaced with 1, since zero is a
    /// fixed point of xorshift.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Create a generator seeded with [`seed_for`].
    #[must_use]
    pub const fn seeded(request_id: u64, now_ms: u64) -> Self {
        Self::new(seed_for(request_id, now_ms))
    }

    /// Next raw 32-bit state.
    pub fn next_u32(&mut self) -> u32 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 17;
        s ^= s << 5;
        self.state = s;
        s
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }

    /// Uniform draw in `[-0.5, 0.5)`.
    pub fn centered(&mut self) -> f64 {
        self.next_f64() - 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_output_from_seed_one() {
        let mut rng = Xorshift32::new(1);
        assert_eq!(rng.next_u32(), 270_369);
    }

    #[test]
    fn zero_seed_is_forced_non_zero() {
        assert_eq!(Xorshift32::new(0), Xorshift32::new(1));
        assert_eq!(seed_for(0, 0), 0);
        assert_eq!(Xorshift32::seeded(0, 0), Xorshift32::new(1));
    }

    #[test]
    fn seed_wraps_modulo_two_pow_32() {
        assert_eq!(seed_for(1, 0), 2_654_435_761);
        assert_eq!(seed_for(2, 0), 1_013_904_226);
        assert_eq!(seed_for(1, 1), 2_654_435_762);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Xorshift32::seeded(7, 1_700_000_000_000);
        let mut b = Xorshift32::seeded(7, 1_700_000_000_000);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn draws_stay_in_range() {
        let mut rng = Xorshift32::new(12_345);
        for _ in 0..10_000 {
            let u = rng.next_f64();
            assert!((0.0..1.0).contains(&u));
            let c = rng.centered();
            assert!((-0.5..0.5).contains(&c));
        }
    }
}
