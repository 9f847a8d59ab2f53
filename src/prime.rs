// Functions related to identification of prime numbers.
//
// Candidates are first checked against a short table of small odd primes,
// then put through Miller-Rabin. The number of Miller-Rabin rounds grows with
// the number of decimal digits in the candidate, and each round's base comes
// from a pluggable BoundedSampler (see sampler.rs).

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{rngs::OsRng, Rng};

use crate::sampler::{BoundedSampler, DigitSampler};
use crate::{Error, Result};

const SMALL_ODD_PRIMES: [u32; 24] = [
    3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

const MIN_ROUNDS: usize = 5;
const DIGITS_PER_EXTRA_ROUND: usize = 10;

/// Test whether `candidate` is probably prime, using the OS random source and
/// the digit sampler for Miller-Rabin bases.
///
/// Fails with [`Error::InvalidInput`] if `candidate <= 2`.
pub fn is_probable_prime(candidate: &BigUint) -> Result<bool> {
    MillerRabin::<DigitSampler>::default().test(candidate, &mut OsRng)
}

/// Miller-Rabin tester parameterised by the strategy used to draw bases.
#[derive(Debug, Default, Clone, Copy)]
pub struct MillerRabin<S = DigitSampler> {
    sampler: S,
}

impl<S: BoundedSampler> MillerRabin<S> {
    pub fn new(sampler: S) -> Self {
        Self { sampler }
    }

    pub fn test<R: Rng + ?Sized>(&self, candidate: &BigUint, rng: &mut R) -> Result<bool> {
        if candidate <= &BigUint::from(2u32) {
            return Err(Error::InvalidInput(format!(
                "primality test requires a candidate greater than 2, got {candidate}"
            )));
        }
        if !candidate.bit(0) {
            return Ok(false);
        }

        for small_prime in SMALL_ODD_PRIMES {
            let small_prime = BigUint::from(small_prime);
            if candidate == &small_prime {
                return Ok(true);
            }
            if (candidate % &small_prime).is_zero() {
                return Ok(false);
            }
        }

        Ok(self.rounds_pass(candidate, round_count(candidate), rng))
    }

    pub(crate) fn rounds_pass<R: Rng + ?Sized>(
        &self,
        candidate: &BigUint,
        n_rounds: usize,
        rng: &mut R,
    ) -> bool {
        let one = BigUint::one();
        let two = BigUint::from(2u32);
        let candidate_minus_one = candidate - &one;
        let (s, t) = decompose(&candidate_minus_one);

        'rounds: for _ in 0..n_rounds {
            let a = self.sampler.sample(&candidate_minus_one, rng);
            let mut x = a.modpow(&t, candidate);
            if x == one || x == candidate_minus_one {
                continue;
            }
            for _ in 1..s {
                x = x.modpow(&two, candidate);
                if x == one {
                    return false;
                }
                if x == candidate_minus_one {
                    continue 'rounds;
                }
            }
            return false;
        }

        true
    }
}

/// Split `value` into `(s, t)` such that `value = 2^s * t` with `t` odd.
///
/// `value` must be non-zero.
fn decompose(value: &BigUint) -> (u64, BigUint) {
    let s = value.trailing_zeros().unwrap_or(0);
    (s, value >> s)
}

/// Number of Miller-Rabin rounds for a candidate, growing with its decimal
/// digit count.
fn round_count(candidate: &BigUint) -> usize {
    let digits = candidate.to_str_radix(10).len();
    MIN_ROUNDS + digits / DIGITS_PER_EXTRA_ROUND
}
