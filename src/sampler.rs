// Strategies for drawing Miller-Rabin bases.
//
// A sampler returns a value in the inclusive range [1, bound]. The primality
// tester is generic over the strategy, so the digit-by-digit sampler can be
// replaced by uniform rejection sampling without touching the test itself.

use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::Rng;

pub trait BoundedSampler {
    /// Draw a value in `[1, bound]`. `bound` must be at least one.
    fn sample<R: Rng + ?Sized>(&self, bound: &BigUint, rng: &mut R) -> BigUint;
}

/// Draws the decimal digits of the result one at a time.
///
/// While every digit drawn so far equals the corresponding digit of the bound,
/// the next digit is capped by the bound's digit. Once a digit falls below it,
/// the remaining digits are free. The result never exceeds the bound, but the
/// distribution is not uniform: small leading digits are over-represented.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigitSampler;

impl BoundedSampler for DigitSampler {
    fn sample<R: Rng + ?Sized>(&self, bound: &BigUint, rng: &mut R) -> BigUint {
        let digits = bound.to_radix_be(10);
        loop {
            let mut tight = true;
            let mut drawn = Vec::with_capacity(digits.len());
            for &limit in &digits {
                let digit = if tight {
                    rng.gen_range(0..=limit)
                } else {
                    rng.gen_range(0..=9u8)
                };
                if digit < limit {
                    tight = false;
                }
                drawn.push(digit);
            }
            // `drawn` only holds digits 0-9, so this always parses.
            if let Some(value) = BigUint::from_radix_be(&drawn, 10) {
                if !value.is_zero() {
                    return value;
                }
            }
        }
    }
}

/// Uniform sampling over `[1, bound]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformSampler;

impl BoundedSampler for UniformSampler {
    fn sample<R: Rng + ?Sized>(&self, bound: &BigUint, rng: &mut R) -> BigUint {
        rng.gen_biguint_range(&BigUint::one(), &(bound + 1u32))
    }
}

/// Sampler selection for callers that choose a strategy at runtime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SamplerKind {
    #[default]
    Digit,
    Uniform,
}

impl BoundedSampler for SamplerKind {
    fn sample<R: Rng + ?Sized>(&self, bound: &BigUint, rng: &mut R) -> BigUint {
        match self {
            SamplerKind::Digit => DigitSampler.sample(bound, rng),
            SamplerKind::Uniform => UniformSampler.sample(bound, rng),
        }
    }
}
