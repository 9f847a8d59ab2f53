// Rabin key generation.
//
// The private key is a pair of distinct Blum primes p and q (primes congruent
// to 3 mod 4) and the public key is their product n. The Blum condition is
// what lets decryption take square roots with a single exponentiation, see
// crt.rs.

use std::fmt;

use num_bigint::BigUint;
use rand::{rngs::OsRng, Rng};

use crate::prime::MillerRabin;
use crate::sampler::SamplerKind;
use crate::{Error, Result};

/// Bit length of the random domain each prime is drawn from.
pub const PRIME_BITS: usize = 512;

const DEFAULT_MAX_ATTEMPTS: usize = 100_000;

/// Generate a 512-bit Blum prime using the OS random source.
pub fn generate_private_key() -> Result<BigUint> {
    KeyPairBuilder::new().generate_prime(&mut OsRng)
}

pub fn generate_modulus(p: &BigUint, q: &BigUint) -> BigUint {
    p * q
}

/// Two distinct Blum primes and their product.
///
/// Decryption needs both factors, so this type holds the whole key. The
/// factors are left out of the `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    p: BigUint,
    q: BigUint,
    n: BigUint,
}

impl KeyPair {
    /// Generate a key pair from the OS random source with default settings.
    pub fn generate() -> Result<Self> {
        KeyPairBuilder::new().build()
    }

    /// Build a key pair from known factors.
    ///
    /// Checks that the factors are distinct, odd and congruent to 3 mod 4.
    /// Primality is not checked.
    pub fn from_primes(p: BigUint, q: BigUint) -> Result<Self> {
        for factor in [&p, &q] {
            if factor <= &BigUint::from(2u32) || factor % 4u32 != BigUint::from(3u32) {
                return Err(Error::InvalidKey(format!(
                    "{factor} is not congruent to 3 mod 4"
                )));
            }
        }
        if p == q {
            return Err(Error::InvalidKey("factors must be distinct".to_string()));
        }

        let n = generate_modulus(&p, &q);
        Ok(Self { p, q, n })
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn q(&self) -> &BigUint {
        &self.q
    }

    /// The public modulus `n = p * q`.
    pub fn n(&self) -> &BigUint {
        &self.n
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("n_bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// Configures Blum prime and key pair generation.
#[derive(Debug, Clone)]
pub struct KeyPairBuilder {
    max_attempts: usize,
    sampler: SamplerKind,
    prime_bits: usize,
}

impl KeyPairBuilder {
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sampler: SamplerKind::default(),
            prime_bits: PRIME_BITS,
        }
    }

    /// Maximum number of random draws per prime before giving up.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Strategy used to draw Miller-Rabin bases.
    pub fn sampler(mut self, sampler: SamplerKind) -> Self {
        self.sampler = sampler;
        self
    }

    #[cfg(test)]
    pub(crate) fn prime_bits(mut self, bits: usize) -> Self {
        self.prime_bits = bits;
        self
    }

    pub fn build(&self) -> Result<KeyPair> {
        self.build_with_rng(&mut OsRng)
    }

    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<KeyPair> {
        let p = self.generate_prime(rng)?;
        let mut q = self.generate_prime(rng)?;
        while q == p {
            q = self.generate_prime(rng)?;
        }
        KeyPair::from_primes(p, q)
    }

    /// Draw random candidates until one is a Blum prime.
    ///
    /// Candidates are read as big-endian integers from `prime_bits / 8` random
    /// bytes. Draws with the top bit set are rejected, which keeps every
    /// accepted prime below 2^(prime_bits - 1).
    pub fn generate_prime<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<BigUint> {
        let tester = MillerRabin::new(self.sampler);
        let three = BigUint::from(3u32);
        let mut bytes = vec![0u8; self.prime_bits / 8];

        for attempt in 1..=self.max_attempts {
            rng.fill_bytes(&mut bytes);
            if bytes.first().is_some_and(|byte| byte & 0x80 != 0) {
                continue;
            }

            let candidate = BigUint::from_bytes_be(&bytes);
            if candidate <= BigUint::from(2u32) || &candidate % 4u32 != three {
                continue;
            }
            if tester.test(&candidate, rng)? {
                log::debug!(
                    "found {}-bit Blum prime after {attempt} draws",
                    candidate.bits()
                );
                return Ok(candidate);
            }
        }

        log::warn!(
            "no Blum prime found in {} draws of {} bits",
            self.max_attempts,
            self.prime_bits
        );
        Err(Error::KeyGenerationFailed {
            attempts: self.max_attempts,
        })
    }
}

impl Default for KeyPairBuilder {
    fn default() -> Self {
        Self::new()
    }
}
