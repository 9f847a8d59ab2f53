// Disambiguating the four Rabin roots.
//
// Squaring modulo n = p*q is four-to-one, so decryption produces four
// candidate plaintexts. Before encryption each block is multiplied by 10000,
// which gives the real plaintext four trailing zeros in decimal. At decryption
// time the candidate ending in "0000" is the one we want.
//
// This is a correctness device, not security padding. It makes the cipher
// strictly weaker because every tagged value is known to be a multiple of
// 10000. The Disambiguator trait is the seam where a stronger redundancy
// scheme would plug in.

use num_bigint::BigUint;
use num_traits::{One, Zero};

use crate::cipher::BLOCK_SIZE;
use crate::crt::RootQuadruple;
use crate::{Error, Result};

pub const TAG: u32 = 10_000;

pub fn tag(m: &BigUint) -> BigUint {
    m * TAG
}

pub fn untag(m: &BigUint) -> BigUint {
    m / TAG
}

/// Tags plaintext blocks before encryption and picks the real root after
/// decryption.
pub trait Disambiguator {
    fn tag(&self, m: &BigUint) -> BigUint;

    fn untag(&self, m: &BigUint) -> BigUint;

    /// Select the single tagged root that encodes the original block.
    fn select(&self, roots: &RootQuadruple) -> Result<BigUint>;
}

/// Selects the root whose decimal representation ends in `0000`.
///
/// A root only counts as a match if, once untagged, it also fits in a single
/// plaintext block. Duplicate roots (e.g. for an all-zero block) count once.
#[derive(Debug, Clone)]
pub struct SuffixTag {
    plaintext_limit: BigUint,
}

impl SuffixTag {
    pub fn new(block_size: usize) -> Self {
        Self {
            plaintext_limit: BigUint::one() << (8 * block_size),
        }
    }

    fn matches(&self, root: &BigUint) -> bool {
        (root % TAG).is_zero() && untag(root) < self.plaintext_limit
    }
}

impl Default for SuffixTag {
    fn default() -> Self {
        Self::new(BLOCK_SIZE)
    }
}

impl Disambiguator for SuffixTag {
    fn tag(&self, m: &BigUint) -> BigUint {
        tag(m)
    }

    fn untag(&self, m: &BigUint) -> BigUint {
        untag(m)
    }

    fn select(&self, roots: &RootQuadruple) -> Result<BigUint> {
        let mut candidates: Vec<&BigUint> = roots.iter().filter(|root| self.matches(root)).collect();
        candidates.sort();
        candidates.dedup();

        match candidates.as_slice() {
            [root] => Ok((*root).clone()),
            _ => {
                log::warn!("{} of 4 roots carry the tag", candidates.len());
                Err(Error::AmbiguousCiphertext {
                    matches: candidates.len(),
                })
            }
        }
    }
}
