// Square roots modulo n = p*q via the Chinese Remainder Theorem.
//
// For a Blum prime p every quadratic residue c has the square roots
// ±c^((p+1)/4) mod p. Combining the roots modulo p and modulo q with the
// Bézout coefficients yp*p + yq*q = 1 gives the four roots modulo n:
//
//   m1 =  yp*p*mq + yq*q*mp   m2 = n - m1
//   m3 =  yp*p*mq - yq*q*mp   m4 = n - m3

use std::fmt;

use num_bigint::{BigInt, BigUint};

use crate::euclid::extended_gcd;
use crate::Result;

/// The four square roots of a ciphertext block, each in `[0, n)`.
pub type RootQuadruple = [BigUint; 4];

/// Compute the four square roots of `c` modulo `p*q`.
pub fn decrypt_roots(c: &BigUint, p: &BigUint, q: &BigUint) -> Result<RootQuadruple> {
    Ok(CrtDecryptor::new(p, q)?.roots(c))
}

/// Per-key CRT state, so the Bézout coefficients are computed once rather
/// than once per block. Like `KeyPair`, its `Debug` output omits the factors.
#[derive(Clone)]
pub struct CrtDecryptor {
    p: BigUint,
    q: BigUint,
    n: BigUint,
    p_exponent: BigUint,
    q_exponent: BigUint,
    // yp*p and yq*q
    p_term: BigInt,
    q_term: BigInt,
}

impl CrtDecryptor {
    pub fn new(p: &BigUint, q: &BigUint) -> Result<Self> {
        let (yp, yq) = extended_gcd(p, q)?;
        Ok(Self {
            p: p.clone(),
            q: q.clone(),
            n: p * q,
            p_exponent: (p + 1u32) >> 2u32,
            q_exponent: (q + 1u32) >> 2u32,
            p_term: yp * BigInt::from(p.clone()),
            q_term: yq * BigInt::from(q.clone()),
        })
    }

    pub fn roots(&self, c: &BigUint) -> RootQuadruple {
        let mp = BigInt::from(c.modpow(&self.p_exponent, &self.p));
        let mq = BigInt::from(c.modpow(&self.q_exponent, &self.q));
        let n = BigInt::from(self.n.clone());

        let lhs = &self.p_term * &mq;
        let rhs = &self.q_term * &mp;

        let m1 = normalise(&(&lhs + &rhs), &n);
        let m3 = normalise(&(&lhs - &rhs), &n);
        let m2 = (&self.n - &m1) % &self.n;
        let m4 = (&self.n - &m3) % &self.n;

        [m1, m2, m3, m4]
    }
}

impl fmt::Debug for CrtDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrtDecryptor").finish_non_exhaustive()
    }
}

/// Reduce `value` into `[0, n)`.
fn normalise(value: &BigInt, n: &BigInt) -> BigUint {
    let reduced = ((value % n) + n) % n;
    reduced.into_parts().1
}
