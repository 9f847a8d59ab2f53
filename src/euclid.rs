// Extended Euclidean algorithm.
//
// For coprime a and b we want the Bézout coefficients x and y such that
//
//   a*x + b*y = 1
//
// Rabin decryption combines the square roots modulo p and modulo q with these
// coefficients (see crt.rs). The coefficients are signed, so the recurrence
// runs over BigInt even though the inputs are unsigned.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, Zero};

use crate::{Error, Result};

pub fn extended_gcd(a: &BigUint, b: &BigUint) -> Result<(BigInt, BigInt)> {
    // Keep the larger operand first, and swap the coefficients back at the end
    // so the identity holds for the caller's argument order.
    let swapped = a < b;
    let (a, b) = if swapped { (b, a) } else { (a, b) };

    let mut old_r = BigInt::from(a.clone());
    let mut r = BigInt::from(b.clone());
    let mut old_x = BigInt::one();
    let mut x = BigInt::zero();
    let mut old_y = BigInt::zero();
    let mut y = BigInt::one();

    while !r.is_zero() {
        let quotient = &old_r / &r;

        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);

        let next_x = &old_x - &quotient * &x;
        old_x = std::mem::replace(&mut x, next_x);

        let next_y = &old_y - &quotient * &y;
        old_y = std::mem::replace(&mut y, next_y);
    }

    if !old_r.is_one() {
        return Err(Error::ArithmeticPrecondition(format!(
            "operands are not coprime (gcd = {old_r})"
        )));
    }

    if swapped {
        Ok((old_y, old_x))
    } else {
        Ok((old_x, old_y))
    }
}
