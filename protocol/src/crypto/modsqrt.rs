//! # Modular Square Roots
//!
//! Point decompression needs `y` from `y^2 = x^3 + ax + b (mod p)`, which is
//! a square root modulo a prime. Nothing in here knows about any particular
//! curve; callers pass the field prime and get back a root (or `None` when
//! the value is a non-residue).
//!
//! Two strategies:
//!
//! - **p ≡ 3 (mod 4)**: the root is `a^((p+1)/4)`. One exponentiation. P-256
//!   and secp256k1 both live here.
//! - **anything else**: Tonelli–Shanks. Slower, but correct for every odd
//!   prime.
//!
//! [`sqrt_mod_prime`] picks one. Both return a value that has been squared
//! and checked before it leaves this module, so a composite "prime" cannot
//! trick us into returning garbage.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Square root of `a` modulo the prime `p`.
///
/// Returns `None` when `a` is not a quadratic residue mod `p`. Which of the
/// two roots comes back is unspecified; parity selection is the caller's job.
pub fn sqrt_mod_prime(a: &BigUint, p: &BigUint) -> Option<BigUint> {
    if p < &BigUint::from(2u32) {
        return None;
    }
    let a = a % p;
    if a.is_zero() {
        return Some(a);
    }
    if p == &BigUint::from(2u32) {
        return Some(a);
    }
    if !is_quadratic_residue(&a, p) {
        return None;
    }

    let root = if is_three_mod_four(p) {
        sqrt_three_mod_four(&a, p)
    } else {
        tonelli_shanks(&a, p)?
    };

    if (&root * &root) % p == a {
        Some(root)
    } else {
        None
    }
}

/// Euler's criterion: `a^((p-1)/2) == 1 (mod p)`.
///
/// Zero is not treated as a residue here; [`sqrt_mod_prime`] handles it first.
pub fn is_quadratic_residue(a: &BigUint, p: &BigUint) -> bool {
    let exp = (p - 1u32) >> 1u32;
    a.modpow(&exp, p).is_one()
}

fn is_three_mod_four(p: &BigUint) -> bool {
    p % 4u32 == BigUint::from(3u32)
}

/// Closed form for p ≡ 3 (mod 4). Only meaningful for quadratic residues.
pub fn sqrt_three_mod_four(a: &BigUint, p: &BigUint) -> BigUint {
    let exp = (p + 1u32) >> 2u32;
    a.modpow(&exp, p)
}

/// General Tonelli–Shanks for an odd prime `p`.
///
/// `a` must already be reduced and a non-zero quadratic residue. Returns
/// `None` if the loop invariants break, which only happens for a composite
/// modulus.
pub fn tonelli_shanks(a: &BigUint, p: &BigUint) -> Option<BigUint> {
    let p_minus_one = p - 1u32;
    // p - 1 = q * 2^s with q odd
    let s = p_minus_one.trailing_zeros()?;
    let q = &p_minus_one >> s;

    let mut z = BigUint::from(2u32);
    while is_quadratic_residue(&z, p) {
        z += 1u32;
        if &z >= p {
            return None;
        }
    }

    let mut m = s;
    let mut c = z.modpow(&q, p);
    let mut t = a.modpow(&q, p);
    let mut r = a.modpow(&((&q + 1u32) >> 1u32), p);

    while !t.is_one() {
        // least i in (0, m) with t^(2^i) == 1
        let mut i = 0u64;
        let mut t2i = t.clone();
        while !t2i.is_one() {
            t2i = (&t2i * &t2i) % p;
            i += 1;
            if i == m {
                return None;
            }
        }

        let mut b = c.clone();
        for _ in 0..(m - i - 1) {
            b = (&b * &b) % p;
        }

        m = i;
        c = (&b * &b) % p;
        t = (&t * &c) % p;
        r = (&r * &b) % p;
    }

    Some(r)
}
