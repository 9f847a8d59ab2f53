//! # Rabin cryptosystem
//!
//! Block-wise Rabin encryption of byte streams. Keys are pairs of 512-bit
//! Blum primes found with Miller-Rabin; each 16 byte block is tagged and
//! squared modulo `n = p * q`; decryption takes the four CRT square roots and
//! keeps the tagged one.
//!
//! This is a demonstration cipher: decryption needs both factors, the tag
//! leaks structure about every block, and nothing is constant time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rabin::{decrypt_stream, encrypt_stream, KeyPair};
//!
//! let keys = KeyPair::generate().expect("key generation failed");
//! let message = b"hello world";
//!
//! let (ciphertext, ledger) = encrypt_stream(&message[..], keys.p(), keys.q()).unwrap();
//! let decrypted = decrypt_stream(&ciphertext, &ledger, keys.p(), keys.q()).unwrap();
//! assert_eq!(decrypted, message);
//! ```

mod cipher;
mod codec;
mod crt;
mod error;
mod euclid;
mod key;
mod prime;
mod sampler;

pub use cipher::{decrypt_stream, encrypt_stream, BlockCipher, BlockLedger, BLOCK_SIZE};
pub use codec::{tag, untag, Disambiguator, SuffixTag, TAG};
pub use crt::{decrypt_roots, CrtDecryptor, RootQuadruple};
pub use error::{Error, Result};
pub use euclid::extended_gcd;
pub use key::{generate_modulus, generate_private_key, KeyPair, KeyPairBuilder, PRIME_BITS};
pub use prime::{is_probable_prime, MillerRabin};
pub use sampler::{BoundedSampler, DigitSampler, SamplerKind, UniformSampler};
