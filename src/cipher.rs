// Rabin block cipher over byte streams.
//
// The input is split into 16 byte blocks. Each block is read as a big-endian
// integer m, tagged, and encrypted as
//
//   c = tag(m)^2 mod n
//
// The ciphertext blocks are the minimal big-endian encodings of c, so their
// length varies from block to block. A BlockLedger records those lengths (and
// the total plaintext length) and has to travel with the ciphertext, since
// without it the ciphertext cannot be split back into blocks.
//
// Decryption computes the four square roots of each block (crt.rs), lets the
// Disambiguator pick the tagged one (codec.rs) and restores the block to its
// original width.

use std::io::{ErrorKind, Read};

use num_bigint::BigUint;
use num_traits::Zero;
use rayon::prelude::*;

use crate::codec::{Disambiguator, SuffixTag};
use crate::crt::CrtDecryptor;
use crate::key::KeyPair;
use crate::{Error, Result};

pub const BLOCK_SIZE: usize = 16;

/// Encrypt everything readable from `stream` under the factors `p` and `q`.
pub fn encrypt_stream<R: Read>(
    stream: R,
    p: &BigUint,
    q: &BigUint,
) -> Result<(Vec<u8>, BlockLedger)> {
    BlockCipher::new(KeyPair::from_primes(p.clone(), q.clone())?)?.encrypt_stream(stream)
}

/// Decrypt ciphertext produced by [`encrypt_stream`] using its ledger.
pub fn decrypt_stream(
    ciphertext: &[u8],
    ledger: &BlockLedger,
    p: &BigUint,
    q: &BigUint,
) -> Result<Vec<u8>> {
    BlockCipher::new(KeyPair::from_primes(p.clone(), q.clone())?)?.decrypt(ciphertext, ledger)
}

/// Per-block ciphertext lengths plus the total plaintext length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLedger {
    block_lengths: Vec<usize>,
    plaintext_len: usize,
}

impl BlockLedger {
    pub fn new(block_lengths: Vec<usize>, plaintext_len: usize) -> Self {
        Self {
            block_lengths,
            plaintext_len,
        }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.block_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_lengths.is_empty()
    }

    pub fn block_lengths(&self) -> &[usize] {
        &self.block_lengths
    }

    pub fn plaintext_len(&self) -> usize {
        self.plaintext_len
    }

    pub fn ciphertext_len(&self) -> usize {
        self.block_lengths.iter().sum()
    }

    fn push(&mut self, ciphertext_len: usize, plaintext_len: usize) {
        self.block_lengths.push(ciphertext_len);
        self.plaintext_len += plaintext_len;
    }

    /// Width of plaintext block `index`. Every block but the last is full.
    fn plaintext_block_len(&self, index: usize) -> usize {
        if index + 1 < self.len() {
            BLOCK_SIZE
        } else {
            self.plaintext_len - BLOCK_SIZE * index
        }
    }

    fn validate(&self) -> Result<()> {
        let full_blocks = self.len().saturating_sub(1);
        let consistent = if self.is_empty() {
            self.plaintext_len == 0
        } else {
            self.plaintext_len > BLOCK_SIZE * full_blocks
                && self.plaintext_len <= BLOCK_SIZE * self.len()
        };
        if !consistent {
            return Err(Error::CorruptCiphertext(format!(
                "ledger of {} blocks cannot describe {} plaintext bytes",
                self.len(),
                self.plaintext_len
            )));
        }
        if self.block_lengths.contains(&0) {
            return Err(Error::CorruptCiphertext(
                "ledger contains an empty block".to_string(),
            ));
        }
        Ok(())
    }
}

/// Encrypts and decrypts byte streams block by block under one key pair.
#[derive(Debug, Clone)]
pub struct BlockCipher<D = SuffixTag> {
    keys: KeyPair,
    crt: CrtDecryptor,
    disambiguator: D,
    parallel: bool,
}

impl BlockCipher<SuffixTag> {
    pub fn new(keys: KeyPair) -> Result<Self> {
        Self::with_disambiguator(keys, SuffixTag::default())
    }
}

impl<D: Disambiguator + Sync> BlockCipher<D> {
    pub fn with_disambiguator(keys: KeyPair, disambiguator: D) -> Result<Self> {
        let crt = CrtDecryptor::new(keys.p(), keys.q())?;
        Ok(Self {
            keys,
            crt,
            disambiguator,
            parallel: false,
        })
    }

    /// Process blocks on the rayon thread pool. Output order is unchanged.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, BlockLedger)> {
        self.encrypt_stream(plaintext)
    }

    pub fn encrypt_stream<R: Read>(&self, mut stream: R) -> Result<(Vec<u8>, BlockLedger)> {
        let mut blocks = Vec::new();
        loop {
            let mut buffer = [0u8; BLOCK_SIZE];
            let bytes_read = read_block(&mut stream, &mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            blocks.push(buffer[..bytes_read].to_vec());
        }

        let encrypted = self.map_blocks(&blocks, |block| self.encrypt_block(block))?;

        let mut ciphertext = Vec::new();
        let mut ledger = BlockLedger::default();
        for (block, encrypted_block) in blocks.iter().zip(encrypted) {
            ledger.push(encrypted_block.len(), block.len());
            ciphertext.extend(encrypted_block);
        }

        log::debug!(
            "encrypted {} plaintext bytes into {} blocks ({} ciphertext bytes)",
            ledger.plaintext_len(),
            ledger.len(),
            ciphertext.len()
        );
        Ok((ciphertext, ledger))
    }

    pub fn decrypt(&self, ciphertext: &[u8], ledger: &BlockLedger) -> Result<Vec<u8>> {
        ledger.validate()?;

        let mut blocks = Vec::with_capacity(ledger.len());
        let mut remaining = ciphertext;
        for (index, &block_len) in ledger.block_lengths().iter().enumerate() {
            if remaining.is_empty() {
                log::warn!(
                    "ciphertext ended after {index} of {} blocks",
                    ledger.len()
                );
                break;
            }
            if remaining.len() < block_len {
                return Err(Error::CorruptCiphertext(format!(
                    "block {index} needs {block_len} bytes but only {} remain",
                    remaining.len()
                )));
            }
            let (block, rest) = remaining.split_at(block_len);
            blocks.push((block, ledger.plaintext_block_len(index)));
            remaining = rest;
        }
        if !remaining.is_empty() {
            log::warn!("ignoring {} bytes past the last ledger block", remaining.len());
        }

        let decrypted =
            self.map_blocks(&blocks, |&(block, width)| self.decrypt_block(block, width))?;

        let plaintext: Vec<u8> = decrypted.concat();
        log::debug!(
            "decrypted {} blocks into {} plaintext bytes",
            decrypted.len(),
            plaintext.len()
        );
        Ok(plaintext)
    }

    /// Encrypt a single block of at most [`BLOCK_SIZE`] bytes.
    pub fn encrypt_block(&self, block: &[u8]) -> Result<Vec<u8>> {
        let m = BigUint::from_bytes_be(block);
        let tagged = self.disambiguator.tag(&m);
        if &tagged >= self.keys.n() {
            return Err(Error::PlaintextTooLarge);
        }

        let c = tagged.modpow(&BigUint::from(2u32), self.keys.n());
        let encrypted = c.to_bytes_be();
        log::trace!("block of {} bytes -> {} bytes", block.len(), encrypted.len());
        Ok(encrypted)
    }

    /// Decrypt a single ciphertext block back to a plaintext block `width`
    /// bytes wide.
    pub fn decrypt_block(&self, block: &[u8], width: usize) -> Result<Vec<u8>> {
        let c = BigUint::from_bytes_be(block);
        if &c >= self.keys.n() {
            return Err(Error::CorruptCiphertext(
                "ciphertext block is not smaller than the modulus".to_string(),
            ));
        }

        let roots = self.crt.roots(&c);
        let m = self.disambiguator.untag(&self.disambiguator.select(&roots)?);

        let bytes = if m.is_zero() {
            Vec::new()
        } else {
            m.to_bytes_be()
        };
        if bytes.len() > width {
            return Err(Error::CorruptCiphertext(format!(
                "decrypted block is {} bytes, expected at most {width}",
                bytes.len()
            )));
        }

        let mut plaintext = vec![0u8; width - bytes.len()];
        plaintext.extend(bytes);
        Ok(plaintext)
    }

    fn map_blocks<T, U, F>(&self, blocks: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        if self.parallel {
            blocks.par_iter().map(f).collect()
        } else {
            blocks.iter().map(f).collect()
        }
    }
}

/// Fill `buffer` from `stream`, stopping early only at end of stream.
fn read_block<R: Read>(stream: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match stream.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::crt::RootQuadruple;
    use crate::key::KeyPairBuilder;

    use rand::{rngs::StdRng, SeedableRng};
    use rstest::{fixture, rstest};

    #[fixture]
    #[once]
    fn keys() -> KeyPair {
        let mut rng = StdRng::from_seed([101; 32]);
        KeyPairBuilder::new().build_with_rng(&mut rng).unwrap()
    }

    struct OneByteReader<'a> {
        data: &'a [u8],
    }

    impl Read for OneByteReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match (self.data.split_first(), buf.first_mut()) {
                (Some((&byte, rest)), Some(slot)) => {
                    *slot = byte;
                    self.data = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other, "disk on fire"))
        }
    }

    struct RejectAllRoots;

    impl Disambiguator for RejectAllRoots {
        fn tag(&self, m: &BigUint) -> BigUint {
            m.clone()
        }

        fn untag(&self, m: &BigUint) -> BigUint {
            m.clone()
        }

        fn select(&self, _roots: &RootQuadruple) -> Result<BigUint> {
            Err(Error::AmbiguousCiphertext { matches: 0 })
        }
    }

    #[test]
    fn hello_world_round_trips_under_fresh_keypair() {
        let keys = KeyPair::generate().unwrap();
        let message = b"hello world";

        let (ciphertext, ledger) = encrypt_stream(&message[..], keys.p(), keys.q()).unwrap();
        let decrypted = decrypt_stream(&ciphertext, &ledger, keys.p(), keys.q()).unwrap();

        assert_eq!(ledger.len(), 1);
        assert_eq!(decrypted, message);
    }

    #[rstest]
    fn two_full_blocks_produce_ledger_of_two(keys: &KeyPair) {
        let message: Vec<u8> = (0u8..32).collect();
        let cipher = BlockCipher::new(keys.clone()).unwrap();

        let (ciphertext, ledger) = cipher.encrypt(&message).unwrap();
        let decrypted = cipher.decrypt(&ciphertext, &ledger).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.plaintext_len(), 32);
        assert_eq!(decrypted, message);
    }

    #[rstest]
    fn empty_stream_produces_empty_ciphertext_and_ledger(keys: &KeyPair) {
        let (ciphertext, ledger) = encrypt_stream(&b""[..], keys.p(), keys.q()).unwrap();
        let decrypted = decrypt_stream(&ciphertext, &ledger, keys.p(), keys.q()).unwrap();

        assert!(ciphertext.is_empty());
        assert!(ledger.is_empty());
        assert!(decrypted.is_empty());
    }

    #[rstest]
    #[case(b"a".to_vec())]
    #[case(b"exactly 16 bytes".to_vec())]
    #[case(b"seventeen bytes!!".to_vec())]
    #[case(vec![0u8; 16])]
    #[case(vec![0u8; 40])]
    #[case(vec![0xffu8; 48])]
    #[case([vec![0u8, 0, 0, 1], vec![7u8; 30]].concat())]
    #[case(b"Lorem ipsum dolor sit amet ".repeat(20))]
    fn plaintext_round_trips_exactly(keys: &KeyPair, #[case] message: Vec<u8>) {
        let cipher = BlockCipher::new(keys.clone()).unwrap();

        let (ciphertext, ledger) = cipher.encrypt(&message).unwrap();
        let decrypted = cipher.decrypt(&ciphertext, &ledger).unwrap();

        assert_eq!(ledger.len(), message.len().div_ceil(BLOCK_SIZE));
        assert_eq!(ledger.ciphertext_len(), ciphertext.len());
        assert_eq!(decrypted, message);
    }

    #[rstest]
    fn parallel_cipher_matches_sequential_cipher(keys: &KeyPair) {
        let message = b"The quick brown fox jumps over the lazy dog".repeat(10);
        let sequential = BlockCipher::new(keys.clone()).unwrap();
        let parallel = BlockCipher::new(keys.clone()).unwrap().parallel(true);

        let (ciphertext, ledger) = sequential.encrypt(&message).unwrap();
        let (parallel_ciphertext, parallel_ledger) = parallel.encrypt(&message).unwrap();

        assert_eq!(parallel_ciphertext, ciphertext);
        assert_eq!(parallel_ledger, ledger);
        assert_eq!(parallel.decrypt(&ciphertext, &ledger).unwrap(), message);
    }

    #[rstest]
    fn short_reads_are_collected_into_full_blocks(keys: &KeyPair) {
        let message = b"one byte at a time, please";
        let cipher = BlockCipher::new(keys.clone()).unwrap();

        let (ciphertext, ledger) = cipher
            .encrypt_stream(OneByteReader { data: message })
            .unwrap();

        assert_eq!(cipher.encrypt(message).unwrap(), (ciphertext, ledger));
    }

    #[rstest]
    fn read_errors_are_propagated(keys: &KeyPair) {
        let cipher = BlockCipher::new(keys.clone()).unwrap();

        let result = cipher.encrypt_stream(FailingReader);

        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[rstest]
    fn truncated_block_is_rejected(keys: &KeyPair) {
        let cipher = BlockCipher::new(keys.clone()).unwrap();
        let (ciphertext, ledger) = cipher.encrypt(b"some secret text").unwrap();

        let result = cipher.decrypt(&ciphertext[..ciphertext.len() - 1], &ledger);

        assert!(matches!(result, Err(Error::CorruptCiphertext(_))));
    }

    #[rstest]
    fn decryption_stops_when_ciphertext_ends_on_block_boundary(keys: &KeyPair) {
        let message: Vec<u8> = (0u8..40).collect();
        let cipher = BlockCipher::new(keys.clone()).unwrap();
        let (ciphertext, ledger) = cipher.encrypt(&message).unwrap();

        let first_block_len = ledger.block_lengths()[0];
        let decrypted = cipher
            .decrypt(&ciphertext[..first_block_len], &ledger)
            .unwrap();

        assert_eq!(decrypted, &message[..BLOCK_SIZE]);
    }

    #[rstest]
    #[case(BlockLedger::new(vec![], 3))]
    #[case(BlockLedger::new(vec![128], 0))]
    #[case(BlockLedger::new(vec![128], 17))]
    #[case(BlockLedger::new(vec![128, 128], 16))]
    #[case(BlockLedger::new(vec![0], 4))]
    fn inconsistent_ledger_is_rejected(keys: &KeyPair, #[case] ledger: BlockLedger) {
        let cipher = BlockCipher::new(keys.clone()).unwrap();

        let result = cipher.decrypt(&[1u8; 256], &ledger);

        assert!(matches!(result, Err(Error::CorruptCiphertext(_))));
    }

    #[rstest]
    fn ciphertext_block_not_below_modulus_is_rejected(keys: &KeyPair) {
        let cipher = BlockCipher::new(keys.clone()).unwrap();
        let block = keys.n().to_bytes_be();

        let result = cipher.decrypt_block(&block, BLOCK_SIZE);

        assert!(matches!(result, Err(Error::CorruptCiphertext(_))));
    }

    #[test]
    fn block_too_large_for_modulus_is_rejected() {
        let keys = KeyPair::from_primes(BigUint::from(1019u64), BigUint::from(7919u64)).unwrap();
        let cipher = BlockCipher::new(keys).unwrap();

        let result = cipher.encrypt(b"far too large for this key");

        assert!(matches!(result, Err(Error::PlaintextTooLarge)));
    }

    #[test]
    fn small_key_round_trips_single_byte() {
        let keys = KeyPair::from_primes(BigUint::from(1019u64), BigUint::from(7919u64)).unwrap();
        let cipher = BlockCipher::with_disambiguator(keys, SuffixTag::new(1)).unwrap();

        let encrypted = cipher.encrypt_block(&[42]).unwrap();
        let decrypted = cipher.decrypt_block(&encrypted, 1).unwrap();

        assert_eq!(decrypted, vec![42]);
    }

    #[rstest]
    fn root_selection_failure_aborts_decryption(keys: &KeyPair) {
        let cipher = BlockCipher::with_disambiguator(keys.clone(), RejectAllRoots).unwrap();
        let (ciphertext, ledger) = cipher.encrypt(b"hello world").unwrap();

        let result = cipher.decrypt(&ciphertext, &ledger);

        assert!(matches!(result, Err(Error::AmbiguousCiphertext { .. })));
    }

    #[rstest]
    fn encryption_is_deterministic(keys: &KeyPair) {
        let message = b"same input, same output";

        let first = encrypt_stream(&message[..], keys.p(), keys.q()).unwrap();
        let second = encrypt_stream(&message[..], keys.p(), keys.q()).unwrap();

        assert_eq!(first, second);
    }

    #[rstest]
    fn stream_functions_reject_invalid_factors(keys: &KeyPair) {
        let result = encrypt_stream(&b"hello"[..], keys.p(), keys.p());

        assert!(matches!(result, Err(Error::InvalidKey(_))));
    }
}
