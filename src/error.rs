/// Errors raised by key generation, primality testing and the block cipher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("arithmetic precondition violated: {0}")]
    ArithmeticPrecondition(String),

    #[error("ambiguous or corrupt ciphertext: {matches} candidate roots matched the tag")]
    AmbiguousCiphertext { matches: usize },

    #[error("corrupt ciphertext: {0}")]
    CorruptCiphertext(String),

    #[error("tagged plaintext block is not smaller than the modulus")]
    PlaintextTooLarge,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key generation failed after {attempts} attempts")]
    KeyGenerationFailed { attempts: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
