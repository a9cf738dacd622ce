use thiserror::Error;

/// Everything that can fail in this crate. All variants are recoverable and
/// reported to the immediate caller; the attack variants at the bottom mean
/// an oracle did not behave as assumed, which aborts that attack attempt
/// only.
#[derive(Error, Debug)]
pub enum Error {
    #[error("empty input")]
    EmptyInput,

    #[error("operands differ in length")]
    UnequalLengths,

    #[error("invalid key size search range")]
    InvalidRange,

    #[error("input is not a whole number of blocks")]
    UnalignedInput,

    #[error("IV length does not match the block size")]
    InvalidIvLength,

    #[error("block size {0} does not fit in a pad byte")]
    InvalidBlockSize(usize),

    #[error("invalid pad byte {0:#04x}")]
    MalformedPadding(u8),

    #[error("unsupported key length {0}")]
    InvalidKeyLength(usize),

    #[error("no probe length produced a duplicated ciphertext block")]
    BlockSizeNotFound,

    #[error("ciphertext length never grew past the baseline")]
    SuffixLengthNotFound,

    #[error("no candidate matched for byte {0}")]
    ByteNotFound(usize),

    #[error(transparent)]
    Cipher(#[from] openssl::error::ErrorStack),
}

pub type Result<T> = std::result::Result<T, Error>;
