//! Attacks against symmetric ciphers used badly: statistical breaks of
//! single-byte and repeating-key XOR, ECB fingerprinting by duplicated
//! blocks, chosen-plaintext recovery of a secret an ECB oracle appends to
//! every message, and cut-and-paste forgery of an ECB-encrypted record.
//!
//! The block cipher itself is AES-128 via openssl; everything layered on
//! top of the single-block calls (modes, padding, oracles, attacks) lives
//! here.

pub mod aes;
pub mod error;
pub mod oracle;
pub mod pkcs;
pub mod profile;
pub mod xor;

pub use error::{Error, Result};
