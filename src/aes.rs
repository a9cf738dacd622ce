use std::collections::HashSet;

use openssl::symm::{Cipher, Crypter, Mode};

use crate::error::{Error, Result};
use crate::xor;

/// Block width of the underlying cipher, in bytes.
pub const BLOCK_SIZE: usize = 16;
/// Key length the underlying cipher accepts, in bytes.
pub const KEY_SIZE: usize = 16;

/// Runs exactly one AES-128 block through openssl with padding disabled.
/// This is the only place the external cipher is touched; the mode loops
/// below own everything else.
fn aes128_block(mode: Mode, key: &[u8], block: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_SIZE {
        return Err(Error::InvalidKeyLength(key.len()));
    }
    if block.len() != BLOCK_SIZE {
        return Err(Error::UnalignedInput);
    }

    let mut c = Crypter::new(Cipher::aes_128_ecb(), mode, key, None)?;
    c.pad(false);
    let mut out = vec![0; BLOCK_SIZE + Cipher::aes_128_ecb().block_size()];
    let count = c.update(block, &mut out)?;
    let rest = c.finalize(&mut out[count..])?;
    out.truncate(count + rest);
    Ok(out)
}

/// Encrypts a single block under the raw cipher.
pub fn encrypt_block(key: &[u8], block: &[u8]) -> Result<Vec<u8>> {
    aes128_block(Mode::Encrypt, key, block)
}

/// Decrypts a single block under the raw cipher.
pub fn decrypt_block(key: &[u8], block: &[u8]) -> Result<Vec<u8>> {
    aes128_block(Mode::Decrypt, key, block)
}

/// ECB mode: each block is processed independently, so equal plaintext
/// blocks produce equal ciphertext blocks anywhere in the message.
pub struct EcbCipher {
    key: Vec<u8>,
}

impl EcbCipher {
    pub fn new(key: &[u8]) -> Result<EcbCipher> {
        if key.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength(key.len()));
        }
        Ok(EcbCipher { key: key.to_vec() })
    }

    /// Encrypts a block-aligned plaintext.
    pub fn encrypt(&self, pt: &[u8]) -> Result<Vec<u8>> {
        if pt.len() % BLOCK_SIZE != 0 {
            return Err(Error::UnalignedInput);
        }
        let mut ct = Vec::with_capacity(pt.len());
        for block in pt.chunks(BLOCK_SIZE) {
            ct.extend(encrypt_block(&self.key, block)?);
        }
        Ok(ct)
    }

    /// Decrypts a block-aligned ciphertext.
    pub fn decrypt(&self, ct: &[u8]) -> Result<Vec<u8>> {
        if ct.len() % BLOCK_SIZE != 0 {
            return Err(Error::UnalignedInput);
        }
        let mut pt = Vec::with_capacity(ct.len());
        for block in ct.chunks(BLOCK_SIZE) {
            pt.extend(decrypt_block(&self.key, block)?);
        }
        Ok(pt)
    }
}

/// CBC mode built on the same single-block primitive.
pub struct CbcCipher {
    key: Vec<u8>,
}

impl CbcCipher {
    pub fn new(key: &[u8]) -> Result<CbcCipher> {
        if key.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength(key.len()));
        }
        Ok(CbcCipher { key: key.to_vec() })
    }

    /// Encrypts a block-aligned plaintext: each block is XORed with the
    /// previous ciphertext block (the IV for the first) before the block
    /// cipher runs.
    pub fn encrypt(&self, pt: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        if pt.len() % BLOCK_SIZE != 0 {
            return Err(Error::UnalignedInput);
        }
        if iv.len() != BLOCK_SIZE {
            return Err(Error::InvalidIvLength);
        }

        let mut ct = Vec::with_capacity(pt.len());
        let mut prev = iv.to_vec();
        for block in pt.chunks(BLOCK_SIZE) {
            let mixed = xor::fixed_xor(block, &prev)?;
            prev = encrypt_block(&self.key, &mixed)?;
            ct.extend_from_slice(&prev);
        }
        Ok(ct)
    }

    /// Decrypts a block-aligned ciphertext. The chain value is the previous
    /// block of the input ciphertext, not of the output.
    pub fn decrypt(&self, ct: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        if ct.len() % BLOCK_SIZE != 0 {
            return Err(Error::UnalignedInput);
        }
        if iv.len() != BLOCK_SIZE {
            return Err(Error::InvalidIvLength);
        }

        let mut pt = Vec::with_capacity(ct.len());
        let mut prev: &[u8] = iv;
        for block in ct.chunks(BLOCK_SIZE) {
            let clear = decrypt_block(&self.key, block)?;
            pt.extend(xor::fixed_xor(&clear, prev)?);
            prev = block;
        }
        Ok(pt)
    }
}

/// Flags a ciphertext as ECB when any whole block repeats exactly. Works
/// whenever the plaintext was long and regular enough to repeat a block;
/// chaining modes never show this short of astronomical luck. Ciphertexts
/// shorter than two blocks are never flagged.
pub fn detect_ecb(ct: &[u8], block_size: usize) -> bool {
    let mut seen = HashSet::new();
    ct.chunks_exact(block_size).any(|block| !seen.insert(block))
}
