use log::debug;
use rand::prelude::*;

use crate::aes::{self, CbcCipher, EcbCipher, BLOCK_SIZE, KEY_SIZE};
use crate::error::{Error, Result};
use crate::pkcs;

/// Which block mode a coin-flip encryption took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Ecb,
    Cbc,
}

/// Encrypts under a freshly drawn key, flipping a fair coin between ECB and
/// CBC (random IV), with 5 to 10 bytes of random noise glued to each end of
/// the input before padding. Returns the mode taken alongside the
/// ciphertext so trials can be scored.
pub fn encrypt_with_random_mode(input: &[u8]) -> Result<(Vec<u8>, Mode)> {
    let mut rng = rand::thread_rng();

    let mut key = [0u8; KEY_SIZE];
    rng.fill_bytes(&mut key);

    let mut front = [0u8; 10];
    let front_len = rng.gen_range(5..=10);
    rng.fill_bytes(&mut front[..front_len]);

    let mut back = [0u8; 10];
    let back_len = rng.gen_range(5..=10);
    rng.fill_bytes(&mut back[..back_len]);

    let noisy = [&front[..front_len], input, &back[..back_len]].concat();
    let padded = pkcs::pkcs7_pad(&noisy, BLOCK_SIZE)?;

    if rng.gen_range(0..2) == 0 {
        let ct = EcbCipher::new(&key)?.encrypt(&padded)?;
        Ok((ct, Mode::Ecb))
    } else {
        let mut iv = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut iv);
        let ct = CbcCipher::new(&key)?.encrypt(&padded, &iv)?;
        Ok((ct, Mode::Cbc))
    }
}

/// Encrypts attacker-controlled bytes followed by a fixed secret suffix,
/// always in ECB under a key fixed at construction. Neither the key nor the
/// suffix is ever exposed; the attack code below recovers the suffix
/// through `encrypt` alone.
pub struct SuffixOracle {
    ecb: EcbCipher,
    suffix: Vec<u8>,
}

impl SuffixOracle {
    /// Builds an oracle on a randomly drawn key.
    pub fn new(suffix: &[u8]) -> Result<SuffixOracle> {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self::with_key(&key, suffix)
    }

    /// Builds an oracle on a caller-supplied key, for reproducible runs.
    pub fn with_key(key: &[u8], suffix: &[u8]) -> Result<SuffixOracle> {
        Ok(SuffixOracle {
            ecb: EcbCipher::new(key)?,
            suffix: suffix.to_vec(),
        })
    }

    /// ECB(pad(attacker_bytes || suffix)) under the oracle's key.
    pub fn encrypt(&self, attacker_bytes: &[u8]) -> Result<Vec<u8>> {
        let pt = pkcs::pkcs7_pad(&[attacker_bytes, &self.suffix].concat(), BLOCK_SIZE)?;
        self.ecb.encrypt(&pt)
    }
}

/// Finds the oracle's block size by feeding two identical runs of zeros and
/// growing the run until the ciphertext shows a duplicated block. A hit
/// also confirms the oracle really is in ECB mode.
pub fn find_block_size(oracle: &SuffixOracle) -> Result<usize> {
    for bs in 2..=128 {
        let probe = vec![0u8; 2 * bs];
        if aes::detect_ecb(&oracle.encrypt(&probe)?, bs) {
            return Ok(bs);
        }
    }
    Err(Error::BlockSizeNotFound)
}

/// Recovers the length of the hidden suffix by watching the ciphertext
/// grow. With `i` bytes of filler the total length first jumps by a block
/// exactly when the filler has eaten all the pad bytes the suffix left
/// free, so the suffix length is the empty-input length minus that `i`.
pub fn find_suffix_len(oracle: &SuffixOracle) -> Result<usize> {
    let block_size = find_block_size(oracle)?;

    let baseline = oracle.encrypt(&[])?.len();
    for i in 1..=block_size {
        if oracle.encrypt(&vec![0u8; i])?.len() > baseline {
            return Ok(baseline - i);
        }
    }
    Err(Error::SuffixLengthNotFound)
}

/// Recovers the whole suffix one byte at a time, never touching the key.
///
/// Each position gets a zero-filler prefix sized so the next unknown suffix
/// byte lands in the last slot of some block. One query with just the
/// filler is ground truth; the 256 candidate queries append everything
/// recovered so far plus a guess, and an exact ciphertext match up through
/// the target block pins the guess. The match must be exact block equality,
/// anything probabilistic here would break the argument. Costs
/// O(suffix_len * 256) oracle calls.
pub fn recover_suffix(oracle: &SuffixOracle) -> Result<Vec<u8>> {
    let block_size = find_block_size(oracle)?;
    let suffix_len = find_suffix_len(oracle)?;
    debug!("block size {}, suffix length {}", block_size, suffix_len);

    let mut recovered: Vec<u8> = Vec::with_capacity(suffix_len);
    for position in 0..suffix_len {
        let filler = vec![0u8; block_size - recovered.len() % block_size - 1];
        let reference = oracle.encrypt(&filler)?;

        let mut matched = None;
        for candidate in 0u8..=255 {
            let mut probe = filler.clone();
            probe.extend_from_slice(&recovered);
            probe.push(candidate);
            let ct = oracle.encrypt(&probe)?;
            if ct[..probe.len()] == reference[..probe.len()] {
                matched = Some(candidate);
                break;
            }
        }

        match matched {
            Some(byte) => recovered.push(byte),
            None => return Err(Error::ByteNotFound(position)),
        }
    }

    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    use base64::prelude::*;

    const SECRET_B64: &str = "Um9sbGluJyBpbiBteSA1LjAKV2l0aCBteSByYWctdG9wIGRvd24gc28gbXkg\
                              aGFpciBjYW4gYmxvdwpUaGUgZ2lybGllcyBvbiBzdGFuZGJ5IHdhdmluZyBq\
                              dXN0IHRvIHNheSBoaQpEaWQgeW91IHN0b3A/IE5vLCBJIGp1c3QgZHJvdmUg\
                              YnkK";

    #[test]
    fn test_mode_oracle_discrimination() {
        let pt = [0u8; 160];
        let trials = 1000;

        let mut flagged = 0;
        for _ in 0..trials {
            let (ct, mode) = encrypt_with_random_mode(&pt).unwrap();
            let is_ecb = aes::detect_ecb(&ct, BLOCK_SIZE);
            assert_eq!(is_ecb, mode == Mode::Ecb);
            if is_ecb {
                flagged += 1;
            }
        }

        let freq = f64::from(flagged) / f64::from(trials);
        assert!((0.4..=0.6).contains(&freq), "unusual freq: {}", freq);
    }

    #[test]
    fn test_suffix_oracle_is_stable() {
        let oracle = SuffixOracle::new(b"fixed secret").unwrap();
        let a = oracle.encrypt(b"probe").unwrap();
        let b = oracle.encrypt(b"probe").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_find_block_size() {
        let secret = BASE64_STANDARD.decode(SECRET_B64).unwrap();
        let oracle = SuffixOracle::with_key(b"YELLOW SUBMARINE", &secret).unwrap();
        assert_eq!(find_block_size(&oracle).unwrap(), 16);
    }

    #[test]
    fn test_find_suffix_len() {
        let secret = BASE64_STANDARD.decode(SECRET_B64).unwrap();
        let oracle = SuffixOracle::with_key(b"YELLOW SUBMARINE", &secret).unwrap();
        assert_eq!(find_suffix_len(&oracle).unwrap(), secret.len());
    }

    #[test]
    fn test_recover_suffix() {
        let secret = BASE64_STANDARD.decode(SECRET_B64).unwrap();
        assert_eq!(secret.len(), 138);

        let oracle = SuffixOracle::with_key(b"YELLOW SUBMARINE", &secret).unwrap();
        assert_eq!(recover_suffix(&oracle).unwrap(), secret);
    }

    #[test]
    fn test_recover_short_suffix() {
        // Shorter than a block, so every filler length gets exercised.
        let oracle = SuffixOracle::with_key(b"0123456789abcdef", b"tiny secret").unwrap();
        assert_eq!(recover_suffix(&oracle).unwrap(), b"tiny secret");
    }
}
