use log::debug;

use crate::error::{Error, Result};

/// XORs two equal-length byte slices.
pub fn fixed_xor(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(Error::UnequalLengths);
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect())
}

/// XORs a byte slice against a single-byte key.
pub fn xor_byte(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|b| b ^ key).collect()
}

/// XORs `data` against `key`, repeating the key as needed.
pub fn repeating_xor(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Counts the bits that differ between two equal-length byte slices.
pub fn hamming(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(Error::UnequalLengths);
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Scores how English-like a byte sequence is: the fraction of bytes that
/// are a space or one of the three most frequent letters. Crude, but over a
/// couple dozen bytes it separates prose from every wrong XOR candidate.
/// Empty input scores 0.
pub fn englishness(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let hits = data
        .iter()
        .filter(|&&b| matches!(b, b' ' | b'e' | b't' | b'a'))
        .count();
    hits as f64 / data.len() as f64
}

/// Shannon entropy of the byte-value distribution, in bits per byte. Empty
/// input scores 0.
pub fn entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let len = data.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Recovers the key of a single-byte-XOR ciphertext by trying all 256
/// candidates and keeping the most English-looking plaintext. Only a
/// strictly better score displaces the running best, so the first candidate
/// to reach it wins ties.
pub fn break_single_byte(ct: &[u8]) -> Result<u8> {
    if ct.is_empty() {
        return Err(Error::EmptyInput);
    }
    let mut best_score = f64::NEG_INFINITY;
    let mut best_key = 0u8;
    for k in 0..=255u8 {
        let score = englishness(&xor_byte(ct, k));
        if score > best_score {
            best_score = score;
            best_key = k;
        }
    }
    Ok(best_key)
}

/// Key recovery composed with key application.
pub fn decrypt_single_byte(ct: &[u8]) -> Result<Vec<u8>> {
    let key = break_single_byte(ct)?;
    Ok(xor_byte(ct, key))
}

/// Picks the candidate most likely to be single-byte-XOR encrypted English.
/// XOR with a constant only relabels byte values, so the true ciphertext
/// keeps the skewed distribution of prose and scores a markedly lower
/// entropy than random data.
pub fn detect_single_byte<C: AsRef<[u8]>>(candidates: &[C]) -> Result<&[u8]> {
    let (first, rest) = candidates.split_first().ok_or(Error::EmptyInput)?;
    let mut best = first.as_ref();
    let mut best_entropy = entropy(best);
    for ct in rest {
        let e = entropy(ct.as_ref());
        if e < best_entropy {
            best = ct.as_ref();
            best_entropy = e;
        }
    }
    Ok(best)
}

/// Estimates the period of a repeating-key XOR ciphertext. For each size in
/// `[min, max]`, the Hamming distance between the first and second runs of
/// four size-`n` blocks is normalized by `n`; when the trial period lines up
/// with the real key, corresponding positions share key material and the
/// bit-difference rate drops. Smallest size wins ties.
pub fn estimate_key_size(ct: &[u8], min: usize, max: usize) -> Result<usize> {
    if min > max || 8 * max > ct.len() {
        return Err(Error::InvalidRange);
    }
    let mut best_size = 0;
    let mut best_score = f64::INFINITY;
    for n in min..=max {
        let dist = hamming(&ct[..4 * n], &ct[4 * n..8 * n])?;
        let score = f64::from(dist) / n as f64;
        if score < best_score {
            best_score = score;
            best_size = n;
        }
    }
    Ok(best_size)
}

/// Recovers the whole key of a repeating-key XOR ciphertext: estimate the
/// period, slice the ciphertext into one column per key position, and break
/// each column as single-byte XOR.
pub fn break_repeating(ct: &[u8]) -> Result<Vec<u8>> {
    let key_size = estimate_key_size(ct, 2, 40)?;
    debug!("estimated key size {}", key_size);

    let mut key = Vec::with_capacity(key_size);
    for i in 0..key_size {
        let column: Vec<u8> = ct.iter().skip(i).step_by(key_size).copied().collect();
        key.push(break_single_byte(&column)?);
    }
    Ok(key)
}
