use crate::error::{Error, Result};

/// PKCS#7: pads to a whole number of blocks by appending `n` bytes of value
/// `n`, `n` in `[1, block_size]`. An already-aligned message gains a full
/// extra block, so the pad length can always be read back from the last
/// byte.
pub fn pkcs7_pad(input: &[u8], block_size: usize) -> Result<Vec<u8>> {
    if block_size == 0 || block_size > u8::MAX as usize {
        return Err(Error::InvalidBlockSize(block_size));
    }
    let pad_len = block_size - input.len() % block_size;
    let mut out = input.to_vec();
    out.resize(out.len() + pad_len, pad_len as u8);
    Ok(out)
}

/// Strips PKCS#7 padding. Only the final byte is inspected: zero and
/// out-of-range values are rejected, interior pad bytes are not checked.
/// The lax variant is all the mode and oracle code here relies on; callers
/// that need strict validation must check the tail themselves.
pub fn pkcs7_unpad(input: &[u8]) -> Result<Vec<u8>> {
    let pad = match input.last() {
        Some(&b) => b,
        None => return Ok(Vec::new()),
    };
    if pad == 0 || pad as usize > input.len() {
        return Err(Error::MalformedPadding(pad));
    }
    Ok(input[..input.len() - pad as usize].to_vec())
}
