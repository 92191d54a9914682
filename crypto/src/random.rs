//! OS-backed randomness.

use crate::CryptoError;

/// Fill a fixed-size buffer from the operating system's CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|e| CryptoError::Entropy(e.to_string()))?;
    Ok(buf)
}
