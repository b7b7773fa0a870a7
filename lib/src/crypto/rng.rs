use rand_core::{CryptoRng, OsRng, RngCore};

#[inline]
pub fn get_rng() -> impl RngCore + CryptoRng {
    OsRng
}

#[inline]
pub fn random_array<const N: usize>() -> [u8; N] {
    let mut array = [0u8; N];
    get_rng().fill_bytes(&mut array);

    array
}

/// Like [`random_array`], but reports entropy backend failure instead of
/// panicking. Key material generation goes through this.
pub fn try_random_array<const N: usize>() -> Result<[u8; N], rand_core::Error> {
    let mut array = [0u8; N];
    get_rng().try_fill_bytes(&mut array)?;

    Ok(array)
}
