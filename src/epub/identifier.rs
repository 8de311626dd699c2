//! Random identifiers for the default publication identifier.

use rand::RngCore;
use rand::rngs::OsRng;
use uuid::{Builder, Uuid};

use crate::error::{Error, Result};

/// Generate a random (version 4) UUID from the operating system's RNG.
///
/// A failing random source is reported as an I/O error rather than a panic.
pub fn new_uuid() -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::io("reading random bytes for identifier", std::io::Error::other(e)))?;
    Ok(Builder::from_random_bytes(bytes).into_uuid())
}

/// Namespaced form used as a `dc:identifier` value: `urn:uuid:<uuid>`.
pub fn new_urn() -> Result<String> {
    Ok(new_uuid()?.urn().to_string())
}
