//! Binary module encoding.
//!
//! A short header (magic plus format version) followed by the postcard
//! serialization of the [`Module`].

use thiserror::Error;

use super::Module;

pub const MAGIC: &[u8; 4] = b"DVBC";
pub const VERSION: u16 = 1;
const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, Error)]
pub enum BitcodeError {
    #[error("missing 'DVBC' signature")]
    BadMagic,

    #[error("unsupported format version {0} (expected {VERSION})")]
    UnsupportedVersion(u16),

    #[error("{0}")]
    Postcard(#[from] postcard::Error),
}

/// True if `bytes` start with the binary module signature.
pub fn is_bitcode(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

pub fn write(module: &Module) -> Result<Vec<u8>, BitcodeError> {
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    let out = postcard::to_extend(module, out)?;
    Ok(out)
}

pub fn read(bytes: &[u8]) -> Result<Module, BitcodeError> {
    if !is_bitcode(bytes) {
        return Err(BitcodeError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(BitcodeError::Postcard(postcard::Error::DeserializeUnexpectedEnd));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(BitcodeError::UnsupportedVersion(version));
    }
    let module = postcard::from_bytes(&bytes[HEADER_LEN..])?;
    Ok(module)
}
