pub mod field_codec;

pub use field_codec::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldCodecError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Value is not valid base64")]
    Encoding,

    #[error("Corrupt padding: wrong key or tampered ciphertext")]
    Padding,

    #[error("Decrypted bytes are not valid UTF-8")]
    Utf8,
}
