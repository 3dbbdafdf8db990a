/// Folio secret sealing
///
/// Credentials the server must be able to replay later (SMTP passwords,
/// Gmail OAuth tokens) are stored sealed with AES-256-GCM under a single
/// server key. The sealed form is base64(nonce || ciphertext).

pub mod keys;
pub mod seal;

pub use seal::Sealer;
