//! Bitcoin-style secp256k1 cryptographic primitives.
//!
//! Every hash, address and signature discipline used by [`crate::tx`],
//! [`crate::block`] and [`crate::chain`] bottoms out in this module, so that
//! the canonicalisation rules documented there have a single place to change
//! if the curve or encoding ever does.
//!
//! # The version-byte deviation
//!
//! [`p2pkh_address`] stamps addresses with [`BITCOIN_WIF_PREFIX`] (`0x80`)
//! rather than the standard mainnet [`BITCOIN_ADDR_PREFIX`] (`0x00`). This is
//! not a mistake in this rewrite — it reproduces a bug in the pedagogical
//! source this crate is derived from, which passed the WIF prefix into the
//! address encoder. Existing wallets only work if every node keeps making the
//! same "mistake", so it must never be "fixed" unilaterally.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ripemd::Ripemd160;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// The secp256k1 group order `n`, big-endian.
pub const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// Version byte Bitcoin mainnet uses for WIF-encoded private keys.
pub const BITCOIN_WIF_PREFIX: u8 = 0x80;

/// Version byte Bitcoin mainnet uses for P2PKH addresses. Not used by
/// [`p2pkh_address`] — see the module docs.
pub const BITCOIN_ADDR_PREFIX: u8 = 0x00;

/// Single SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256 applied twice, Bitcoin-style.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// RIPEMD-160 digest.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// `ripemd160(sha256(x))`, the Bitcoin "hash160" used for P2PKH payloads.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Base58Check-encodes `payload`, appending a 4-byte double-SHA256 checksum.
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut buf = Vec::with_capacity(payload.len() + 4);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum[..4]);
    bs58::encode(buf).into_string()
}

/// Decodes and verifies a Base58Check string, returning the payload with the
/// checksum stripped.
pub fn base58check_decode(encoded: &str) -> Result<Vec<u8>> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| Error::Other("invalid base58"))?;
    if raw.len() < 4 {
        return Err(Error::Other("base58 payload too short"));
    }
    let (payload, checksum) = raw.split_at(raw.len() - 4);
    let expected = double_sha256(payload);
    if checksum != &expected[..4] {
        return Err(Error::Other("base58check checksum mismatch"));
    }
    Ok(payload.to_vec())
}

/// Returns `true` if `bytes`, read as a big-endian integer, is a valid
/// secp256k1 private key: nonzero and strictly less than the curve order.
pub fn is_valid_private_key(bytes: &[u8; 32]) -> bool {
    bytes.iter().any(|&b| b != 0) && bytes.as_slice() < CURVE_ORDER.as_slice()
}

/// Draws 32 cryptographically random bytes, rejecting and redrawing until
/// the result is a valid secp256k1 private key.
pub fn gen_private_key() -> [u8; 32] {
    use rand::RngCore;
    let mut rng = rand::rngs::OsRng;
    loop {
        let mut candidate = [0u8; 32];
        rng.fill_bytes(&mut candidate);
        if is_valid_private_key(&candidate) {
            return candidate;
        }
    }
}

/// Derives the compressed public key corresponding to `secret`.
pub fn derive_public_key(secret: &SecretKey) -> PublicKey {
    let secp = Secp256k1::new();
    PublicKey::from_secret_key(&secp, secret)
}

/// Derives the Bitcoin-style P2PKH address for a compressed public key. See
/// the module docs for why the version byte is [`BITCOIN_WIF_PREFIX`].
pub fn p2pkh_address(public: &PublicKey) -> String {
    let compressed = public.serialize();
    let mut payload = Vec::with_capacity(21);
    payload.push(BITCOIN_WIF_PREFIX);
    payload.extend_from_slice(&hash160(&compressed));
    base58check_encode(&payload)
}

/// Encodes `secret` in Wallet Import Format (compressed-pubkey variant).
pub fn encode_wif(secret: &SecretKey) -> String {
    let mut payload = Vec::with_capacity(34);
    payload.push(BITCOIN_WIF_PREFIX);
    payload.extend_from_slice(secret.as_ref());
    payload.push(0x01); // compressed-pubkey flag
    base58check_encode(&payload)
}

/// Decodes a WIF string produced by [`encode_wif`] back into a private key.
pub fn decode_wif(wif: &str) -> Result<SecretKey> {
    let payload = base58check_decode(wif)?;
    if payload.len() != 34 {
        return Err(Error::Other("unexpected WIF payload length"));
    }
    SecretKey::from_slice(&payload[1..33]).map_err(|_| Error::Other("invalid WIF private key"))
}

/// Signs `message` with a 65-byte recoverable ECDSA signature: the 64-byte
/// compact `(r, s)` form followed by a trailing recovery-id byte. The signed
/// digest is a single SHA-256 of `message`, matching `coincurve`'s default
/// hasher in the pedagogical source this is derived from.
pub fn sign_recoverable(secret: &SecretKey, message: &[u8]) -> [u8; 65] {
    let secp = Secp256k1::new();
    let digest = sha256(message);
    let msg = Message::from_digest(digest);
    let sig = secp.sign_ecdsa_recoverable(&msg, secret);
    let (recovery_id, compact) = sig.serialize_compact();
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    out
}

/// Recovers the public key that produced `signature` over `message`.
pub fn recover_public_key(message: &[u8], signature: &[u8]) -> Result<PublicKey> {
    if signature.len() != 65 {
        return Err(Error::InvalidSignature);
    }
    let recovery_id =
        RecoveryId::from_i32(signature[64] as i32).map_err(|_| Error::InvalidSignature)?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|_| Error::InvalidSignature)?;
    let secp = Secp256k1::new();
    let digest = sha256(message);
    let msg = Message::from_digest(digest);
    secp.recover_ecdsa(&msg, &recoverable)
        .map_err(|_| Error::InvalidSignature)
}

/// Recovers the signer's public key from `signature` over `message`, derives
/// its P2PKH address, and checks it equals `address`.
pub fn verify_signature(signature: &[u8], message: &[u8], address: &str) -> bool {
    match recover_public_key(message, signature) {
        Ok(public) => p2pkh_address(&public) == address,
        Err(_) => false,
    }
}

/// Anything that can produce a recoverable signature and quote its own
/// P2PKH address. Implemented by `pebblechain_wallet::Account`; kept as a
/// trait here so this crate need not depend on the wallet crate.
pub trait Signer {
    fn sign(&self, message: &[u8]) -> [u8; 65];
    fn address(&self) -> String;
}

/// Base64-encodes raw signature bytes for embedding in a JSON field.
pub fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decodes a base64 signature field back to raw bytes.
pub fn base64_decode(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|_| Error::Other("invalid base64 signature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_produces_valid_key() {
        let key = gen_private_key();
        assert!(is_valid_private_key(&key));
        assert!(SecretKey::from_slice(&key).is_ok());
    }

    #[test]
    fn zero_key_is_invalid() {
        assert!(!is_valid_private_key(&[0u8; 32]));
    }

    #[test]
    fn curve_order_itself_is_invalid() {
        assert!(!is_valid_private_key(&CURVE_ORDER));
    }

    #[test]
    fn wif_round_trip() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let wif = encode_wif(&secret);
        let decoded = decode_wif(&wif).unwrap();
        assert_eq!(decoded.secret_bytes(), secret.secret_bytes());
    }

    #[test]
    fn sign_and_recover_round_trip() {
        let bytes = gen_private_key();
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let public = derive_public_key(&secret);
        let address = p2pkh_address(&public);

        let message = b"hello pebblechain";
        let sig = sign_recoverable(&secret, message);
        assert!(verify_signature(&sig, message, &address));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let bytes = gen_private_key();
        let secret = SecretKey::from_slice(&bytes).unwrap();
        let public = derive_public_key(&secret);
        let address = p2pkh_address(&public);

        let sig = sign_recoverable(&secret, b"original message");
        assert!(!verify_signature(&sig, b"tampered message", &address));
    }

    #[test]
    fn base58check_rejects_corrupted_checksum() {
        let mut encoded = base58check_encode(b"payload").into_bytes();
        encoded[0] ^= 0xFF;
        let encoded = String::from_utf8(encoded).unwrap();
        assert!(base58check_decode(&encoded).is_err());
    }
}
