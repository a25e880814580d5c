//! Pebblechain Wallet
//!
//! An [`Account`] wraps a single secp256k1 private key and is the only
//! `pebblechain_core::Signer` implementation in this workspace: it produces
//! recoverable signatures and quotes its own P2PKH address, and persists
//! itself to disk as the `{"private_key": "<hex>"}` file the rest of this
//! workspace's tooling expects.

use std::fs;
use std::path::Path;

use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

use pebblechain_core::crypto;
use pebblechain_core::{Error, Result, Signer};

/// The on-disk shape of a wallet file.
#[derive(Serialize, Deserialize)]
struct WalletFile {
    private_key: String,
}

/// A single secp256k1 keypair, and the P2PKH address derived from it.
#[derive(Debug, Clone)]
pub struct Account {
    secret: SecretKey,
    public: PublicKey,
}

impl Account {
    /// Generates a fresh, cryptographically random account.
    pub fn generate() -> Self {
        let bytes = crypto::gen_private_key();
        Self::from_bytes(&bytes).expect("freshly generated key is always valid")
    }

    /// Builds an account from a raw 32-byte private key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| Error::Other("invalid private key"))?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    /// Builds an account from a hex-encoded private key.
    pub fn from_hex(hexa: &str) -> Result<Self> {
        let bytes = hex::decode(hexa).map_err(|_| Error::Other("invalid hex private key"))?;
        Self::from_bytes(&bytes)
    }

    /// Builds an account from a Wallet Import Format string.
    pub fn from_wif(wif: &str) -> Result<Self> {
        let secret = crypto::decode_wif(wif)?;
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Ok(Self { secret, public })
    }

    /// Loads the account from a wallet file written by [`Account::to_file`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let wallet: WalletFile = serde_json::from_str(&contents)?;
        Self::from_hex(&wallet.private_key)
    }

    /// Writes `{"private_key": "<hex>"}` to `path`, creating or truncating it.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let wallet = WalletFile {
            private_key: self.private_key_hex(),
        };
        let contents = serde_json::to_string(&wallet)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// The raw private key as lowercase hex.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    /// This account's private key in Wallet Import Format.
    pub fn to_wif(&self) -> String {
        crypto::encode_wif(&self.secret)
    }

    /// This account's P2PKH address.
    pub fn address(&self) -> String {
        crypto::p2pkh_address(&self.public)
    }

    /// Signs `message`, returning a 65-byte recoverable signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 65] {
        crypto::sign_recoverable(&self.secret, message)
    }
}

impl Signer for Account {
    fn sign(&self, message: &[u8]) -> [u8; 65] {
        Account::sign(self, message)
    }

    fn address(&self) -> String {
        Account::address(self)
    }
}
