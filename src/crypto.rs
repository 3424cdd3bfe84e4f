// MIT License - Copyright (c) 2026 Peter Wright
// AES-ECB key establishment and bulk payload cipher

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use crate::constants::AES_BLOCK_SIZE;
use crate::error::{Result, TLinkError};

/// Encryption mode declared by the panel in `OpenSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionType {
    None = 0,
    Type1 = 1,
    Type2 = 2,
}

impl EncryptionType {
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => Self::Type1,
            2 => Self::Type2,
            _ => Self::None,
        }
    }
}

/// Key material for one of the two handshake modes.
enum KeyConfig {
    /// 8-digit access code and 8-digit integration identifier, each
    /// quadrupled into a 32-hex-digit string and parsed to 16 bytes.
    Type1 {
        access_key: [u8; 16],
        identifier_key: [u8; 16],
    },
    /// 32-hex-digit access code parsed to 16 bytes.
    Type2 { access_key: [u8; 16] },
}

/// Per-session payload cipher.
///
/// Each direction is activated exactly once during the handshake; until
/// then, payloads pass through unmodified. Outbound payloads are encrypted
/// with the key derived from the peer's initializer; inbound payloads are
/// decrypted with the key we generated and announced in our own
/// initializer.
pub struct EncryptionHandler {
    config: KeyConfig,
    outbound: Option<Aes128>,
    inbound: Option<Aes128>,
}

impl EncryptionHandler {
    /// Type 1 handler from an 8-digit access code and 8-digit integration
    /// identifier.
    pub fn type1(access_code: &str, integration_id: &str) -> Result<Self> {
        Ok(Self {
            config: KeyConfig::Type1 {
                access_key: quadrupled_key(access_code, "access code")?,
                identifier_key: quadrupled_key(integration_id, "integration identifier")?,
            },
            outbound: None,
            inbound: None,
        })
    }

    /// Type 2 handler from a 32-hex-digit access code.
    pub fn type2(access_code: &str) -> Result<Self> {
        if access_code.len() != 32 {
            return Err(TLinkError::InvalidKeyMaterial {
                details: format!(
                    "Type 2 access code must be 32 hex digits, got {}",
                    access_code.len()
                ),
            });
        }
        Ok(Self {
            config: KeyConfig::Type2 {
                access_key: parse_hex_key(access_code)?,
            },
            outbound: None,
            inbound: None,
        })
    }

    pub fn outbound_active(&self) -> bool {
        self.outbound.is_some()
    }

    pub fn inbound_active(&self) -> bool {
        self.inbound.is_some()
    }

    /// Derive and activate the outbound key from the peer's initializer.
    ///
    /// Type 1: the 48-byte initializer splits into `check[0..16]` and
    /// `cipher[16..48]`. Decrypting `cipher` with the identifier key must
    /// reproduce `check` at the even-indexed plaintext bytes; the
    /// odd-indexed bytes become the outbound key.
    ///
    /// Type 2: the 16-byte initializer is encrypted with the access key
    /// to produce the outbound key directly.
    pub fn configure_outbound(&mut self, initializer: &[u8]) -> Result<()> {
        if self.outbound.is_some() {
            return Err(TLinkError::CryptoAlreadyConfigured);
        }

        let key = match &self.config {
            KeyConfig::Type1 { identifier_key, .. } => {
                if initializer.len() != 48 {
                    return Err(TLinkError::InvalidKeyMaterial {
                        details: format!(
                            "Type 1 initializer must be 48 bytes, got {}",
                            initializer.len()
                        ),
                    });
                }
                let check = &initializer[..16];
                let mut plain = initializer[16..48].to_vec();
                ecb_decrypt_in_place(&Aes128::new(GenericArray::from_slice(identifier_key)), &mut plain);

                let mut key = [0u8; 16];
                for i in 0..16 {
                    if plain[2 * i] != check[i] {
                        return Err(TLinkError::CryptoCheck);
                    }
                    key[i] = plain[2 * i + 1];
                }
                key
            }
            KeyConfig::Type2 { access_key } => {
                if initializer.len() != AES_BLOCK_SIZE {
                    return Err(TLinkError::InvalidKeyMaterial {
                        details: format!(
                            "Type 2 initializer must be 16 bytes, got {}",
                            initializer.len()
                        ),
                    });
                }
                let mut block = [0u8; 16];
                block.copy_from_slice(initializer);
                ecb_encrypt_in_place(&Aes128::new(GenericArray::from_slice(access_key)), &mut block);
                block
            }
        };

        debug!("Outbound encryption activated");
        self.outbound = Some(Aes128::new(GenericArray::from_slice(&key)));
        Ok(())
    }

    /// Generate and activate the inbound key, returning the initializer
    /// to announce to the peer.
    ///
    /// Type 1: sample 32 random bytes; even-indexed bytes are the check
    /// half, odd-indexed bytes become the inbound key. The full 32 bytes
    /// are encrypted with the access-code key and returned as
    /// `check || cipher` (48 bytes).
    ///
    /// Type 2: 16 random bytes; the inbound key is their encryption under
    /// the access key, and the random bytes themselves are returned.
    pub fn configure_inbound(&mut self) -> Result<Vec<u8>> {
        if self.inbound.is_some() {
            return Err(TLinkError::CryptoAlreadyConfigured);
        }

        match &self.config {
            KeyConfig::Type1 { access_key, .. } => {
                let mut rnd = [0u8; 32];
                OsRng.fill_bytes(&mut rnd);

                let mut check = [0u8; 16];
                let mut key = [0u8; 16];
                for i in 0..16 {
                    check[i] = rnd[2 * i];
                    key[i] = rnd[2 * i + 1];
                }

                let mut cipher = rnd.to_vec();
                ecb_encrypt_in_place(&Aes128::new(GenericArray::from_slice(access_key)), &mut cipher);

                self.inbound = Some(Aes128::new(GenericArray::from_slice(&key)));
                debug!("Inbound encryption activated");

                let mut initializer = Vec::with_capacity(48);
                initializer.extend_from_slice(&check);
                initializer.extend_from_slice(&cipher);
                Ok(initializer)
            }
            KeyConfig::Type2 { access_key } => {
                let mut rnd = [0u8; 16];
                OsRng.fill_bytes(&mut rnd);

                let mut key = rnd;
                ecb_encrypt_in_place(&Aes128::new(GenericArray::from_slice(access_key)), &mut key);

                self.inbound = Some(Aes128::new(GenericArray::from_slice(&key)));
                debug!("Inbound encryption activated");
                Ok(rnd.to_vec())
            }
        }
    }

    /// Encrypt an outbound payload, zero-padding to a whole number of
    /// blocks. Pass-through while the outbound key is not yet active.
    pub fn encrypt(&self, payload: &[u8]) -> Vec<u8> {
        let Some(cipher) = &self.outbound else {
            return payload.to_vec();
        };
        let mut data = payload.to_vec();
        let rem = data.len() % AES_BLOCK_SIZE;
        if rem != 0 {
            data.resize(data.len() + AES_BLOCK_SIZE - rem, 0);
        }
        ecb_encrypt_in_place(cipher, &mut data);
        data
    }

    /// Decrypt an inbound payload. Pass-through while the inbound key is
    /// not yet active. Zero padding added by the peer is left in place;
    /// record decoding ignores trailing bytes it does not need.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let Some(cipher) = &self.inbound else {
            return Ok(payload.to_vec());
        };
        if payload.len() % AES_BLOCK_SIZE != 0 {
            return Err(TLinkError::Encoding {
                details: format!(
                    "encrypted payload length {} is not a multiple of the block size",
                    payload.len()
                ),
            });
        }
        let mut data = payload.to_vec();
        ecb_decrypt_in_place(cipher, &mut data);
        Ok(data)
    }
}

fn ecb_encrypt_in_place(cipher: &Aes128, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
}

fn ecb_decrypt_in_place(cipher: &Aes128, data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }
}

/// Quadruple a decimal code string and parse the result as 32 hex digits.
fn quadrupled_key(code: &str, what: &str) -> Result<[u8; 16]> {
    if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TLinkError::InvalidKeyMaterial {
            details: format!("{what} must be exactly 8 decimal digits"),
        });
    }
    parse_hex_key(&code.repeat(4))
}

fn parse_hex_key(hex: &str) -> Result<[u8; 16]> {
    let mut key = [0u8; 16];
    for (i, pair) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(pair).map_err(|_| TLinkError::InvalidKeyMaterial {
            details: "key string is not ASCII".into(),
        })?;
        key[i] = u8::from_str_radix(s, 16).map_err(|_| TLinkError::InvalidKeyMaterial {
            details: format!("invalid hex digits: {s:?}"),
        })?;
    }
    Ok(key)
}
