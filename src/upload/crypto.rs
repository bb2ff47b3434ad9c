//! AES-CBC file encryption
//!
//! Key size (16, 24 or 32 bytes) selects AES-128/192/256. Output is the IV
//! followed by the PKCS#7-padded ciphertext.

use crate::recorder::channel::{RecordingError, RecordingResult};
use aes::cipher::{
    block_padding::Pkcs7, BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit,
};
use std::path::Path;

const IV_LEN: usize = 16;

#[derive(Clone)]
pub struct CipherKey {
    key: Vec<u8>,
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherKey")
            .field("bits", &(self.key.len() * 8))
            .finish()
    }
}

impl CipherKey {
    pub fn new(key: &[u8], iv: &[u8]) -> RecordingResult<Self> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(RecordingError::ConfigurationError(format!(
                "Encryption key must be 16, 24 or 32 bytes, got {}",
                key.len()
            )));
        }
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| {
            RecordingError::ConfigurationError(format!(
                "Encryption IV must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            ))
        })?;
        Ok(Self {
            key: key.to_vec(),
            iv,
        })
    }

    /// Key and IV taken as the UTF-8 bytes of the configured strings
    pub fn from_config(key: &str, iv: &str) -> RecordingResult<Self> {
        Self::new(key.as_bytes(), iv.as_bytes())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> RecordingResult<Vec<u8>> {
        let ciphertext = match self.key.len() {
            16 => encrypt_with::<aes::Aes128>(&self.key, &self.iv, plaintext),
            24 => encrypt_with::<aes::Aes192>(&self.key, &self.iv, plaintext),
            _ => encrypt_with::<aes::Aes256>(&self.key, &self.iv, plaintext),
        }?;

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Reverse of [`CipherKey::encrypt`]; the IV is read from the input.
    pub fn decrypt(&self, data: &[u8]) -> RecordingResult<Vec<u8>> {
        if data.len() < IV_LEN {
            return Err(RecordingError::EncryptionError(
                "Ciphertext shorter than the IV".to_string(),
            ));
        }
        let (iv, ciphertext) = data.split_at(IV_LEN);
        match self.key.len() {
            16 => decrypt_with::<aes::Aes128>(&self.key, iv, ciphertext),
            24 => decrypt_with::<aes::Aes192>(&self.key, iv, ciphertext),
            _ => decrypt_with::<aes::Aes256>(&self.key, iv, ciphertext),
        }
    }

    pub fn encrypt_file(&self, input: &Path, output: &Path) -> RecordingResult<()> {
        let plaintext = std::fs::read(input)?;
        let encrypted = self.encrypt(&plaintext)?;
        std::fs::write(output, &encrypted)?;
        tracing::info!(
            "Encrypted {} ({} -> {} bytes)",
            input.display(),
            plaintext.len(),
            encrypted.len()
        );
        Ok(())
    }
}

fn encrypt_with<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> RecordingResult<Vec<u8>>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let cipher = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| RecordingError::EncryptionError(e.to_string()))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> RecordingResult<Vec<u8>>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let cipher = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| RecordingError::EncryptionError(e.to_string()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|e| RecordingError::EncryptionError(e.to_string()))
}
