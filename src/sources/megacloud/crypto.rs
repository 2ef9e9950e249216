use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use md5::{Digest, Md5};

use super::types::FileEntry;
use crate::common::errors::ExtractError;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const BLOCK_SIZE: usize = 16;

/// AES key and IV derived from the carved secret and the payload salt.
pub struct KeyMaterial {
  pub key: [u8; 32],
  pub iv: [u8; 16],
}

/// OpenSSL-legacy EVP_BytesToKey with one MD5 round per iteration:
/// d0 = md5(secret ++ salt), d_n = md5(d_{n-1} ++ secret ++ salt),
/// key = d0 ++ d1, iv = d2.
///
/// The concatenation order must hold byte for byte. CBC carries no
/// integrity check, so a reordered derivation decrypts to garbage instead
/// of failing.
pub fn derive_key_material(secret: &[u8], salt: &[u8]) -> KeyMaterial {
  let mut password = Vec::with_capacity(secret.len() + salt.len());
  password.extend_from_slice(secret);
  password.extend_from_slice(salt);

  let d0 = Md5::digest(&password);
  let d1 = Md5::digest([d0.as_slice(), password.as_slice()].concat());
  let d2 = Md5::digest([d1.as_slice(), password.as_slice()].concat());

  let mut key = [0u8; 32];
  key[..16].copy_from_slice(d0.as_slice());
  key[16..].copy_from_slice(d1.as_slice());

  let mut iv = [0u8; 16];
  iv.copy_from_slice(d2.as_slice());

  KeyMaterial { key, iv }
}

/// Opens the residual ciphertext: base64 to the `Salted__` layout (salt at
/// bytes 8..16, cipher body from 16), AES-256-CBC, PKCS#7 strip, then a
/// JSON array of files.
pub fn decrypt_sources(secret: &str, residual_b64: &str) -> Result<Vec<FileEntry>, ExtractError> {
  let raw = BASE64
    .decode(residual_b64)
    .map_err(|e| ExtractError::Decryption(format!("base64 decode: {e}")))?;

  if raw.len() <= BLOCK_SIZE {
    return Err(ExtractError::Decryption(
      "ciphertext shorter than the salt header".to_string(),
    ));
  }
  let salt = &raw[8..16];
  let body = &raw[16..];
  if body.len() % BLOCK_SIZE != 0 {
    return Err(ExtractError::Decryption(format!(
      "cipher body length {} is not block aligned",
      body.len()
    )));
  }

  let material = derive_key_material(secret.as_bytes(), salt);

  let mut buf = body.to_vec();
  let cipher = Aes256CbcDec::new_from_slices(&material.key, &material.iv)
    .map_err(|e| ExtractError::Decryption(format!("cipher init: {e}")))?;
  cipher
    .decrypt_padded_mut::<NoPadding>(&mut buf)
    .map_err(|e| ExtractError::Decryption(format!("block decrypt: {e}")))?;

  let unpadded = strip_pkcs7(&buf)?;

  let text = std::str::from_utf8(unpadded)
    .map_err(|e| ExtractError::Decryption(format!("plaintext is not utf-8: {e}")))?;
  serde_json::from_str(text)
    .map_err(|e| ExtractError::Decryption(format!("plaintext is not a source list: {e}")))
}

fn strip_pkcs7(plain: &[u8]) -> Result<&[u8], ExtractError> {
  let pad = *plain
    .last()
    .ok_or_else(|| ExtractError::Decryption("empty plaintext".to_string()))? as usize;
  if pad == 0 || pad > BLOCK_SIZE || pad > plain.len() {
    return Err(ExtractError::Decryption(format!("bad padding byte {pad}")));
  }
  Ok(&plain[..plain.len() - pad])
}

#[cfg(test)]
mod tests {
  use super::*;
  use cbc::cipher::BlockEncryptMut;

  type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

  /// Builds a payload the way the upstream does: PKCS#7 pad, AES-256-CBC
  /// under the derived key, `Salted__` header, base64.
  fn encrypt_fixture(secret: &str, salt: [u8; 8], plaintext: &[u8], pad: bool) -> String {
    let material = derive_key_material(secret.as_bytes(), &salt);

    let mut buf = plaintext.to_vec();
    if pad {
      let pad_len = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
      buf.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    }
    let msg_len = buf.len();
    let cipher = Aes256CbcEnc::new_from_slices(&material.key, &material.iv).unwrap();
    cipher
      .encrypt_padded_mut::<NoPadding>(&mut buf, msg_len)
      .unwrap();

    let mut raw = b"Salted__".to_vec();
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&buf);
    BASE64.encode(raw)
  }

  #[test]
  fn round_trip_recovers_the_source_list() {
    let plaintext = br#"[{"file":"https://cdn.example/master.m3u8","type":"hls"}]"#;
    let encoded = encrypt_fixture("carved-secret", [7u8; 8], plaintext, true);

    let files = decrypt_sources("carved-secret", &encoded).unwrap();
    assert_eq!(
      files,
      vec![FileEntry {
        file: "https://cdn.example/master.m3u8".to_string(),
        kind: "hls".to_string(),
      }]
    );
  }

  #[test]
  fn derivation_follows_the_digest_chain() {
    let material = derive_key_material(b"secret", b"12345678");

    let password = b"secret12345678".to_vec();
    let d0 = Md5::digest(&password);
    let d1 = Md5::digest([d0.as_slice(), password.as_slice()].concat());
    let d2 = Md5::digest([d1.as_slice(), password.as_slice()].concat());

    assert_eq!(&material.key[..16], d0.as_slice());
    assert_eq!(&material.key[16..], d1.as_slice());
    assert_eq!(&material.iv[..], d2.as_slice());
  }

  #[test]
  fn wrong_secret_does_not_yield_a_source_list() {
    let plaintext = br#"[{"file":"https://cdn/x.m3u8","type":"hls"}]"#;
    let encoded = encrypt_fixture("the-right-secret", [1u8; 8], plaintext, true);
    assert!(decrypt_sources("the-wrong-secret", &encoded).is_err());
  }

  #[test]
  fn zero_padding_byte_is_rejected() {
    // A block that decrypts to 15 letters and a trailing 0x00.
    let mut plaintext = vec![b'A'; 15];
    plaintext.push(0);
    let encoded = encrypt_fixture("s", [2u8; 8], &plaintext, false);

    match decrypt_sources("s", &encoded) {
      Err(ExtractError::Decryption(msg)) => assert!(msg.contains("padding")),
      other => panic!("expected a padding failure, got {:?}", other),
    }
  }

  #[test]
  fn oversized_padding_byte_is_rejected() {
    let mut plaintext = vec![b'A'; 15];
    plaintext.push(17);
    let encoded = encrypt_fixture("s", [2u8; 8], &plaintext, false);

    assert!(matches!(
      decrypt_sources("s", &encoded),
      Err(ExtractError::Decryption(_))
    ));
  }

  #[test]
  fn truncated_ciphertext_is_rejected() {
    let encoded = BASE64.encode(b"Salted__1234");
    assert!(matches!(
      decrypt_sources("s", &encoded),
      Err(ExtractError::Decryption(_))
    ));
  }

  #[test]
  fn unaligned_cipher_body_is_rejected() {
    let mut raw = b"Salted__".to_vec();
    raw.extend_from_slice(&[3u8; 8]);
    raw.extend_from_slice(&[0u8; 21]);
    let encoded = BASE64.encode(raw);

    assert!(matches!(
      decrypt_sources("s", &encoded),
      Err(ExtractError::Decryption(_))
    ));
  }
}
