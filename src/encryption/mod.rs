//! The PDF Standard Security Handler (ISO 32000-1 §7.6, with the
//! AES-256/R6 extensions from ISO 32000-2 §7.6.4).
//!
//! Supports revisions R2-R4 (RC4-40/128, AES-128) and R5/R6
//! (AES-256), authenticating against either the user or owner
//! password and deriving the file encryption key. Object-level
//! encryption then mixes in the object number and generation
//! (Algorithm 1) except for AESV3, which per spec uses the file key
//! directly for every object.

mod pkcs5;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use bitflags::bitflags;
use md5::{Digest, Md5};
use rand::RngCore;
use sha2::{Sha256, Sha384, Sha512};

use crate::dictionary::Dictionary;
use crate::error::CryptoError;
use crate::object::Object;
use crate::{Document, ObjectId};

use pkcs5::Pkcs5;

const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08, 0x2E, 0x2E, 0x00,
    0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

bitflags! {
    /// The `/P` permission bits (ISO 32000-1 Table 22). Bits not
    /// listed here are reserved and must be 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        const PRINT                  = 1 << 2;
        const MODIFY                 = 1 << 3;
        const COPY                   = 1 << 4;
        const ANNOTATE               = 1 << 5;
        const FILL_FORMS             = 1 << 8;
        const EXTRACT_FOR_ACCESSIBILITY = 1 << 9;
        const ASSEMBLE                = 1 << 10;
        const PRINT_HIGH_QUALITY      = 1 << 11;
    }
}

impl Permissions {
    /// The reserved-bits-set, all-allowed value commonly stored when a
    /// document has no real restrictions.
    pub fn unrestricted() -> Self {
        Permissions::from_bits_truncate(0xFFFF_FFFC)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Rc4,
    Aes128,
    Aes256,
}

/// The outcome of successfully authenticating against an `/Encrypt`
/// dictionary: the derived file encryption key and enough context to
/// decrypt (or, when saving, re-encrypt) individual objects.
#[derive(Debug, Clone)]
pub struct EncryptionState {
    pub key: Vec<u8>,
    pub method: CryptMethod,
    pub permissions: Permissions,
}

impl EncryptionState {
    /// Authenticate `password` against the document's `/Encrypt`
    /// dictionary and derive the file encryption key.
    pub fn decode(document: &Document, password: &str) -> crate::Result<Self> {
        let encrypt_ref = document.trailer.get(b"Encrypt")?.as_reference()?;
        let encrypt_dict = document.get_object(encrypt_ref)?.as_dict()?.clone();

        let filter = encrypt_dict.get(b"Filter").and_then(Object::as_name).unwrap_or(b"Standard");
        if filter != b"Standard" {
            return Err(crate::Error::Unimplemented("only the Standard security handler is supported"));
        }

        let v = encrypt_dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        let r = encrypt_dict.get(b"R")?.as_i64()? as u8;
        if !(2..=6).contains(&r) {
            return Err(CryptoError::UnsupportedRevision(r).into());
        }
        let p = encrypt_dict.get(b"P")?.as_i64()? as i32;
        let permissions = Permissions::from_bits_truncate(p as u32);

        let file_id = document
            .trailer
            .get(b"ID")
            .ok()
            .and_then(|o| o.as_array().ok())
            .and_then(|a| a.first())
            .and_then(|o| o.as_str().ok())
            .map(|s| s.to_vec())
            .unwrap_or_default();

        if r <= 4 {
            let o = encrypt_dict.get(b"O")?.as_str()?.to_vec();
            let u = encrypt_dict.get(b"U")?.as_str()?.to_vec();
            let length_bits = encrypt_dict.get(b"Length").and_then(Object::as_i64).unwrap_or(40);
            let key_length = ((length_bits / 8) as usize).clamp(5, 16);
            let encrypt_metadata = encrypt_dict.get(b"EncryptMetadata").and_then(Object::as_bool).unwrap_or(true);

            let key = authenticate_legacy(password.as_bytes(), &o, &u, p, &file_id, r, key_length, encrypt_metadata)
                .ok_or(CryptoError::WrongPassword)?;
            let method = determine_method(&encrypt_dict, v)?;
            Ok(EncryptionState { key, method, permissions })
        } else {
            let o = encrypt_dict.get(b"O")?.as_str()?.to_vec();
            let u = encrypt_dict.get(b"U")?.as_str()?.to_vec();
            let oe = encrypt_dict.get(b"OE").and_then(Object::as_str).unwrap_or(&[]).to_vec();
            let ue = encrypt_dict.get(b"UE")?.as_str()?.to_vec();
            let encrypt_metadata = encrypt_dict.get(b"EncryptMetadata").and_then(Object::as_bool).unwrap_or(true);
            let normalized = normalize_r6_password(password);

            let key = authenticate_r6(&normalized, &o, &u, &oe, &ue, r).ok_or(CryptoError::WrongPassword)?;
            if let Ok(perms) = encrypt_dict.get(b"Perms").and_then(Object::as_str) {
                verify_perms_block(perms, &key, p, encrypt_metadata)?;
            }
            Ok(EncryptionState { key, method: CryptMethod::Aes256, permissions })
        }
    }
}

fn determine_method(encrypt_dict: &Dictionary, v: i64) -> crate::Result<CryptMethod> {
    if v <= 2 {
        return Ok(CryptMethod::Rc4);
    }
    if v == 5 {
        return Ok(CryptMethod::Aes256);
    }
    let stmf = encrypt_dict.get(b"StmF").and_then(Object::as_name).unwrap_or(b"Identity");
    if stmf == b"Identity" {
        return Ok(CryptMethod::Rc4);
    }
    let cfm = encrypt_dict
        .get(b"CF")
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(stmf))
        .and_then(Object::as_dict)
        .and_then(|cf| cf.get(b"CFM"))
        .and_then(Object::as_name)
        .unwrap_or(b"V2");
    Ok(match cfm {
        b"AESV2" => CryptMethod::Aes128,
        b"AESV3" => CryptMethod::Aes256,
        _ => CryptMethod::Rc4,
    })
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PADDING[..32 - n]);
    out
}

/// Algorithm 2: derive the file encryption key from a candidate
/// password and the dictionary's `/O` value.
fn compute_encryption_key(
    password: &[u8], owner_key: &[u8], permissions: i32, file_id: &[u8], revision: u8, key_length: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let padded = pad_password(password);
    let mut hasher = Md5::new();
    hasher.update(padded);
    hasher.update(owner_key);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }
    hash.truncate(key_length);
    hash
}

/// Algorithm 3: the `/O` entry, computed the way a writer would
/// (forward direction of the owner-password recovery path
/// `authenticate_legacy` already walks backward).
fn compute_owner_key(owner_password: &[u8], user_password: &[u8], revision: u8, key_length: usize) -> Vec<u8> {
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }
    hash.truncate(key_length);
    let mut o = rc4(&hash, &pad_password(user_password));
    if revision >= 3 {
        for i in 1..=19u8 {
            let round_key: Vec<u8> = hash.iter().map(|&b| b ^ i).collect();
            o = rc4(&round_key, &o);
        }
    }
    o
}

/// Algorithm 4/5: the `/U` value a correctly-keyed reader would store.
fn compute_user_key(key: &[u8], file_id: &[u8], revision: u8) -> Vec<u8> {
    if revision <= 2 {
        return rc4(key, &PADDING);
    }
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();
    for i in 0..20u8 {
        let round_key: Vec<u8> = key.iter().map(|&b| b ^ i).collect();
        hash = rc4(&round_key, &hash);
    }
    hash.resize(32, 0);
    hash
}

fn authenticate_legacy(
    password: &[u8], owner_key: &[u8], user_key: &[u8], permissions: i32, file_id: &[u8], revision: u8,
    key_length: usize, encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    // Try the password as the user password first.
    let key = compute_encryption_key(password, owner_key, permissions, file_id, revision, key_length, encrypt_metadata);
    let expected = compute_user_key(&key, file_id, revision);
    let compare_len = if revision <= 2 { 32 } else { 16 };
    if constant_time_eq(&user_key[..compare_len.min(user_key.len())], &expected[..compare_len.min(expected.len())]) {
        return Some(key);
    }

    // Fall back to treating it as the owner password (Algorithm 7): recover
    // the user password by reversing Algorithm 3, then authenticate that.
    let owner_padded = pad_password(password);
    let mut hash = Md5::digest(owner_padded).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }
    hash.truncate(key_length);

    let recovered_user_password = if revision <= 2 {
        rc4(&hash, owner_key)
    } else {
        let mut buf = owner_key.to_vec();
        for i in (0..20u8).rev() {
            let round_key: Vec<u8> = hash.iter().map(|&b| b ^ i).collect();
            buf = rc4(&round_key, &buf);
        }
        buf
    };

    let key = compute_encryption_key(&recovered_user_password, owner_key, permissions, file_id, revision, key_length, encrypt_metadata);
    let expected = compute_user_key(&key, file_id, revision);
    if constant_time_eq(&user_key[..compare_len.min(user_key.len())], &expected[..compare_len.min(expected.len())]) {
        Some(key)
    } else {
        None
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (&x, &y)| acc | (x ^ y)) == 0
}

fn normalize_r6_password(password: &str) -> Vec<u8> {
    let normalized = stringprep::saslprep(password).map(|c| c.into_owned()).unwrap_or_else(|_| password.to_string());
    let mut bytes = normalized.into_bytes();
    bytes.truncate(127);
    bytes
}

/// Algorithm 2.A/2.B: the iterated hash used by R6 (and, without the
/// iteration, the single round used by the deprecated R5 extension).
fn hash_revision(password: &[u8], salt: &[u8], udata: &[u8], revision: u8) -> [u8; 32] {
    let mut k = {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(udata);
        hasher.finalize().to_vec()
    };

    if revision < 6 {
        let mut out = [0u8; 32];
        out.copy_from_slice(&k);
        return out;
    }

    let mut round = 0u32;
    loop {
        let mut k1 = Vec::with_capacity(64 * (password.len() + k.len() + udata.len()));
        for _ in 0..64 {
            k1.extend_from_slice(password);
            k1.extend_from_slice(&k);
            k1.extend_from_slice(udata);
        }
        let e = aes128_cbc_encrypt_nopad(&k[0..16], &k[16..32], &k1);
        let modulus = e[..16].iter().fold(0u32, |acc, &b| acc + b as u32) % 3;
        k = match modulus {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        round += 1;
        if round >= 64 && (*e.last().unwrap_or(&0) as u32) <= round - 32 {
            break;
        }
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&k[..32]);
    out
}

fn authenticate_r6(password: &[u8], o: &[u8], u: &[u8], oe: &[u8], ue: &[u8], revision: u8) -> Option<Vec<u8>> {
    if u.len() < 48 {
        return None;
    }
    let (u_hash, u_validation_salt, u_key_salt) = (&u[0..32], &u[32..40], &u[40..48]);

    if hash_revision(password, u_validation_salt, &[], revision) == *u_hash {
        let intermediate = hash_revision(password, u_key_salt, &[], revision);
        return Some(aes256_cbc_decrypt_nopad(&intermediate, &[0u8; 16], ue));
    }

    if o.len() >= 48 {
        let (o_hash, o_validation_salt, o_key_salt) = (&o[0..32], &o[32..40], &o[40..48]);
        if hash_revision(password, o_validation_salt, u, revision) == *o_hash {
            let intermediate = hash_revision(password, o_key_salt, u, revision);
            return Some(aes256_cbc_decrypt_nopad(&intermediate, &[0u8; 16], oe));
        }
    }
    None
}

fn aes128_cbc_encrypt_nopad(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<aes::Aes128>::new_from_slices(key, iv)
        .expect("16-byte key and IV")
        .encrypt_padded_vec_mut::<NoPadding>(data)
}

fn aes256_cbc_decrypt_nopad(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
        .expect("32-byte key and 16-byte IV")
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .unwrap_or_default()
}

fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = core::array::from_fn(|i| i as u8);
    let mut j: u8 = 0;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            let k = s[(s[i as usize].wrapping_add(s[j as usize])) as usize];
            byte ^ k
        })
        .collect()
}

/// Algorithm 1: derive the per-object key from the file key. AESV3
/// (R5/R6) is the one case where the file key is used directly.
fn object_key(state: &EncryptionState, id: ObjectId) -> Vec<u8> {
    if state.method == CryptMethod::Aes256 {
        return state.key.clone();
    }
    let mut hasher = Md5::new();
    hasher.update(&state.key);
    hasher.update(&id.0.to_le_bytes()[..3]);
    hasher.update(&id.1.to_le_bytes()[..2]);
    if state.method == CryptMethod::Aes128 {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    let key_len = (state.key.len() + 5).min(16);
    hash[..key_len].to_vec()
}

fn crypt_bytes(state: &EncryptionState, key: &[u8], data: &[u8], encrypt: bool) -> std::result::Result<Vec<u8>, CryptoError> {
    match state.method {
        CryptMethod::Rc4 => Ok(rc4(key, data)),
        CryptMethod::Aes128 | CryptMethod::Aes256 => {
            if encrypt {
                let mut iv = [0u8; 16];
                getrandom::fill(&mut iv).map_err(|_| CryptoError::WrongPassword)?;
                let cipher_key = key;
                let ciphertext = if state.method == CryptMethod::Aes128 {
                    cbc::Encryptor::<aes::Aes128>::new_from_slices(cipher_key, &iv)
                        .map_err(|_| CryptoError::WrongPassword)?
                        .encrypt_padded_vec_mut::<Pkcs5>(data)
                } else {
                    cbc::Encryptor::<aes::Aes256>::new_from_slices(cipher_key, &iv)
                        .map_err(|_| CryptoError::WrongPassword)?
                        .encrypt_padded_vec_mut::<Pkcs5>(data)
                };
                let mut out = iv.to_vec();
                out.extend(ciphertext);
                Ok(out)
            } else {
                if data.len() < 16 {
                    return Ok(Vec::new());
                }
                let (iv, ciphertext) = data.split_at(16);
                if state.method == CryptMethod::Aes128 {
                    cbc::Decryptor::<aes::Aes128>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::WrongPassword)?
                        .decrypt_padded_vec_mut::<Pkcs5>(ciphertext)
                        .map_err(|_| CryptoError::WrongPassword)
                } else {
                    cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::WrongPassword)?
                        .decrypt_padded_vec_mut::<Pkcs5>(ciphertext)
                        .map_err(|_| CryptoError::WrongPassword)
                }
            }
        }
    }
}

fn walk_mut<F>(obj: &mut Object, f: &mut F) -> std::result::Result<(), CryptoError>
where
    F: FnMut(&mut Vec<u8>) -> std::result::Result<(), CryptoError>,
{
    match obj {
        Object::String(s, _) => f(s),
        Object::Array(items) => {
            for item in items {
                walk_mut(item, f)?;
            }
            Ok(())
        }
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter_mut() {
                walk_mut(v, f)?;
            }
            Ok(())
        }
        Object::Stream(stream) => {
            for (_, v) in stream.dict.iter_mut() {
                walk_mut(v, f)?;
            }
            f(&mut stream.content)
        }
        _ => Ok(()),
    }
}

/// Decrypt every string and the stream body (if any) reachable from
/// `obj`, in place.
pub fn decrypt_object(state: &EncryptionState, id: ObjectId, obj: &mut Object) -> std::result::Result<(), CryptoError> {
    let key = object_key(state, id);
    walk_mut(obj, &mut |bytes| {
        *bytes = crypt_bytes(state, &key, bytes, false)?;
        Ok(())
    })
}

/// Encrypt every string and the stream body (if any) reachable from
/// `obj`, in place. Used by the writer when `SaveOptions` targets
/// encryption.
pub fn encrypt_object(state: &EncryptionState, id: ObjectId, obj: &mut Object) -> std::result::Result<(), CryptoError> {
    let key = object_key(state, id);
    walk_mut(obj, &mut |bytes| {
        *bytes = crypt_bytes(state, &key, bytes, true)?;
        Ok(())
    })
}

/// Algorithm 8/9 (ISO 32000-2 §7.6.4.4.7): the 16-byte `/Perms` block
/// that redundantly binds the `/P` permission bits to the file key, so
/// a reader with only the user password can still detect tampering
/// with `/P` without needing to authenticate as owner.
fn build_perms_block(permissions: i32, encrypt_metadata: bool, file_key: &[u8]) -> Vec<u8> {
    let mut block = [0u8; 16];
    block[0..4].copy_from_slice(&permissions.to_le_bytes());
    block[4..8].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    block[8] = if encrypt_metadata { b'T' } else { b'F' };
    block[9..12].copy_from_slice(b"adb");
    let mut tail = [0u8; 4];
    rand::rng().fill_bytes(&mut tail);
    block[12..16].copy_from_slice(&tail);

    ecb::Encryptor::<aes::Aes256>::new_from_slice(&file_key[..32])
        .expect("32-byte AES-256 key")
        .encrypt_padded_vec_mut::<NoPadding>(&block)
}

/// The inverse of [`build_perms_block`], used to catch a `/P` value
/// that was edited without access to the file key.
fn verify_perms_block(perms: &[u8], file_key: &[u8], permissions: i32, encrypt_metadata: bool) -> std::result::Result<(), CryptoError> {
    if perms.len() < 16 || file_key.len() < 32 {
        return Err(CryptoError::PermissionBlockMismatch);
    }
    let decrypted = ecb::Decryptor::<aes::Aes256>::new_from_slice(&file_key[..32])
        .map_err(|_| CryptoError::PermissionBlockMismatch)?
        .decrypt_padded_vec_mut::<NoPadding>(&perms[..16])
        .map_err(|_| CryptoError::IntegrityCheckFailed)?;

    if decrypted.get(9..12) != Some(&b"adb"[..]) {
        return Err(CryptoError::IntegrityCheckFailed);
    }
    let stored_p = i32::from_le_bytes(decrypted[0..4].try_into().expect("four bytes"));
    if stored_p != permissions {
        return Err(CryptoError::PermissionBlockMismatch);
    }
    let stored_metadata_flag = decrypted[8] == b'T';
    if stored_metadata_flag != encrypt_metadata {
        return Err(CryptoError::PermissionBlockMismatch);
    }
    Ok(())
}

/// Bit positions 1 and 2 (1-indexed) must be 0; bit positions 7, 8 and
/// 13-32 are reserved and must be 1 (ISO 32000-1 Table 22).
fn permission_bits(permissions: Permissions) -> i32 {
    (permissions.bits() | 0xFFFF_F0C0) as i32
}

/// Parameters for turning a plaintext document into an encrypted one,
/// the write-side counterpart to [`EncryptionState::decode`].
#[derive(Debug, Clone)]
pub struct EncryptSetup {
    pub user_password: String,
    pub owner_password: String,
    pub permissions: Permissions,
    pub method: CryptMethod,
    pub encrypt_metadata: bool,
}

impl Default for EncryptSetup {
    fn default() -> Self {
        EncryptSetup {
            user_password: String::new(),
            owner_password: String::new(),
            permissions: Permissions::unrestricted(),
            method: CryptMethod::Aes256,
            encrypt_metadata: true,
        }
    }
}

impl EncryptionState {
    /// Build a fresh `EncryptionState` and the `/Encrypt` dictionary
    /// entries it corresponds to, for `setup.method`. `file_id` is the
    /// first element of the document's `/ID` array.
    pub fn new_for_encryption(setup: &EncryptSetup, file_id: &[u8]) -> (Self, Dictionary) {
        match setup.method {
            CryptMethod::Rc4 | CryptMethod::Aes128 => Self::new_legacy(setup, file_id),
            CryptMethod::Aes256 => Self::new_r6(setup),
        }
    }

    fn new_legacy(setup: &EncryptSetup, file_id: &[u8]) -> (Self, Dictionary) {
        let (v, r, key_length) = match setup.method {
            CryptMethod::Rc4 => (2, 3, 16),
            _ => (4, 4, 16),
        };
        let p = permission_bits(setup.permissions);
        let owner_password = if setup.owner_password.is_empty() { &setup.user_password } else { &setup.owner_password };

        let o = compute_owner_key(owner_password.as_bytes(), setup.user_password.as_bytes(), r, key_length);
        let key = compute_encryption_key(setup.user_password.as_bytes(), &o, p, file_id, r, key_length, setup.encrypt_metadata);
        let u = compute_user_key(&key, file_id, r);

        let mut dict = Dictionary::new();
        dict.set("Filter", "Standard");
        dict.set("V", v);
        dict.set("R", r as i64);
        dict.set("Length", (key_length * 8) as i64);
        dict.set("P", p as i64);
        dict.set("O", Object::String(o, crate::object::StringFormat::Literal));
        dict.set("U", Object::String(u, crate::object::StringFormat::Literal));
        if !setup.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }
        if setup.method == CryptMethod::Aes128 {
            let mut cf = Dictionary::new();
            let mut std_cf = Dictionary::new();
            std_cf.set("CFM", "AESV2");
            std_cf.set("Length", 16);
            cf.set("StdCF", std_cf);
            dict.set("CF", cf);
            dict.set("StmF", "StdCF");
            dict.set("StrF", "StdCF");
        }

        let method = setup.method;
        let permissions = Permissions::from_bits_truncate(p as u32);
        (EncryptionState { key, method, permissions }, dict)
    }

    fn new_r6(setup: &EncryptSetup) -> (Self, Dictionary) {
        let p = permission_bits(setup.permissions);
        let mut file_key = [0u8; 32];
        rand::rng().fill_bytes(&mut file_key);

        let user_password = normalize_r6_password(&setup.user_password);
        let owner_password_source = if setup.owner_password.is_empty() { &setup.user_password } else { &setup.owner_password };
        let owner_password = normalize_r6_password(owner_password_source);

        let mut user_validation_salt = [0u8; 8];
        let mut user_key_salt = [0u8; 8];
        rand::rng().fill_bytes(&mut user_validation_salt);
        rand::rng().fill_bytes(&mut user_key_salt);

        let u_hash = hash_revision(&user_password, &user_validation_salt, &[], 6);
        let mut u = u_hash.to_vec();
        u.extend_from_slice(&user_validation_salt);
        u.extend_from_slice(&user_key_salt);

        let user_intermediate = hash_revision(&user_password, &user_key_salt, &[], 6);
        let ue = cbc::Encryptor::<aes::Aes256>::new_from_slices(&user_intermediate, &[0u8; 16])
            .expect("32-byte key and 16-byte IV")
            .encrypt_padded_vec_mut::<NoPadding>(&file_key);

        let mut owner_validation_salt = [0u8; 8];
        let mut owner_key_salt = [0u8; 8];
        rand::rng().fill_bytes(&mut owner_validation_salt);
        rand::rng().fill_bytes(&mut owner_key_salt);

        let o_hash = hash_revision(&owner_password, &owner_validation_salt, &u, 6);
        let mut o = o_hash.to_vec();
        o.extend_from_slice(&owner_validation_salt);
        o.extend_from_slice(&owner_key_salt);

        let owner_intermediate = hash_revision(&owner_password, &owner_key_salt, &u, 6);
        let oe = cbc::Encryptor::<aes::Aes256>::new_from_slices(&owner_intermediate, &[0u8; 16])
            .expect("32-byte key and 16-byte IV")
            .encrypt_padded_vec_mut::<NoPadding>(&file_key);

        let perms = build_perms_block(p, setup.encrypt_metadata, &file_key);

        let mut dict = Dictionary::new();
        dict.set("Filter", "Standard");
        dict.set("V", 5);
        dict.set("R", 6);
        dict.set("Length", 256);
        dict.set("P", p as i64);
        dict.set("U", Object::String(u, crate::object::StringFormat::Literal));
        dict.set("UE", Object::String(ue, crate::object::StringFormat::Literal));
        dict.set("O", Object::String(o, crate::object::StringFormat::Literal));
        dict.set("OE", Object::String(oe, crate::object::StringFormat::Literal));
        dict.set("Perms", Object::String(perms, crate::object::StringFormat::Literal));
        if !setup.encrypt_metadata {
            dict.set("EncryptMetadata", false);
        }
        let mut cf = Dictionary::new();
        let mut std_cf = Dictionary::new();
        std_cf.set("CFM", "AESV3");
        std_cf.set("Length", 32);
        cf.set("StdCF", std_cf);
        dict.set("CF", cf);
        dict.set("StmF", "StdCF");
        dict.set("StrF", "StdCF");

        let permissions = Permissions::from_bits_truncate(p as u32);
        (EncryptionState { key: file_key.to_vec(), method: CryptMethod::Aes256, permissions }, dict)
    }
}
