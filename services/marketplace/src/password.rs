//! Salted password hashing
//!
//! Stored format: `sha512$<hex salt>$<hex digest>` where the digest is
//! SHA-512 over `salt || password`.

use rand::RngCore;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

const SCHEME: &str = "sha512";
const SALT_LEN: usize = 16;

/// Well-formed hash no password matches. Verifying against it on the
/// unknown-account path keeps login timing independent of the email.
pub const DUMMY_HASH: &str = concat!(
    "sha512$",
    "00000000000000000000000000000000",
    "$",
    "0000000000000000000000000000000000000000000000000000000000000000",
    "0000000000000000000000000000000000000000000000000000000000000000"
);

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!(
        "{}${}${}",
        SCHEME,
        hex::encode(salt),
        hex::encode(digest(&salt, password))
    )
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };
    digest(&salt, password).ct_eq(&expected).into()
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
