use bourse_types::market::Credential;
use commonware_cryptography::{sha256::Digest, Hasher, Sha256};

fn digest(salt: u64, password: &str) -> Digest {
    let mut message = Vec::with_capacity(8 + password.len());
    message.extend_from_slice(&salt.to_be_bytes());
    message.extend_from_slice(password.as_bytes());
    Sha256::hash(&message)
}

/// Derives a credential for `password` under `salt`.
pub fn credential(salt: u64, password: &str) -> Credential {
    Credential {
        salt,
        digest: digest(salt, password),
    }
}

pub fn verify(credential: &Credential, password: &str) -> bool {
    digest(credential.salt, password) == credential.digest
}
