use std::collections::HashMap;
use std::path::Path;

use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const HASH_LEN: usize = 32;
const SALT_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("could not read credentials file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid credentials file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserCredentials {
    /// Hex encoded PBKDF2-HMAC-SHA256 output.
    pub password_hash: String,
    /// Used as-is (its UTF-8 bytes) for the derivation.
    pub salt: String,
}

#[derive(Debug, Default, serde::Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    auth: AuthSection,
}

#[derive(Debug, Default, serde::Deserialize)]
struct AuthSection {
    #[serde(default)]
    credentials: HashMap<String, UserCredentials>,
}

/// Usernames mapped to salted password hashes, loaded from a TOML file of the form
///
/// ```toml
/// [auth.credentials.admin]
/// password_hash = "..."
/// salt = "..."
/// ```
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, UserCredentials>,
}

impl CredentialStore {
    pub fn new(users: HashMap<String, UserCredentials>) -> Self {
        Self { users }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CredentialsError> {
        let file: CredentialsFile = toml::from_str(content)?;
        Ok(Self::new(file.auth.credentials))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(credentials) => check_password(password, &credentials.password_hash, &credentials.salt),
            None => false,
        }
    }
}

pub fn hash_password(password: &str, salt: &str) -> [u8; HASH_LEN] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, HASH_LEN>(
        password.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
    )
}

/// Constant-time comparison of the derived key against the stored hex hash.
pub fn check_password(password: &str, stored_hash: &str, salt: &str) -> bool {
    let stored = match hex::decode(stored_hash) {
        Ok(stored) => stored,
        Err(_) => return false,
    };
    let derived = hash_password(password, salt);
    derived[..].ct_eq(stored.as_slice()).into()
}

/// Creates a random hex salt and the matching hash for `password`.
pub fn generate_credentials<R: Rng + ?Sized>(password: &str, rng: &mut R) -> UserCredentials {
    let mut salt_bytes = [0u8; SALT_LEN];
    rng.fill(&mut salt_bytes[..]);
    let salt = hex::encode(salt_bytes);
    let password_hash = hex::encode(hash_password(password, &salt));
    UserCredentials {
        password_hash,
        salt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SALT: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90";
    const HASH: &str = "d12277c1a5a026519bb3e6916c8167352a8069517ae483a82bd52d86cf933c1c";

    fn store() -> CredentialStore {
        CredentialStore::from_toml_str(&format!(
            "[auth.credentials.admin]\npassword_hash = \"{HASH}\"\nsalt = \"{SALT}\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn matches_known_pbkdf2_output() {
        assert_eq!(hex::encode(hash_password("correct horse", SALT)), HASH);
    }

    #[test]
    fn verifies_stored_user() {
        let store = store();
        assert_eq!(store.len(), 1);
        assert!(store.verify("admin", "correct horse"));
        assert!(!store.verify("admin", "wrong horse"));
        assert!(!store.verify("nobody", "correct horse"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        assert!(!check_password("correct horse", "not hex", SALT));
        assert!(!check_password("correct horse", &HASH[..10], SALT));
    }

    #[test]
    fn generated_credentials_verify() {
        let mut rng = StdRng::seed_from_u64(11);
        let credentials = generate_credentials("hunter2", &mut rng);
        assert_eq!(credentials.salt.len(), SALT_LEN * 2);
        assert!(check_password("hunter2", &credentials.password_hash, &credentials.salt));
        assert!(!check_password("hunter3", &credentials.password_hash, &credentials.salt));
    }

    #[test]
    fn empty_file_has_no_users() {
        let store = CredentialStore::from_toml_str("").unwrap();
        assert!(store.is_empty());
        assert!(!store.verify("admin", ""));
    }
}
