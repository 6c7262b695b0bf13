//! Keychain storage for connection passwords.
//!
//! Passwords never touch profile files. They live in the system keychain
//! (macOS Keychain, Linux Secret Service, Windows Credential Manager).

use keyring::Entry;
use serde_json::Value;

use crate::error::{Error, ErrorCode, Result};

const SERVICE_NAME: &str = "dropship";
const PASSWORD_KEY: &str = "password";

fn keyring_error(e: keyring::Error) -> Error {
    Error::new(
        ErrorCode::InternalUnexpected,
        format!("Keychain error: {}", e),
        Value::Null,
    )
    .with_hint("Use an identity file instead if no keychain is available")
}

/// Key format: `<profile>:password`
fn entry(profile: &str) -> Result<Entry> {
    Entry::new(SERVICE_NAME, &format!("{}:{}", profile, PASSWORD_KEY)).map_err(keyring_error)
}

pub fn store_password(profile: &str, password: &str) -> Result<()> {
    entry(profile)?.set_password(password).map_err(keyring_error)
}

/// Returns `None` if no password is stored.
pub fn get_password(profile: &str) -> Result<Option<String>> {
    match entry(profile)?.get_password() {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(keyring_error(e)),
    }
}

pub fn delete_password(profile: &str) -> Result<()> {
    match entry(profile)?.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
        Err(e) => Err(keyring_error(e)),
    }
}
