//! Broker credential derivation
//!
//! The LetPot broker accepts a username built from the account email and a
//! password derived from the user id through an MD5 then SHA-256 hash chain.
//! Any deviation is rejected by the broker as an authentication failure.

use crate::models::AccountIdentity;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;

/// Suffix appended to the account email to form the broker username
pub const USERNAME_SUFFIX: &str = "__letpot_v3";

/// Username/password pair for the broker connection
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: String,
}

impl BrokerCredentials {
    /// Derive credentials from the account identity (pure function)
    pub fn derive(account: &AccountIdentity) -> Self {
        let username = format!("{}{}", account.email, USERNAME_SUFFIX);
        let username_digest = hex::encode(Md5::digest(username.as_bytes()));
        let password = hex::encode(Sha256::digest(
            format!("{}|{}", account.user_id, username_digest).as_bytes(),
        ));

        Self { username, password }
    }
}

// Keep the password out of logs
impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
