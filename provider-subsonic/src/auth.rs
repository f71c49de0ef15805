//! Subsonic token authentication
//!
//! Every request carries `u`, `t`, `s`, `v`, `c` query parameters where
//! `t = md5(password + s)` and `s` is a random salt. The password itself
//! never leaves the process.

use crate::error::{Result, SubsonicError};
use core_runtime::logging::redact_if_sensitive;

/// REST API version advertised to the server
pub const API_VERSION: &str = "1.16.1";

/// Default client identifier
pub const DEFAULT_CLIENT_NAME: &str = "subsonic-offline";

const SALT_LEN: usize = 8;

/// Server address and login
#[derive(Clone)]
pub struct SubsonicCredentials {
    pub base_url: String,
    pub username: String,
    password: String,
    pub client_name: String,
}

/// Username is masked when it is an email address; the password never shows.
impl std::fmt::Debug for SubsonicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsonicCredentials")
            .field("base_url", &self.base_url)
            .field("username", &redact_if_sensitive("username", &self.username))
            .field("password", &redact_if_sensitive("password", &self.password))
            .field("client_name", &self.client_name)
            .finish()
    }
}

impl SubsonicCredentials {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SubsonicError::InvalidConfig(format!(
                "Server URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let username = username.into();
        if username.is_empty() {
            return Err(SubsonicError::InvalidConfig(
                "Username cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            username,
            password: password.into(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
        })
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    /// Query string carrying a freshly salted token
    pub fn auth_query(&self, json: bool) -> Result<String> {
        let salt = generate_salt()?;
        Ok(self.auth_query_with_salt(&salt, json))
    }

    pub(crate) fn auth_query_with_salt(&self, salt: &str, json: bool) -> String {
        let mut query = format!(
            "u={}&t={}&s={}&v={}&c={}",
            urlencoding::encode(&self.username),
            token_for(&self.password, salt),
            salt,
            API_VERSION,
            urlencoding::encode(&self.client_name)
        );
        if json {
            query.push_str("&f=json");
        }
        query
    }
}

/// `md5(password + salt)` as lowercase hex
pub fn token_for(password: &str, salt: &str) -> String {
    format!("{:x}", md5::compute(format!("{}{}", password, salt)))
}

fn generate_salt() -> Result<String> {
    let mut bytes = [0u8; SALT_LEN];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| SubsonicError::InvalidConfig(format!("No randomness for salt: {}", e)))?;

    Ok(bytes
        .iter()
        .map(|b| {
            let idx = *b % 36;
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + (idx - 10)) as char
            }
        })
        .collect())
}
