//! HTTP Basic credential parsing
//!
//! Only the username is used: it labels the uploader. Passwords are not
//! checked here.

use base64::Engine;

/// Extract the username from an `Authorization: Basic ...` header value
///
/// Returns None for other schemes, undecodable credentials, or credentials
/// without the `user:password` separator.
pub fn basic_username(header: &str) -> Option<String> {
    let encoded = header.trim().strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    Some(username.to_string())
}
