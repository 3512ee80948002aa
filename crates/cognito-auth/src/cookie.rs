//! Cookie lookup.
//!
//! Cognito's browser client stores tokens in cookies named after the app
//! client id and the signed-in user:
//!
//! ```text
//! CognitoIdentityServiceProvider.<clientId>.LastAuthUser
//! CognitoIdentityServiceProvider.<clientId>.<user>.idToken
//! CognitoIdentityServiceProvider.<clientId>.<user>.accessToken
//! ```
//!
//! `<user>` is escaped by the cookie library before it becomes part of the
//! name, so lookups must reproduce that escaping exactly or the user silently
//! appears signed out.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Prefix the identity provider client puts on all of its cookies.
pub const COOKIE_PREFIX: &str = "CognitoIdentityServiceProvider";

/// Cookie values relevant to one app client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CognitoCookies {
    /// Username of the last signed-in user.
    pub last_user: Option<String>,
    /// Raw identity token.
    pub id_token: Option<String>,
    /// Raw access token.
    pub access_token: Option<String>,
}

/// Name of the cookie holding the last authenticated user.
pub fn last_user_cookie_name(client_id: &str) -> String {
    format!("{COOKIE_PREFIX}.{client_id}.LastAuthUser")
}

/// Name of a per-user token cookie (`idToken`, `accessToken`, ...).
pub fn token_cookie_name(client_id: &str, user_id: &str, token: &str) -> String {
    format!(
        "{COOKIE_PREFIX}.{client_id}.{}.{token}",
        encode_cookie_key(user_id)
    )
}

/// Locate the Cognito cookies for `client_id` in a raw `Cookie` header.
pub fn locate(cookie_header: Option<&str>, client_id: &str) -> CognitoCookies {
    let Some(header) = cookie_header else {
        return CognitoCookies::default();
    };

    let mut jar = parse_cookie_header(header);
    let Some(last_user) = jar.remove(&last_user_cookie_name(client_id)) else {
        return CognitoCookies::default();
    };

    let id_token = jar.remove(&token_cookie_name(client_id, &last_user, "idToken"));
    let access_token = jar.remove(&token_cookie_name(client_id, &last_user, "accessToken"));

    CognitoCookies {
        last_user: Some(last_user),
        id_token,
        access_token,
    }
}

/// Parse a `name=value; name=value` header.
///
/// Follows the parser used by the server framework: the first occurrence of a
/// name wins, quoted values are unquoted, and values are percent-decoded when
/// they contain an escape (left verbatim when that decoding fails).
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    let mut jar = BTreeMap::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || jar.contains_key(name) {
            continue;
        }

        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }

        jar.insert(name.to_string(), decode_cookie_value(value));
    }

    jar
}

fn decode_cookie_value(value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Escape a user id the way the cookie-writing library escapes cookie names.
///
/// The library runs `encodeURIComponent`, turns `%23 %24 %26 %2B %5E %60 %7C`
/// back into `# $ & + ^ ` |`, then escapes `(` and `)`. `encodeURIComponent`
/// itself leaves `! ' * ~` literal.
pub fn encode_cookie_key(user_id: &str) -> String {
    let encoded = urlencoding::encode(user_id);
    restore_literals(&encoded).into_owned()
}

const KEY_LITERALS: &[u8] = b"!'*#$&+^`|";

fn restore_literals(encoded: &str) -> Cow<'_, str> {
    if !encoded.contains('%') {
        return Cow::Borrowed(encoded);
    }

    let bytes = encoded.as_bytes();
    let mut out = String::with_capacity(encoded.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &encoded[i + 1..i + 3];
            match u8::from_str_radix(hex, 16) {
                Ok(byte) if KEY_LITERALS.contains(&byte) => out.push(char::from(byte)),
                _ => {
                    out.push('%');
                    out.push_str(hex);
                }
            }
            i += 3;
            continue;
        }
        out.push(char::from(bytes[i]));
        i += 1;
    }

    Cow::Owned(out)
}
