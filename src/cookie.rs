use http::HeaderMap;
use http::header::COOKIE;
use tower_cookies::Cookie;
use tower_cookies::cookie::time::Duration;

use crate::crypto::token::SessionToken;

/// The name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Extracts the session token from a `Cookie` request header.
///
/// Malformed pairs and empty `session` values are skipped; the first
/// non-empty `session` value wins. A missing header, a missing `session`
/// cookie and an empty value all mean "no session".
///
/// # Arguments
///
/// * `header` - The raw `Cookie` header value.
///
/// # Returns
///
/// An `Option` containing the session token if one was sent.
pub fn decode(header: &str) -> Option<SessionToken> {
    Cookie::split_parse(header)
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME && !cookie.value().is_empty())
        .map(|cookie| SessionToken::new(cookie.value()))
}

/// Extracts the session token from every `Cookie` header of a request.
///
/// Header values that are not valid UTF-8 are ignored.
pub fn decode_headers(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(decode)
}

/// Creates the session cookie with the attributes every session cookie
/// carries.
fn session_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, value);
    cookie.set_http_only(true);
    cookie.set_secure(true);
    cookie.set_path("/");
    cookie
}

/// Builds a `Set-Cookie` header value carrying the token.
///
/// The value is empty when there is no token.
pub fn encode(token: Option<&SessionToken>) -> String {
    let value = token.map(|t| t.as_str().to_string()).unwrap_or_default();
    session_cookie(value).to_string()
}

/// Builds a `Set-Cookie` header value that clears the session cookie.
pub fn encode_removal() -> String {
    let mut cookie = session_cookie(String::new());
    cookie.set_max_age(Duration::seconds(0));
    cookie.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn decodes_session_cookie() {
        let token = decode("session=12345;").unwrap();
        assert_eq!(token.as_str(), "12345");
    }

    #[test]
    fn decodes_among_other_cookies() {
        let token = decode("theme=dark; session=abc-DEF_123; lang=nl").unwrap();
        assert_eq!(token.as_str(), "abc-DEF_123");
    }

    #[test]
    fn missing_or_empty_is_no_session() {
        assert!(decode("").is_none());
        assert!(decode("theme=dark").is_none());
        assert!(decode("session=").is_none());
        assert!(decode("session=; theme=dark").is_none());
    }

    #[test]
    fn skips_empty_session_value() {
        let token = decode("session=; session=abc").unwrap();
        assert_eq!(token.as_str(), "abc");

        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("session=; session=abc"));
        assert_eq!(decode_headers(&headers), Some(token));
    }

    #[test]
    fn malformed_header_is_no_session() {
        assert!(decode(";;;").is_none());
        assert!(decode("session").is_none());
        assert!(decode("=novalue; ===").is_none());
    }

    #[test]
    fn encode_sets_security_attributes() {
        let header = encode(Some(&SessionToken::new("abc")));
        assert!(header.starts_with("session=abc"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("Path=/"));
    }

    #[test]
    fn encode_without_token_has_empty_value() {
        let header = encode(None);
        assert!(header.starts_with("session=;"));
        assert!(decode(&header).is_none());
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let token = crate::crypto::token::generate().unwrap();
        let header = encode(Some(&token));
        assert_eq!(decode(&header), Some(token));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let header = encode_removal();
        assert!(header.starts_with("session=;"));
        assert!(header.contains("Max-Age=0"));
        assert!(header.contains("HttpOnly"));
    }

    #[test]
    fn decodes_from_header_map() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("session=from-second-header"));
        let token = decode_headers(&headers).unwrap();
        assert_eq!(token.as_str(), "from-second-header");

        assert!(decode_headers(&HeaderMap::new()).is_none());
    }
}
