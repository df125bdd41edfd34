use std::collections::HashMap;

/// Why no candidate token came out of the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderToken {
    Missing,
    Malformed,
}

/// Why no candidate token came out of the configured cookie. Absent key and
/// present-but-blank value are distinct outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieToken {
    Missing,
    Empty,
}

/// Extract a candidate token from an `Authorization` header value.
///
/// The header must match `Bearer <seg1>.<seg2>.<seg3>` literally, with each
/// segment drawn from the base64url alphabet. `seg1` and `seg2` must be
/// non-empty; `seg3` may be empty (the unsigned case, where the signature
/// segment is dropped but its leading period remains).
pub fn bearer_token(header: Option<&str>) -> Result<String, HeaderToken> {
    let raw = match header {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Err(HeaderToken::Missing),
    };

    let token = raw.strip_prefix("Bearer ").ok_or(HeaderToken::Malformed)?;

    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(seg1), Some(seg2), Some(seg3), None)
            if !seg1.is_empty()
                && !seg2.is_empty()
                && is_base64url(seg1)
                && is_base64url(seg2)
                && is_base64url(seg3) =>
        {
            Ok(token.to_owned())
        }
        _ => Err(HeaderToken::Malformed),
    }
}

/// Look up the configured cookie in the request's cookie map.
pub fn cookie_token(cookies: &HashMap<String, String>, name: &str) -> Result<String, CookieToken> {
    match cookies.get(name) {
        None => Err(CookieToken::Missing),
        Some(value) if value.trim().is_empty() => Err(CookieToken::Empty),
        Some(value) => Ok(value.clone()),
    }
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
