//! Request header checks
//!
//! Header names are RFC 7230 tokens. Values may not contain line breaks or
//! NUL, which would let a caller smuggle extra headers.

use crate::error::NavigationError;
use crate::Result;

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

pub fn validate_header_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(is_token_char) {
        return Err(NavigationError::InvalidHeader(format!(
            "bad header name {:?}",
            name
        )));
    }
    Ok(())
}

pub fn validate_header_value(value: &str) -> Result<()> {
    if value.chars().any(|c| matches!(c, '\r' | '\n' | '\0')) {
        return Err(NavigationError::InvalidHeader(
            "header value contains a line break".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_names() {
        assert!(validate_header_name("X-Client-Data").is_ok());
        assert!(validate_header_name("accept").is_ok());
        assert!(validate_header_name("").is_err());
        assert!(validate_header_name("Bad Name").is_err());
        assert!(validate_header_name("a:b").is_err());
    }

    #[test]
    fn test_header_values() {
        assert!(validate_header_value("text/html; q=0.9").is_ok());
        assert!(validate_header_value("").is_ok());
        assert!(validate_header_value("a\r\nSet-Cookie: x").is_err());
    }
}
