//! Opaque keyset cursors
//!
//! A cursor is any small serializable keyset record. It is written as JSON and
//! then as URL-safe base64 without padding, so it can travel in a query string
//! untouched. Clients must treat the result as opaque.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;

/// Encodes a keyset record into an opaque cursor string
///
/// # Example
///
/// ```rust
/// use core_kernel::cursor::{decode_cursor, encode_cursor};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Position { sequence: u32 }
///
/// let token = encode_cursor(&Position { sequence: 5 }).unwrap();
/// let back: Option<Position> = decode_cursor(Some(&token)).unwrap();
/// assert_eq!(back, Some(Position { sequence: 5 }));
/// ```
pub fn encode_cursor<T: Serialize>(cursor: &T) -> Result<String, CoreError> {
    let json = serde_json::to_vec(cursor)
        .map_err(|e| CoreError::CursorEncoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decodes an opaque cursor string back into its keyset record
///
/// An absent or empty cursor means "start of set" and decodes to `None`.
///
/// # Errors
///
/// Returns `CoreError::InvalidCursor` if the string is not valid base64 or
/// does not describe a `T`.
pub fn decode_cursor<T: DeserializeOwned>(encoded: Option<&str>) -> Result<Option<T>, CoreError> {
    let encoded = match encoded.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(value) => value,
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| CoreError::InvalidCursor(e.to_string()))?;
    let cursor = serde_json::from_slice(&bytes)
        .map_err(|e| CoreError::InvalidCursor(e.to_string()))?;
    Ok(Some(cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Keyset {
        at: i64,
        id: i64,
    }

    #[test]
    fn test_absent_and_empty_mean_start() {
        assert_eq!(decode_cursor::<Keyset>(None).unwrap(), None);
        assert_eq!(decode_cursor::<Keyset>(Some("")).unwrap(), None);
    }

    #[test]
    fn test_encoded_form_is_url_safe_and_unpadded() {
        let token = encode_cursor(&Keyset { at: -1, id: 1 }).unwrap();
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        let not_base64 = decode_cursor::<Keyset>(Some("***"));
        assert!(matches!(not_base64, Err(CoreError::InvalidCursor(_))));

        let wrong_shape = URL_SAFE_NO_PAD.encode(br#"{"sequence":3}"#);
        let result = decode_cursor::<Keyset>(Some(&wrong_shape));
        assert!(matches!(result, Err(CoreError::InvalidCursor(_))));
    }

    proptest! {
        #[test]
        fn prop_cursor_round_trip(at in any::<i64>(), id in any::<i64>()) {
            let original = Keyset { at, id };
            let token = encode_cursor(&original).unwrap();
            let decoded: Option<Keyset> = decode_cursor(Some(&token)).unwrap();
            prop_assert_eq!(decoded, Some(original));
        }
    }
}
