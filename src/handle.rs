//! Opaque serialization of operation handles.
//!
//! A serialized handle lets a process detach from a running operation and a
//! later process reattach to it. The bytes use the crate's protocol binary
//! encoding and carry no stability promise beyond that encoding; callers
//! should store and replay them, never parse them.

use crate::error::{HiveError, Result};
use crate::rpc::OperationHandle;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bincode::Options;

/// Upper bound on an encoded handle; anything larger is malformed.
const MAX_HANDLE_BYTES: u64 = 4 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(MAX_HANDLE_BYTES)
        .reject_trailing_bytes()
}

/// Encodes a handle into an opaque byte blob.
pub fn serialize(handle: &OperationHandle) -> Result<Vec<u8>> {
    codec()
        .serialize(handle)
        .map_err(|e| HiveError::decode(format!("Failed to encode operation handle: {e}")))
}

/// Decodes a blob produced by [`serialize`].
pub fn deserialize(bytes: &[u8]) -> Result<OperationHandle> {
    if bytes.is_empty() {
        return Err(HiveError::decode("Empty operation handle"));
    }
    codec()
        .deserialize(bytes)
        .map_err(|e| HiveError::decode(format!("Malformed operation handle: {e}")))
}

/// Encodes a handle as URL-safe base64 text, for storage in text fields.
pub fn encode_text(handle: &OperationHandle) -> Result<String> {
    Ok(URL_SAFE_NO_PAD.encode(serialize(handle)?))
}

/// Decodes text produced by [`encode_text`].
pub fn decode_text(text: &str) -> Result<OperationHandle> {
    let bytes = URL_SAFE_NO_PAD
        .decode(text.trim())
        .map_err(|e| HiveError::decode(format!("Handle is not valid base64: {e}")))?;
    deserialize(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{HandleIdentifier, OperationType};
    use pretty_assertions::assert_eq;

    fn sample_handle() -> OperationHandle {
        OperationHandle {
            id: HandleIdentifier {
                guid: vec![0x1f, 0x8b, 0x00, 0x42, 0xff, 0x10, 0x20, 0x30],
                secret: vec![9, 8, 7, 6, 5, 4, 3, 2],
            },
            operation_type: OperationType::ExecuteStatement,
            has_result_set: true,
            modified_row_count: None,
        }
    }

    #[test]
    fn test_round_trip() {
        let handle = sample_handle();
        let bytes = serialize(&handle).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), handle);
    }

    #[test]
    fn test_round_trip_with_row_count_and_empty_ids() {
        let handle = OperationHandle {
            id: HandleIdentifier {
                guid: Vec::new(),
                secret: Vec::new(),
            },
            operation_type: OperationType::GetTables,
            has_result_set: false,
            modified_row_count: Some(12.0),
        };
        let bytes = serialize(&handle).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), handle);
    }

    #[test]
    fn test_round_trip_with_nan_row_count() {
        let handle = OperationHandle {
            modified_row_count: Some(f64::NAN),
            ..sample_handle()
        };
        let bytes = serialize(&handle).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), handle);
        assert_ne!(
            handle,
            OperationHandle {
                modified_row_count: Some(0.0),
                ..sample_handle()
            }
        );
    }

    #[test]
    fn test_empty_input_is_decode_error() {
        let err = deserialize(&[]).unwrap_err();
        assert!(matches!(err, HiveError::Decode(_)));
    }

    #[test]
    fn test_truncated_input_is_decode_error() {
        let bytes = serialize(&sample_handle()).unwrap();
        let err = deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, HiveError::Decode(_)));
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut bytes = serialize(&sample_handle()).unwrap();
        bytes.push(0);
        assert!(matches!(
            deserialize(&bytes).unwrap_err(),
            HiveError::Decode(_)
        ));
    }

    #[test]
    fn test_huge_length_prefix_is_rejected() {
        // A guid length far beyond the size limit.
        let bytes = [0xfc, 0xff, 0xff, 0xff, 0x7f, 0x01];
        assert!(matches!(
            deserialize(&bytes).unwrap_err(),
            HiveError::Decode(_)
        ));
    }

    #[test]
    fn test_text_round_trip() {
        let handle = sample_handle();
        let text = encode_text(&handle).unwrap();
        assert!(!text.contains('='));
        assert_eq!(decode_text(&text).unwrap(), handle);
        assert_eq!(decode_text(&format!("  {text}\n")).unwrap(), handle);
    }

    #[test]
    fn test_text_rejects_non_base64() {
        assert!(matches!(
            decode_text("not base64!").unwrap_err(),
            HiveError::Decode(_)
        ));
    }
}
