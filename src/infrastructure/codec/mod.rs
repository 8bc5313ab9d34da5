//! Model Codec
//!
//! Turns decoded JSON values into validated, strongly typed records. The
//! cache never inspects raw JSON beyond what this module does.

mod payloads;

pub use payloads::*;

use serde::de::DeserializeOwned;
use validator::Validate;

use crate::shared::error::CodecError;
use crate::shared::validation::validation_error;

/// Deserialize `payload` into `T` and run its validation rules.
pub fn decode<T>(payload: serde_json::Value) -> Result<T, CodecError>
where
    T: DeserializeOwned + Validate,
{
    let record: T = serde_json::from_value(payload)?;
    record.validate().map_err(validation_error)?;
    Ok(record)
}

/// Like [`decode`], for a payload borrowed from a larger frame.
pub fn decode_ref<T>(payload: &serde_json::Value) -> Result<T, CodecError>
where
    T: DeserializeOwned + Validate,
{
    let record = T::deserialize(payload)?;
    record.validate().map_err(validation_error)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GuildModel, MemberModel};
    use serde_json::json;

    #[test]
    fn test_decode_accepts_numeric_and_string_ids() {
        let a: GuildModel = decode(json!({"id": "100", "name": "g", "owner_id": 1})).unwrap();
        let b: GuildModel = decode(json!({"id": 100, "name": "g", "owner_id": "1"})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let result = decode::<GuildModel>(json!({"id": "100", "owner_id": "1"}));
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_invalid_field() {
        let result = decode::<GuildModel>(json!({"id": "100", "name": "", "owner_id": "1"}));
        assert!(matches!(result, Err(CodecError::Validation(_))));
    }

    #[test]
    fn test_decode_validates_nested_user() {
        let result = decode::<MemberModel>(json!({"user": {"id": "5", "username": ""}}));
        assert!(matches!(result, Err(CodecError::Validation(_))));
    }

    #[test]
    fn test_decode_ref_leaves_payload_intact() {
        let payload = json!({"id": "100", "name": "g", "owner_id": "1"});
        let guild: GuildModel = decode_ref(&payload).unwrap();
        assert_eq!(guild.name, "g");
        assert_eq!(payload["name"], "g");
    }
}
