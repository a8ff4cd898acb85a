use rocket::serde::json::Json;
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::error::AppError;

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, AppError>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, AppError> {
        let inner = self.into_inner();
        inner.validate()?;
        Ok(inner)
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Cuts `value` to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        technique_id: Option<Option<i64>>,
    }

    #[test]
    fn nullable_distinguishes_absent_from_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"technique_id": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"technique_id": 4}"#).unwrap();

        assert_eq!(absent.technique_id, None);
        assert_eq!(null.technique_id, Some(None));
        assert_eq!(set.technique_id, Some(Some(4)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("Mae Geri", 3), "Mae");
        assert_eq!(truncate_chars("背負投", 2), "背負");
        assert_eq!(truncate_chars("Jab", 100), "Jab");
    }
}
