mod device_token;
mod device_uuid;
mod new_registration;
mod subscriber_record;

use unicode_segmentation::UnicodeSegmentation;

pub use device_token::DeviceToken;
pub use device_uuid::DeviceUuid;
pub use new_registration::{NewRegistration, Registration};
pub use subscriber_record::SubscriberRecord;

/// Longest value the subscriber table accepts for a text column.
const MAX_TEXT_LENGTH: usize = 255;
/// Width of the `device_type` column.
const MAX_DEVICE_TYPE_LENGTH: usize = 50;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FieldError {
    #[error("`{0}` was not provided.")]
    Missing(&'static str),
    #[error("`{0}` is longer than {1} characters.")]
    TooLong(&'static str, usize),
}

/// Trims `s` and rejects it when nothing is left or it does not fit the column.
fn parse_required(s: String, field: &'static str) -> Result<String, FieldError> {
    let trimmed = s.trim();

    if trimmed.is_empty() {
        return Err(FieldError::Missing(field));
    }

    if trimmed.graphemes(true).count() > MAX_TEXT_LENGTH {
        return Err(FieldError::TooLong(field, MAX_TEXT_LENGTH));
    }

    Ok(trimmed.to_owned())
}

/// Trims optional free text, mapping blank values to `None` and cutting
/// anything past `max_length` graphemes.
fn parse_optional(s: Option<String>, max_length: usize) -> Option<String> {
    s.map(|s| s.trim().graphemes(true).take(max_length).collect::<String>())
        .map(|s| s.trim_end().to_owned())
        .filter(|s| !s.is_empty())
}
