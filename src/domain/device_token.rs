use super::{FieldError, parse_required};

/// Opaque FCM registration token issued to an app installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn parse(s: String) -> Result<Self, FieldError> {
        parse_required(s, "device_token").map(Self)
    }
}

impl AsRef<str> for DeviceToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
