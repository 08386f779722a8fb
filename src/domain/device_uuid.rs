use super::{FieldError, parse_required};

/// Client-generated identifier of one app installation. Natural key of a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUuid(String);

impl DeviceUuid {
    pub fn parse(s: String) -> Result<Self, FieldError> {
        parse_required(s, "device_uuid").map(Self)
    }
}

impl AsRef<str> for DeviceUuid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
