use super::{
    DeviceToken, DeviceUuid, FieldError, MAX_DEVICE_TYPE_LENGTH, MAX_TEXT_LENGTH, parse_optional,
};

/// Registration data exactly as the device submitted it.
#[derive(Debug, Default)]
pub struct Registration {
    pub device_token: String,
    pub device_type: Option<String>,
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub topic: Option<String>,
    pub other_data: Option<serde_json::Value>,
}

/// A registration that passed validation and may be written to the registry.
#[derive(Debug)]
pub struct NewRegistration {
    pub token: DeviceToken,
    pub device_type: Option<String>,
    pub device_uuid: DeviceUuid,
    pub device_name: Option<String>,
    pub topic: Option<String>,
    pub other_data: Option<serde_json::Value>,
}

impl TryFrom<Registration> for NewRegistration {
    type Error = FieldError;

    fn try_from(registration: Registration) -> Result<Self, Self::Error> {
        let token = DeviceToken::parse(registration.device_token)?;
        let device_uuid = DeviceUuid::parse(registration.device_uuid)?;

        Ok(Self {
            token,
            device_type: parse_optional(registration.device_type, MAX_DEVICE_TYPE_LENGTH),
            device_uuid,
            device_name: parse_optional(registration.device_name, MAX_TEXT_LENGTH),
            topic: parse_optional(registration.topic, MAX_TEXT_LENGTH),
            other_data: registration.other_data.filter(|data| !data.is_null()),
        })
    }
}
