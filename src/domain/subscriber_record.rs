use entity::fcm_subscribers;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberRecord {
    pub id: i32,
    pub token: String,
    pub device_type: Option<String>,
    pub device_uuid: String,
    pub device_name: Option<String>,
    pub topic: Option<String>,
    pub other_data: Option<serde_json::Value>,
    pub subscribed: bool,
}

impl From<fcm_subscribers::Model> for SubscriberRecord {
    fn from(model: fcm_subscribers::Model) -> Self {
        // Rows written by other tools may hold plain text; hand it back untouched
        let other_data = model.other_data.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        });

        Self {
            id: model.id,
            token: model.token,
            device_type: model.device_type,
            device_uuid: model.device_uuid,
            device_name: model.device_name,
            topic: model.topic,
            other_data,
            subscribed: model.subscribed,
        }
    }
}
