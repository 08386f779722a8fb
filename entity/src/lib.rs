pub mod prelude;

pub mod fcm_subscribers;
pub mod post_notifications;
