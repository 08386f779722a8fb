pub use super::fcm_subscribers::Entity as FcmSubscribers;
pub use super::post_notifications::Entity as PostNotifications;
