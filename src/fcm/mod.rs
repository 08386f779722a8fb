//! Firebase Cloud Messaging integration.
//!
//! Everything that talks to Google lives here:
//! - `credentials`: service-account JWT assertion exchanged for an OAuth2 bearer token
//! - `topics`: Instance ID calls adding/removing a registration token to/from a topic
//! - `dispatcher`: topic-addressed sends through the HTTP v1 API

mod credentials;
mod dispatcher;
mod topics;

pub use credentials::{AccessToken, CredentialError, CredentialProvider};
pub use dispatcher::{DispatchError, DispatchOutcome, Notification, NotificationDispatcher};
pub use topics::{TopicError, TopicManager, TopicMembership};

/// Every device is subscribed to this topic and every notification is sent to it.
pub const BROADCAST_TOPIC: &str = "all";
