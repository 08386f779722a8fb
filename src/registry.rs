use std::sync::Arc;

use anyhow::Context;
use entity::fcm_subscribers::{self, Column};
use entity::prelude::FcmSubscribers;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::{Expr, Func, LikeExpr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder,
};

use crate::domain::{DeviceUuid, FieldError, NewRegistration, Registration, SubscriberRecord};
use crate::fcm::{BROADCAST_TOPIC, TopicMembership};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] FieldError),
    #[error("Subscriber not found.")]
    NotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

/// Device subscriptions, kept in step with the broadcast topic.
///
/// Topic calls are best-effort: whatever they report, the database write goes ahead.
pub struct SubscriberRegistry {
    db_connection: DatabaseConnection,
    topics: Arc<dyn TopicMembership>,
}

impl SubscriberRegistry {
    pub fn new(db_connection: DatabaseConnection, topics: Arc<dyn TopicMembership>) -> Self {
        Self {
            db_connection,
            topics,
        }
    }

    #[tracing::instrument(
        name = "Register a device",
        skip(self, registration),
        fields(device_uuid = %registration.device_uuid)
    )]
    pub async fn register(&self, registration: Registration) -> Result<(), RegistryError> {
        let registration = NewRegistration::try_from(registration)?;

        let existing = load_by_device_uuid(&self.db_connection, &registration.device_uuid)
            .await
            .context("Failed to look up the device.")?;

        // The old token leaves the topic before the new one joins
        if let Some(existing) = existing {
            if existing.token != registration.token.as_ref() {
                self.topics
                    .unsubscribe(&existing.token, BROADCAST_TOPIC)
                    .await;
            }
        }

        upsert_subscriber(&self.db_connection, &registration)
            .await
            .context("Failed to store the device registration.")?;

        self.topics
            .subscribe(registration.token.as_ref(), BROADCAST_TOPIC)
            .await;

        Ok(())
    }

    #[tracing::instrument(name = "Unregister a device", skip(self))]
    pub async fn unregister(&self, device_uuid: String) -> Result<(), RegistryError> {
        let device_uuid = DeviceUuid::parse(device_uuid)?;

        let subscriber = load_by_device_uuid(&self.db_connection, &device_uuid)
            .await
            .context("Failed to look up the device.")?
            .ok_or(RegistryError::NotFound)?;

        self.topics
            .unsubscribe(&subscriber.token, BROADCAST_TOPIC)
            .await;

        let mut subscriber = subscriber.into_active_model();
        subscriber.subscribed = Set(false);
        subscriber
            .update(&self.db_connection)
            .await
            .context("Failed to mark the device as unsubscribed.")?;

        Ok(())
    }

    /// All subscribers by ascending id, optionally narrowed to those whose
    /// device name or extra data contains `search` (case-insensitive).
    #[tracing::instrument(name = "List subscribers", skip(self))]
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<SubscriberRecord>, RegistryError> {
        let mut query = FcmSubscribers::find().order_by_asc(Column::Id);
        let term = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);
        // SQLite's LOWER() only folds ASCII, so matching happens after the fetch there
        let fold_in_sql = self.db_connection.get_database_backend() != DbBackend::Sqlite;

        if let Some(term) = term.as_deref().filter(|_| fold_in_sql) {
            let pattern = format!("%{}%", escape_like(term));
            query = query.filter(
                Condition::any()
                    .add(lower(Column::DeviceName).like(LikeExpr::new(pattern.clone()).escape('\\')))
                    .add(lower(Column::OtherData).like(LikeExpr::new(pattern).escape('\\'))),
            );
        }

        let subscribers = query
            .all(&self.db_connection)
            .await
            .context("Failed to list subscribers.")?;

        Ok(subscribers
            .into_iter()
            .filter(|subscriber| match term.as_deref() {
                Some(term) if !fold_in_sql => matches_search(subscriber, term),
                _ => true,
            })
            .map(SubscriberRecord::from)
            .collect())
    }

    #[tracing::instrument(name = "Find a subscriber by device", skip(self))]
    pub async fn find_by_device_uuid(
        &self,
        device_uuid: &str,
    ) -> Result<Option<SubscriberRecord>, RegistryError> {
        let subscriber = FcmSubscribers::find()
            .filter(Column::DeviceUuid.eq(device_uuid))
            .one(&self.db_connection)
            .await
            .context("Failed to look up the device.")?;

        Ok(subscriber.map(SubscriberRecord::from))
    }

    #[tracing::instrument(name = "Delete a subscriber", skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), RegistryError> {
        let subscriber = FcmSubscribers::find_by_id(id)
            .one(&self.db_connection)
            .await
            .context("Failed to look up the subscriber.")?
            .ok_or(RegistryError::NotFound)?;

        self.topics
            .unsubscribe(&subscriber.token, BROADCAST_TOPIC)
            .await;

        FcmSubscribers::delete_by_id(id)
            .exec(&self.db_connection)
            .await
            .context("Failed to delete the subscriber.")?;

        Ok(())
    }
}

async fn load_by_device_uuid(
    db_connection: &DatabaseConnection,
    device_uuid: &DeviceUuid,
) -> Result<Option<fcm_subscribers::Model>, sea_orm::DbErr> {
    FcmSubscribers::find()
        .filter(Column::DeviceUuid.eq(device_uuid.as_ref()))
        .one(db_connection)
        .await
}

/// Inserts or overwrites the row for the registration's device in one statement.
#[tracing::instrument(
    name = "Saving device registration in the database",
    skip(db_connection, registration)
)]
async fn upsert_subscriber(
    db_connection: &DatabaseConnection,
    registration: &NewRegistration,
) -> Result<(), anyhow::Error> {
    let other_data = registration
        .other_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("Failed to serialise other_data.")?;

    let subscriber = fcm_subscribers::ActiveModel {
        token: Set(registration.token.as_ref().to_owned()),
        device_type: Set(registration.device_type.clone()),
        device_uuid: Set(registration.device_uuid.as_ref().to_owned()),
        device_name: Set(registration.device_name.clone()),
        topic: Set(registration.topic.clone()),
        other_data: Set(other_data),
        subscribed: Set(true),
        ..Default::default()
    };

    FcmSubscribers::insert(subscriber)
        .on_conflict(
            OnConflict::column(Column::DeviceUuid)
                .update_columns([
                    Column::Token,
                    Column::DeviceType,
                    Column::DeviceName,
                    Column::Topic,
                    Column::OtherData,
                    Column::Subscribed,
                ])
                .to_owned(),
        )
        .exec_without_returning(db_connection)
        .await?;

    Ok(())
}

fn matches_search(subscriber: &fcm_subscribers::Model, term: &str) -> bool {
    [&subscriber.device_name, &subscriber.other_data]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(term))
}

fn lower(column: Column) -> Expr {
    Expr::expr(Func::lower(Expr::col(column)))
}

/// Escapes LIKE wildcards so the term is matched literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
