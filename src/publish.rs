use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use entity::post_notifications::{self, Column};
use entity::prelude::PostNotifications;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel};
use serde::Serialize;

use crate::configuration::NotificationSettings;
use crate::fcm::{Notification, NotificationDispatcher};

/// Host status of a post that is live.
const PUBLISHED: &str = "publish";
/// Format of the schedule field in the post editor.
const SCHEDULE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Defers a post notification to a single point in time.
#[async_trait]
pub trait OneShotScheduler: Send + Sync {
    async fn schedule_once(&self, at: DateTime<Utc>, post_id: i64) -> Result<(), anyhow::Error>;
}

/// A post as the host CMS saves it, together with the editor's notification inputs.
#[derive(Debug)]
pub struct PostSave {
    pub post_id: i64,
    pub post_type: String,
    pub status: String,
    pub title: String,
    pub content: String,
    /// `None` when the editor did not submit the checkbox at all.
    pub send_notification: Option<bool>,
    pub schedule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Sent,
    Scheduled { scheduled_at: DateTime<Utc> },
    Skipped,
}

pub struct PublishNotifier {
    db_connection: DatabaseConnection,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<dyn OneShotScheduler>,
    settings: NotificationSettings,
}

impl PublishNotifier {
    pub fn new(
        db_connection: DatabaseConnection,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<dyn OneShotScheduler>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            db_connection,
            dispatcher,
            scheduler,
            settings,
        }
    }

    /// Stores the post snapshot and its notification inputs.
    ///
    /// Returns `false` without touching the database when the post type is
    /// not one that notifies.
    #[tracing::instrument(
        name = "Save post notification settings",
        skip(self, post),
        fields(post_id = post.post_id, post_type = %post.post_type)
    )]
    pub async fn save_post(&self, post: PostSave) -> Result<bool, anyhow::Error> {
        if !self.settings.allows(&post.post_type) {
            return Ok(false);
        }

        let send_notification = post
            .send_notification
            .unwrap_or(self.settings.send_by_default);
        let scheduled_at = post
            .schedule
            .as_deref()
            .and_then(|schedule| parse_schedule(schedule, self.settings.utc_offset));

        let snapshot = post_notifications::ActiveModel {
            post_id: Set(post.post_id),
            post_type: Set(post.post_type),
            status: Set(post.status),
            title: Set(post.title),
            content: Set(post.content),
            send_notification: Set(send_notification),
            scheduled_at: Set(scheduled_at),
        };

        PostNotifications::insert(snapshot)
            .on_conflict(
                OnConflict::column(Column::PostId)
                    .update_columns([
                        Column::PostType,
                        Column::Status,
                        Column::Title,
                        Column::Content,
                        Column::SendNotification,
                        Column::ScheduledAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db_connection)
            .await
            .context("Failed to store the post snapshot.")?;

        Ok(true)
    }

    /// Reacts to the host publishing `post_id`.
    #[tracing::instrument(name = "Handle post publication", skip(self))]
    pub async fn on_publish(&self, post_id: i64) -> Result<PublishOutcome, anyhow::Error> {
        let Some(post) = self.load(post_id).await? else {
            return Ok(PublishOutcome::Skipped);
        };

        if post.status != PUBLISHED
            || !self.settings.allows(&post.post_type)
            || !post.send_notification
        {
            return Ok(PublishOutcome::Skipped);
        }

        let outcome = match post.scheduled_at.filter(|at| *at > Utc::now()) {
            Some(at) => {
                self.scheduler
                    .schedule_once(at, post_id)
                    .await
                    .context("Failed to schedule the notification.")?;
                PublishOutcome::Scheduled { scheduled_at: at }
            }
            None => {
                self.dispatcher.send(&notification_for(&post)).await;
                PublishOutcome::Sent
            }
        };

        let mut post = post.into_active_model();
        post.send_notification = Set(false);
        post.scheduled_at = Set(None);
        post.update(&self.db_connection)
            .await
            .context("Failed to clear the notification flag.")?;

        Ok(outcome)
    }

    /// Fires a notification deferred by [`PublishNotifier::on_publish`].
    #[tracing::instrument(name = "Send scheduled notification", skip(self))]
    pub async fn send_scheduled(&self, post_id: i64) -> Result<(), anyhow::Error> {
        match self.load(post_id).await? {
            Some(post) => self.dispatcher.send(&notification_for(&post)).await,
            None => tracing::warn!("Scheduled post no longer exists, nothing sent"),
        }

        Ok(())
    }

    async fn load(&self, post_id: i64) -> Result<Option<post_notifications::Model>, anyhow::Error> {
        PostNotifications::find_by_id(post_id)
            .one(&self.db_connection)
            .await
            .context("Failed to load the post snapshot.")
    }
}

fn notification_for(post: &post_notifications::Model) -> Notification {
    Notification::new(post.title.clone(), strip_tags(&post.content))
        .with_post(post.post_id, post.post_type.clone())
}

/// Reads an editor schedule (`YYYY-MM-DDTHH:MM` in `offset`) as a UTC instant.
pub fn parse_schedule(input: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), SCHEDULE_FORMAT).ok()?;

    naive
        .and_local_timezone(offset)
        .single()
        .map(|at| at.with_timezone(&Utc))
}

/// Plain text of an HTML fragment. `<script>` and `<style>` bodies are dropped with their tags.
pub fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        let tag = &rest[start..];

        let end = match ["script", "style"]
            .into_iter()
            .find(|name| opens_element(tag, name))
        {
            Some(name) => tag
                .to_ascii_lowercase()
                .find(&format!("</{}", name))
                .and_then(|close| tag[close..].find('>').map(|gt| close + gt)),
            None => tag.find('>'),
        };

        rest = match end {
            Some(end) => &tag[end + 1..],
            None => "",
        };
    }
    text.push_str(rest);

    text.trim().to_owned()
}

fn opens_element(tag: &str, name: &str) -> bool {
    let bytes = tag.as_bytes();
    let name_end = 1 + name.len();

    bytes.len() > name_end
        && bytes[1..name_end].eq_ignore_ascii_case(name.as_bytes())
        && !bytes[name_end].is_ascii_alphanumeric()
}
