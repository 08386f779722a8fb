use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::routing::{delete, get, post, put};
use axum::serve::Serve;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use secrecy::SecretString;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_request_id::{RequestId, RequestIdLayer};

use crate::configuration::{DatabaseSettings, Settings};
use crate::fcm::{CredentialProvider, NotificationDispatcher, TopicManager};
use crate::publish::PublishNotifier;
use crate::registry::SubscriberRegistry;
use crate::routes::{
    delete_subscriber, health_check, list_subscribers, publish_post, save_post,
    send_test_notification, subscribe, unsubscribe,
};
use crate::scheduler::TokioScheduler;

pub struct Application {
    serve: Serve<TcpListener, Router, Router>,
    port: u16,
}

impl Application {
    pub async fn build(configuration: Settings) -> Result<Self, anyhow::Error> {
        // Database
        let db_connection = get_database_connection(&configuration.database).await?;
        Migrator::up(&db_connection, None)
            .await
            .context("Failed to run database migrations.")?;

        // FCM clients share one connection pool
        let http_client = reqwest::Client::builder()
            .timeout(configuration.fcm.timeout())
            .build()
            .context("Failed to build the HTTP client.")?;
        let credentials = Arc::new(CredentialProvider::new(
            configuration.fcm.service_account_json,
            http_client.clone(),
        ));
        let topics = Arc::new(TopicManager::new(
            credentials.clone(),
            http_client.clone(),
            configuration.fcm.iid_base_url,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            credentials,
            http_client,
            configuration.fcm.fcm_base_url,
            configuration.fcm.project_id,
        ));

        let registry = SubscriberRegistry::new(db_connection.clone(), topics);
        let notification_settings = configuration.notifications;
        let publisher = Arc::new_cyclic(|notifier| {
            PublishNotifier::new(
                db_connection.clone(),
                dispatcher.clone(),
                Arc::new(TokioScheduler::new(notifier.clone())),
                notification_settings,
            )
        });

        // App
        let address = format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        );
        let tcp_listener = TcpListener::bind(address).await?;
        let port = tcp_listener.local_addr()?.port();

        let serve = run(
            tcp_listener,
            ApplicationState {
                registry,
                dispatcher,
                publisher,
                admin_token: configuration.application.admin_token,
            },
        );

        Ok(Self { serve, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn start_service(self) -> std::io::Result<()> {
        self.serve.await
    }
}

pub async fn get_database_connection(
    settings: &DatabaseSettings,
) -> Result<DatabaseConnection, anyhow::Error> {
    Database::connect(settings.connect_options())
        .await
        .context("Failed to connect to the database.")
}

pub struct ApplicationState {
    pub registry: SubscriberRegistry,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub publisher: Arc<PublishNotifier>,
    pub admin_token: SecretString,
}

pub fn run(
    tcp_listener: TcpListener,
    application_state: ApplicationState,
) -> Serve<TcpListener, Router, Router> {
    let app = Router::new()
        .route("/health_check", get(health_check))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/admin/subscribers", get(list_subscribers))
        .route("/admin/subscribers/{id}", delete(delete_subscriber))
        .route("/admin/notifications/test", post(send_test_notification))
        .route("/admin/posts/{post_id}", put(save_post))
        .route("/admin/posts/{post_id}/publish", post(publish_post))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown".into());

                tracing::info_span!(
                    "request",
                    id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        // Must wrap the trace layer so the id exists when the span is made
        .layer(RequestIdLayer)
        .with_state(Arc::new(application_state));

    axum::serve(tcp_listener, app)
}
