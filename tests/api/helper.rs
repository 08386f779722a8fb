use std::sync::LazyLock;

use entity::fcm_subscribers::{self, Column};
use entity::prelude::FcmSubscribers;
use reqwest::{Client, Response};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use secrecy::SecretString;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fcm_notifier::configuration::get_configuration;
use fcm_notifier::startup::{Application, get_database_connection};
use fcm_notifier::telemetry::{get_subscriber, init_subscriber};

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const PROJECT_ID: &str = "demo-project";
pub const SEND_PATH: &str = "/v1/projects/demo-project/messages:send";

const PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        init_subscriber(get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::stdout,
        ));
    } else {
        init_subscriber(get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::sink,
        ));
    }
});

pub struct TestApp {
    pub address: String,
    pub db_connection: DatabaseConnection,
    pub fcm_server: MockServer,
    pub api_client: Client,
}

impl TestApp {
    pub async fn post_subscribe(&self, body: &serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/subscribe", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_unsubscribe(&self, body: &serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/unsubscribe", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_subscribe_form(&self, fields: &[(&str, &str)]) -> Response {
        self.api_client
            .post(format!("{}/subscribe", &self.address))
            .form(fields)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_unsubscribe_form(&self, fields: &[(&str, &str)]) -> Response {
        self.api_client
            .post(format!("{}/unsubscribe", &self.address))
            .form(fields)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_subscribers(&self, search: Option<&str>) -> Response {
        let mut request = self
            .api_client
            .get(format!("{}/admin/subscribers", &self.address))
            .bearer_auth(ADMIN_TOKEN);
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }

        request.send().await.expect("Failed to execute request.")
    }

    pub async fn delete_subscriber(&self, id: i32) -> Response {
        self.api_client
            .delete(format!("{}/admin/subscribers/{}", &self.address, id))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_test_notification(&self, body: &serde_json::Value) -> Response {
        self.api_client
            .post(format!("{}/admin/notifications/test", &self.address))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn put_post(&self, post_id: i64, body: &serde_json::Value) -> Response {
        self.api_client
            .put(format!("{}/admin/posts/{}", &self.address, post_id))
            .bearer_auth(ADMIN_TOKEN)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn publish_post(&self, post_id: i64) -> Response {
        self.api_client
            .post(format!("{}/admin/posts/{}/publish", &self.address, post_id))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn find_subscriber(&self, device_uuid: &str) -> Option<fcm_subscribers::Model> {
        FcmSubscribers::find()
            .filter(Column::DeviceUuid.eq(device_uuid))
            .one(&self.db_connection)
            .await
            .expect("Failed to fetch subscriber.")
    }

    pub async fn all_subscribers(&self) -> Vec<fcm_subscribers::Model> {
        FcmSubscribers::find()
            .all(&self.db_connection)
            .await
            .expect("Failed to fetch subscribers.")
    }

    /// Bodies of every request the mock FCM server received on `path`.
    pub async fn received_bodies(&self, path: &str) -> Vec<serde_json::Value> {
        self.fcm_server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }
}

pub fn service_account_json(token_uri: &str) -> SecretString {
    let json = serde_json::json!({
        "type": "service_account",
        "project_id": "service-account-project",
        "private_key_id": "test-key",
        "private_key": PRIVATE_KEY,
        "client_email": "notifier@demo-project.iam.gserviceaccount.com",
        "token_uri": token_uri,
    });

    SecretString::new(Box::from(json.to_string()))
}

pub async fn mount_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.test",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    // One mock stands in for the OAuth, Instance ID and FCM endpoints
    let fcm_server = MockServer::start().await;
    mount_token_endpoint(&fcm_server).await;

    let configuration = {
        let mut configuration = get_configuration().expect("Failed to read configuration");

        // Use a different database for each test case
        let database_file =
            std::env::temp_dir().join(format!("fcm-notifier-{}.db", Uuid::new_v4()));
        configuration.database.url = Some(SecretString::new(Box::from(format!(
            "sqlite://{}?mode=rwc",
            database_file.display()
        ))));

        configuration.fcm.fcm_base_url = fcm_server.uri();
        configuration.fcm.iid_base_url = fcm_server.uri();
        configuration.fcm.project_id = Some(PROJECT_ID.into());
        configuration.fcm.service_account_json = Some(service_account_json(&format!(
            "{}/token",
            fcm_server.uri()
        )));

        configuration.notifications.allowed_post_types = vec!["post".into()];
        configuration.notifications.send_by_default = false;

        configuration.application.admin_token = SecretString::new(Box::from(ADMIN_TOKEN));

        // Use a random OS port
        configuration.application.port = 0;

        configuration
    };

    let db_connection = get_database_connection(&configuration.database)
        .await
        .expect("Failed to connect to the test database.");

    let application = Application::build(configuration)
        .await
        .expect("Failed to build application");
    let application_port = application.port();

    tokio::spawn(application.start_service());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        db_connection,
        fcm_server,
        api_client: Client::new(),
    }
}
