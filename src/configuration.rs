use std::time::Duration;

use chrono::FixedOffset;
use sea_orm::ConnectOptions;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_aux::field_attributes::deserialize_number_from_string;

#[derive(Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub fcm: FcmSettings,
    pub notifications: NotificationSettings,
}

#[derive(Deserialize)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    /// Bearer token guarding the `/admin` routes.
    pub admin_token: SecretString,
}

#[derive(Deserialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: SecretString,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
    /// Full connection URL. When set it wins over the Postgres fields above.
    #[serde(default)]
    pub url: Option<SecretString>,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> SecretString {
        if let Some(url) = &self.url {
            return SecretString::new(Box::from(url.expose_secret()));
        }

        SecretString::new(Box::from(format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name,
            ssl_mode(self.require_ssl)
        )))
    }

    pub fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.connection_string().expose_secret());
        options
            .max_connections(10)
            .connect_timeout(Duration::from_secs(2))
            .sqlx_logging(false);

        options
    }
}

fn ssl_mode(require_ssl: bool) -> &'static str {
    match require_ssl {
        true => "require",
        false => "prefer",
    }
}

#[derive(Deserialize)]
pub struct FcmSettings {
    /// Service account key file contents, as downloaded from the Firebase console.
    #[serde(default)]
    pub service_account_json: Option<SecretString>,
    #[serde(default)]
    pub project_id: Option<String>,
    pub fcm_base_url: String,
    pub iid_base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl FcmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_milliseconds)
    }
}

#[derive(Deserialize, Debug)]
pub struct NotificationSettings {
    /// Post types whose publication may trigger a notification.
    #[serde(default)]
    pub allowed_post_types: Vec<String>,
    /// Send flag applied when the editor does not submit one.
    #[serde(default)]
    pub send_by_default: bool,
    /// Offset in which editors enter schedule times, e.g. `+02:00`.
    #[serde(deserialize_with = "deserialize_utc_offset")]
    pub utc_offset: FixedOffset,
}

impl NotificationSettings {
    pub fn allows(&self, post_type: &str) -> bool {
        self.allowed_post_types.iter().any(|allowed| allowed == post_type)
    }
}

fn deserialize_utc_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<FixedOffset>()
        .map_err(|e| serde::de::Error::custom(format!("invalid utc_offset `{}`: {}", raw, e)))
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either 'local' or 'production'.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        // E.g. `APP_FCM__PROJECT_ID=my-project` sets `Settings.fcm.project_id`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("notifications.allowed_post_types"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
