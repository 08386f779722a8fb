use fcm_notifier::configuration::get_configuration;
use fcm_notifier::startup::Application;
use fcm_notifier::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("fcm-notifier".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration().expect("Failed to read configuration");

    let application = Application::build(configuration).await?;

    application.start_service().await?;

    Ok(())
}
