use anyhow::Context;
use docchat::configuration::get_configuration;
use docchat::startup::{run, Backends};
use docchat::telemetry::{get_subscriber, init_subscriber};
use std::net::TcpListener;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("docchat".into(), "info".into());
    init_subscriber(subscriber);

    let settings = get_configuration().context("Failed to read configuration")?;
    let backends = Backends::connect(&settings).await?;

    let address = format!("{}:{}", settings.app_host, settings.app_port);
    tracing::info!("Start server at {:?}", &address);
    let listener =
        TcpListener::bind(&address).with_context(|| format!("failed to bind to {}", address))?;

    let served = run(listener, backends.clone(), settings).await?.await;
    backends.shutdown().await;

    served.context("Server stopped with an error")
}
