use crate::common::config::load_controller_config;
use crate::server::controller::Controller;
use crate::server::loader::{load_metrics_sink, load_policy_table, load_transport};

pub async fn controller_start(config_path: &str) -> anyhow::Result<()> {
    env_logger::init();
    log::info!("Starting testbed controller...");
    let config = load_controller_config(config_path)?;
    let policy = load_policy_table(&config)?;
    let metrics = load_metrics_sink(&config)?;
    let transport = load_transport(&config).await?;

    let mut controller = Controller::new(config, transport, policy, metrics)?;
    let shutdown = controller.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received");
            shutdown.cancel();
        }
    });

    controller.run().await?;
    Ok(())
}
