use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::common::config::ControllerConfig;
use crate::common::error::{ControllerError, ControllerResult};
use crate::common::frame::Frame;
use crate::common::protocol::RESERVED_TOPICS;
use crate::handler::context::HandlerContext;
use crate::membership::registry::{Registry, SweepReport};
use crate::qos::builder::QosConfigBuilder;
use crate::qos::policy::PolicyTable;
use crate::server::dispatch::dispatch_frame;
use crate::server::heartbeat::run_heartbeat_cycle;
use crate::sink::metrics_sink_impl::MetricsSinkImpl;
use crate::traits::transport::Transport;
use crate::transport::transport_impl::TransportImpl;

enum Step {
    Received(ControllerResult<Frame>),
    Heartbeat,
    Shutdown,
}

/// The control loop: one task owning the node table, the QoS builder and the
/// bus endpoints.
pub struct Controller {
    ctx: HandlerContext,
    shutdown: CancellationToken,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        transport: TransportImpl,
        policy: PolicyTable,
        metrics: MetricsSinkImpl,
    ) -> ControllerResult<Self> {
        let qos = QosConfigBuilder::new(policy)?;
        let registry = Registry::new(config.echo_timeout(), config.exit_grace_multiplier);
        let ctx = HandlerContext {
            controller_id: Uuid::new_v4(),
            config: Arc::new(config),
            transport,
            registry,
            qos,
            metrics,
            echo_seq: 0,
        };
        Ok(Self {
            ctx,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.ctx.controller_id
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.ctx.config
    }

    pub fn registry(&self) -> &Registry {
        &self.ctx.registry
    }

    pub fn qos(&self) -> &QosConfigBuilder {
        &self.ctx.qos
    }

    /// Cancel the returned token to stop [`Controller::run`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribe to the reserved uplink topics.
    pub async fn start(&mut self) -> ControllerResult<()> {
        for topic in RESERVED_TOPICS {
            self.ctx.transport.subscribe(topic).await?;
        }
        Ok(())
    }

    /// Route a single frame, as one loop iteration would.
    pub async fn process_frame(&mut self, frame: Frame) -> ControllerResult<()> {
        dispatch_frame(&mut self.ctx, frame).await
    }

    pub async fn heartbeat(&mut self, now: Instant) -> ControllerResult<SweepReport> {
        run_heartbeat_cycle(&mut self.ctx, now).await
    }

    /// Run until shutdown is requested or the transport closes. The transport
    /// is closed on every exit path.
    pub async fn run(&mut self) -> ControllerResult<()> {
        log::info!("Controller {} starts", self.ctx.controller_id);
        let result = self.process_msgs().await;
        log::info!("Controller exits");
        self.ctx.transport.close().await;
        result
    }

    async fn process_msgs(&mut self) -> ControllerResult<()> {
        self.start().await?;

        let period = self.ctx.config.echo_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Shutdown,
                _ = ticker.tick() => Step::Heartbeat,
                received = self.ctx.transport.receive() => Step::Received(received),
            };

            let outcome = match step {
                Step::Shutdown => {
                    log::info!("Shutdown requested");
                    return Ok(());
                }
                Step::Heartbeat => run_heartbeat_cycle(&mut self.ctx, Instant::now())
                    .await
                    .map(|_| ()),
                Step::Received(Ok(frame)) => dispatch_frame(&mut self.ctx, frame).await,
                Step::Received(Err(e)) => Err(e),
            };

            match outcome {
                Ok(()) => {}
                Err(ControllerError::TransportClosed) => {
                    log::info!("Transport closed, stopping controller");
                    return Ok(());
                }
                Err(e @ ControllerError::UnsupportedOperation { .. }) => {
                    log::debug!("Operation not supported: {}", e);
                }
                Err(e) if e.is_recoverable() => log::warn!("{}", e),
                Err(e) => return Err(e),
            }
        }
    }
}
