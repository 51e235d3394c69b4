use std::sync::Arc;

use crate::common::error::ControllerResult;
use crate::qos::model::{Filter, FiveTuple, QosConfig, Queue, QueueId, Scheduler, SchedulerKind};
use crate::qos::policy::PolicyTable;

/// Builds the controller's egress scheduler from a policy table, once.
#[derive(Debug)]
pub struct QosConfigBuilder {
    table: PolicyTable,
    cached: Option<Arc<QosConfig>>,
}

impl QosConfigBuilder {
    /// Fails with `InvalidPolicy` for a table that cannot yield a valid
    /// scheduler, so every config handed out later is valid.
    pub fn new(table: PolicyTable) -> ControllerResult<Self> {
        table.validate()?;
        Ok(Self { table, cached: None })
    }

    pub fn policy_table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn is_built(&self) -> bool {
        self.cached.is_some()
    }

    /// The cached config, building it on the first call.
    pub fn config(&mut self) -> Arc<QosConfig> {
        if let Some(config) = &self.cached {
            return Arc::clone(config);
        }
        let config = Arc::new(build(&self.table));
        log::debug!(
            "Built QoS config: {} bands, {} filters",
            config.scheduler.band_count,
            config.scheduler.filters.len()
        );
        self.cached = Some(Arc::clone(&config));
        config
    }
}

fn queue_id(band: u8) -> QueueId {
    QueueId(u32::from(band) + 1)
}

fn build(table: &PolicyTable) -> QosConfig {
    let queues = (0..table.band_count)
        .map(|band| Queue {
            id: queue_id(band),
            limit: table.queue_limit,
            band,
        })
        .collect();

    let mut filters: Vec<Filter> = table
        .policies
        .iter()
        .map(|policy| Filter {
            name: policy.name.clone(),
            matcher: policy.matcher.clone(),
            priority: policy.priority,
            traffic_class: policy.traffic_class,
            target_queue: queue_id(policy.band),
        })
        .collect();
    filters.push(Filter {
        name: table.fallback.name.clone(),
        matcher: FiveTuple::wildcard(),
        priority: table.fallback_priority(),
        traffic_class: table.fallback.traffic_class,
        target_queue: queue_id(table.fallback.band),
    });

    let config = QosConfig::new(Scheduler {
        kind: SchedulerKind::Priority,
        band_count: table.band_count,
        queues,
        filters,
    });
    debug_assert!(config.validate().is_ok(), "policy table produced an invalid QoS config");
    config
}
