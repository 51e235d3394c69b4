//! Hierarchical egress QoS description: a priority scheduler with one queue
//! per band and an ordered list of 5-tuple filters steering packets into
//! those queues.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::common::error::{ControllerError, ControllerResult};

/// Longest filter name the wire format can carry.
pub const MAX_FILTER_NAME_LEN: usize = u16::MAX as usize;
/// Most filters the wire format can carry.
pub const MAX_FILTERS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub u32);

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerKind {
    Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    Voice,
    Video,
    BestEffort,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
}

impl Protocol {
    /// IANA protocol number.
    pub fn number(self) -> u8 {
        match self {
            Protocol::Icmp => 1,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Protocol::Icmp),
            6 => Some(Protocol::Tcp),
            17 => Some(Protocol::Udp),
            _ => None,
        }
    }
}

/// Match on (src, dst, protocol, src port, dst port). `None` is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiveTuple {
    pub src_addr: Option<IpAddr>,
    pub dst_addr: Option<IpAddr>,
    pub protocol: Option<Protocol>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl FiveTuple {
    pub fn wildcard() -> Self {
        Self::default()
    }

    pub fn is_wildcard(&self) -> bool {
        self.src_addr.is_none()
            && self.dst_addr.is_none()
            && self.protocol.is_none()
            && self.src_port.is_none()
            && self.dst_port.is_none()
    }

    pub fn matches(&self, packet: &PacketHeader) -> bool {
        fn field<T: PartialEq>(rule: Option<T>, value: Option<T>) -> bool {
            match rule {
                None => true,
                Some(expected) => value == Some(expected),
            }
        }

        field(self.src_addr, Some(packet.src_addr))
            && field(self.dst_addr, Some(packet.dst_addr))
            && field(self.protocol, Some(packet.protocol))
            && field(self.src_port, packet.src_port)
            && field(self.dst_port, packet.dst_port)
    }
}

/// The header fields a filter looks at. Ports are absent for portless
/// protocols such as ICMP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub protocol: Protocol,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: QueueId,
    /// Maximum number of queued packets.
    pub limit: u32,
    pub band: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub matcher: FiveTuple,
    /// Lower values are evaluated first. The catch-all filter carries the
    /// greatest value of the scheduler, so it is always evaluated last.
    pub priority: u32,
    pub traffic_class: TrafficClass,
    pub target_queue: QueueId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduler {
    pub kind: SchedulerKind,
    pub band_count: u8,
    pub queues: Vec<Queue>,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosConfig {
    pub scheduler: Scheduler,
}

impl QosConfig {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn queue(&self, id: QueueId) -> Option<&Queue> {
        self.scheduler.queues.iter().find(|q| q.id == id)
    }

    pub fn queue_for_band(&self, band: u8) -> Option<&Queue> {
        self.scheduler.queues.iter().find(|q| q.band == band)
    }

    /// Filters in the order a packet is tested against them: ascending
    /// priority, declaration order among equal priorities.
    pub fn evaluation_order(&self) -> Vec<&Filter> {
        let mut ordered: Vec<&Filter> = self.scheduler.filters.iter().collect();
        ordered.sort_by_key(|f| f.priority);
        ordered
    }

    pub fn catch_all(&self) -> Option<&Filter> {
        self.scheduler.filters.iter().find(|f| f.matcher.is_wildcard())
    }

    /// First matching filter. Always `Some` for a validated config.
    pub fn classify(&self, packet: &PacketHeader) -> Option<&Filter> {
        self.evaluation_order()
            .into_iter()
            .find(|f| f.matcher.matches(packet))
    }

    pub fn queue_for(&self, packet: &PacketHeader) -> Option<&Queue> {
        self.classify(packet).and_then(|f| self.queue(f.target_queue))
    }

    /// Structural invariants every config sent to an agent must satisfy.
    pub fn validate(&self) -> ControllerResult<()> {
        let scheduler = &self.scheduler;
        if scheduler.band_count == 0 {
            return Err(ControllerError::malformed("band count must be at least 1"));
        }

        let mut bands = HashSet::new();
        let mut queue_ids = HashSet::new();
        for queue in &scheduler.queues {
            if queue.limit == 0 {
                return Err(ControllerError::malformed(format!("queue {} has zero limit", queue.id)));
            }
            if queue.band >= scheduler.band_count {
                return Err(ControllerError::malformed(format!(
                    "queue {} band {} outside 0..{}",
                    queue.id, queue.band, scheduler.band_count
                )));
            }
            if !bands.insert(queue.band) {
                return Err(ControllerError::malformed(format!("duplicate band index {}", queue.band)));
            }
            if !queue_ids.insert(queue.id) {
                return Err(ControllerError::malformed(format!("duplicate queue id {}", queue.id)));
            }
        }
        if bands.len() != usize::from(scheduler.band_count) {
            return Err(ControllerError::malformed(format!(
                "{} bands declared but {} queues present",
                scheduler.band_count,
                bands.len()
            )));
        }

        if scheduler.filters.len() > MAX_FILTERS {
            return Err(ControllerError::malformed(format!(
                "{} filters exceed the limit of {}",
                scheduler.filters.len(),
                MAX_FILTERS
            )));
        }
        for filter in &scheduler.filters {
            if filter.name.len() > MAX_FILTER_NAME_LEN {
                return Err(ControllerError::malformed(format!(
                    "filter name of {} bytes exceeds the limit of {}",
                    filter.name.len(),
                    MAX_FILTER_NAME_LEN
                )));
            }
            if !queue_ids.contains(&filter.target_queue) {
                return Err(ControllerError::malformed(format!(
                    "filter {:?} targets unknown queue {}",
                    filter.name, filter.target_queue
                )));
            }
        }

        let mut catch_alls = scheduler.filters.iter().filter(|f| f.matcher.is_wildcard());
        let catch_all = match (catch_alls.next(), catch_alls.next()) {
            (Some(only), None) => only,
            (None, _) => return Err(ControllerError::malformed("missing catch-all filter")),
            (Some(_), Some(_)) => return Err(ControllerError::malformed("multiple catch-all filters")),
        };
        let shadowed = scheduler
            .filters
            .iter()
            .filter(|f| !f.matcher.is_wildcard())
            .find(|f| f.priority >= catch_all.priority);
        if let Some(filter) = shadowed {
            return Err(ControllerError::malformed(format!(
                "catch-all filter {:?} (priority {}) must be evaluated after {:?} (priority {})",
                catch_all.name, catch_all.priority, filter.name, filter.priority
            )));
        }

        Ok(())
    }
}
