//! Canonical binary encoding of a [`QosConfig`] for `install_egress_scheduler`.
//!
//! All integers are big-endian. Every match field is preceded by a marker
//! byte so a wildcard is never confused with a present value.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::common::error::{ControllerError, ControllerResult};
use crate::qos::model::{
    Filter, FiveTuple, Protocol, QosConfig, Queue, QueueId, Scheduler, SchedulerKind, TrafficClass,
};

pub const MAGIC: &[u8; 4] = b"WQOS";
pub const FORMAT_VERSION: u8 = 1;

const KIND_PRIORITY: u8 = 1;

const FIELD_WILDCARD: u8 = 0;
const FIELD_PRESENT: u8 = 1;

const FAMILY_V4: u8 = 4;
const FAMILY_V6: u8 = 6;

/// Encode a config that passed [`QosConfig::validate`]; its counts and name
/// lengths then fit the u16 length fields.
pub fn encode(config: &QosConfig) -> Bytes {
    let scheduler = &config.scheduler;
    let mut buf = BytesMut::with_capacity(64 + scheduler.filters.len() * 48);

    buf.put_slice(MAGIC);
    buf.put_u8(FORMAT_VERSION);
    buf.put_u8(match scheduler.kind {
        SchedulerKind::Priority => KIND_PRIORITY,
    });
    buf.put_u8(scheduler.band_count);

    buf.put_u16(scheduler.queues.len() as u16);
    for queue in &scheduler.queues {
        buf.put_u32(queue.id.0);
        buf.put_u32(queue.limit);
        buf.put_u8(queue.band);
    }

    buf.put_u16(scheduler.filters.len() as u16);
    for filter in &scheduler.filters {
        put_str(&mut buf, &filter.name);
        buf.put_u32(filter.priority);
        buf.put_u8(class_tag(filter.traffic_class));
        buf.put_u32(filter.target_queue.0);
        put_tuple(&mut buf, &filter.matcher);
    }

    buf.freeze()
}

/// Decode and validate. Any structural problem is `MalformedConfig`.
pub fn decode(raw: &[u8]) -> ControllerResult<QosConfig> {
    let mut buf = raw;

    need(&buf, MAGIC.len() + 3, "header")?;
    let mut magic = [0u8; 4];
    buf.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(ControllerError::malformed("bad magic"));
    }
    let version = buf.get_u8();
    if version != FORMAT_VERSION {
        return Err(ControllerError::malformed(format!("unsupported format version {}", version)));
    }
    let kind = match buf.get_u8() {
        KIND_PRIORITY => SchedulerKind::Priority,
        other => return Err(ControllerError::malformed(format!("unknown scheduler kind {}", other))),
    };
    let band_count = buf.get_u8();

    need(&buf, 2, "queue count")?;
    let queue_count = buf.get_u16();
    let mut queues = Vec::with_capacity(usize::from(queue_count));
    for _ in 0..queue_count {
        need(&buf, 9, "queue")?;
        queues.push(Queue {
            id: QueueId(buf.get_u32()),
            limit: buf.get_u32(),
            band: buf.get_u8(),
        });
    }

    need(&buf, 2, "filter count")?;
    let filter_count = buf.get_u16();
    let mut filters = Vec::with_capacity(usize::from(filter_count));
    for _ in 0..filter_count {
        let name = get_str(&mut buf)?;
        need(&buf, 9, "filter")?;
        let priority = buf.get_u32();
        let traffic_class = class_from_tag(buf.get_u8())?;
        let target_queue = QueueId(buf.get_u32());
        let matcher = get_tuple(&mut buf)?;
        filters.push(Filter {
            name,
            matcher,
            priority,
            traffic_class,
            target_queue,
        });
    }

    if buf.has_remaining() {
        return Err(ControllerError::malformed(format!("{} trailing bytes", buf.remaining())));
    }

    let config = QosConfig::new(Scheduler {
        kind,
        band_count,
        queues,
        filters,
    });
    config.validate()?;
    Ok(config)
}

fn need(buf: &&[u8], len: usize, what: &str) -> ControllerResult<()> {
    if buf.remaining() < len {
        return Err(ControllerError::malformed(format!("truncated {}", what)));
    }
    Ok(())
}

fn class_tag(class: TrafficClass) -> u8 {
    match class {
        TrafficClass::Voice => 0,
        TrafficClass::Video => 1,
        TrafficClass::BestEffort => 2,
        TrafficClass::Background => 3,
    }
}

fn class_from_tag(tag: u8) -> ControllerResult<TrafficClass> {
    match tag {
        0 => Ok(TrafficClass::Voice),
        1 => Ok(TrafficClass::Video),
        2 => Ok(TrafficClass::BestEffort),
        3 => Ok(TrafficClass::Background),
        other => Err(ControllerError::malformed(format!("unknown traffic class {}", other))),
    }
}

fn put_str(buf: &mut BytesMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.put_slice(value.as_bytes());
}

fn get_str(buf: &mut &[u8]) -> ControllerResult<String> {
    need(buf, 2, "string length")?;
    let len = usize::from(buf.get_u16());
    need(buf, len, "string")?;
    let value = std::str::from_utf8(&buf[..len])
        .map_err(|_| ControllerError::malformed("filter name is not valid utf-8"))?
        .to_string();
    buf.advance(len);
    Ok(value)
}

fn put_tuple(buf: &mut BytesMut, tuple: &FiveTuple) {
    put_field(buf, tuple.src_addr, put_addr);
    put_field(buf, tuple.dst_addr, put_addr);
    put_field(buf, tuple.protocol, |b, p| b.put_u8(p.number()));
    put_field(buf, tuple.src_port, |b, p| b.put_u16(p));
    put_field(buf, tuple.dst_port, |b, p| b.put_u16(p));
}

fn get_tuple(buf: &mut &[u8]) -> ControllerResult<FiveTuple> {
    Ok(FiveTuple {
        src_addr: get_field(buf, get_addr)?,
        dst_addr: get_field(buf, get_addr)?,
        protocol: get_field(buf, |b| {
            need(b, 1, "protocol")?;
            let number = b.get_u8();
            Protocol::from_number(number)
                .ok_or_else(|| ControllerError::malformed(format!("unknown protocol {}", number)))
        })?,
        src_port: get_field(buf, get_port)?,
        dst_port: get_field(buf, get_port)?,
    })
}

fn put_field<T>(buf: &mut BytesMut, value: Option<T>, put: impl FnOnce(&mut BytesMut, T)) {
    match value {
        None => buf.put_u8(FIELD_WILDCARD),
        Some(v) => {
            buf.put_u8(FIELD_PRESENT);
            put(buf, v);
        }
    }
}

fn get_field<T>(
    buf: &mut &[u8],
    get: impl FnOnce(&mut &[u8]) -> ControllerResult<T>,
) -> ControllerResult<Option<T>> {
    need(buf, 1, "field marker")?;
    match buf.get_u8() {
        FIELD_WILDCARD => Ok(None),
        FIELD_PRESENT => get(buf).map(Some),
        other => Err(ControllerError::malformed(format!("unknown field marker {}", other))),
    }
}

fn put_addr(buf: &mut BytesMut, addr: IpAddr) {
    match addr {
        IpAddr::V4(v4) => {
            buf.put_u8(FAMILY_V4);
            buf.put_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            buf.put_u8(FAMILY_V6);
            buf.put_slice(&v6.octets());
        }
    }
}

fn get_addr(buf: &mut &[u8]) -> ControllerResult<IpAddr> {
    need(buf, 1, "address family")?;
    match buf.get_u8() {
        FAMILY_V4 => {
            need(buf, 4, "ipv4 address")?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        FAMILY_V6 => {
            need(buf, 16, "ipv6 address")?;
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(ControllerError::malformed(format!("unknown address family {}", other))),
    }
}

fn get_port(buf: &mut &[u8]) -> ControllerResult<u16> {
    need(buf, 2, "port")?;
    Ok(buf.get_u16())
}
