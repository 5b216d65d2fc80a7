//! Variation engine: per-entry behaviour attached in the record's fourth
//! field.
//!
//! Variations are a closed set resolved by name when the store loads. Each
//! carries its own state, shared by every endpoint task that resolves the
//! entry, so state lives behind atomics or a `Mutex`.
//!
//! | name         | served value                          | writable |
//! |--------------|---------------------------------------|----------|
//! | `static`     | recorded (or overlay) value           | no       |
//! | `counter`    | `start + step * calls`                | no       |
//! | `uptime`     | TimeTicks since load, plus `offset`   | no       |
//! | `writecache` | overlay value after a SET             | yes      |
//! | `persist`    | module-owned value after a SET        | yes      |
//! | `notify`     | recorded value, emits a notification  | yes      |

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;

use crate::notification::{NotificationJob, NotifyKind, Reason, Security, oids};
use crate::oid::Oid;
use crate::store::{Slot, VariationSpec};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// The request operation a resolution happens under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    GetNext,
    GetBulk,
    Set,
}

impl Operation {
    pub fn is_read(self) -> bool {
        !matches!(self, Self::Set)
    }
}

/// Request facts a variation may look at.
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    pub op: Operation,
    pub request_id: i32,
    pub source: Option<SocketAddr>,
    /// Registry key of the store being resolved.
    pub context: &'a str,
    /// False while resolving a notification payload, so that a `notify`
    /// entry in the payload cannot trigger itself.
    pub side_effects: bool,
}

impl<'a> ResolveContext<'a> {
    pub fn new(op: Operation, context: &'a str) -> Self {
        Self {
            op,
            request_id: 0,
            source: None,
            context,
            side_effects: true,
        }
    }

    pub fn request(mut self, request_id: i32, source: SocketAddr) -> Self {
        self.request_id = request_id;
        self.source = Some(source);
        self
    }

    pub fn without_side_effects(mut self) -> Self {
        self.side_effects = false;
        self
    }
}

/// Result of resolving one entry.
#[derive(Debug)]
pub enum Outcome {
    /// Serve the stored value.
    Static,
    /// Serve a computed value.
    Value(Value),
    /// Serve the stored value and enqueue a notification.
    SideEffect(NotificationJob),
}

/// When a `notify` entry fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Read,
    Write,
    Any,
}

impl Trigger {
    fn fires_on(self, op: Operation) -> bool {
        match self {
            Self::Read => op.is_read(),
            Self::Write => op == Operation::Set,
            Self::Any => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Any => "any",
        }
    }
}

#[derive(Debug)]
pub struct CounterState {
    start: u64,
    step: u64,
    calls: AtomicU64,
}

#[derive(Debug)]
pub struct UptimeState {
    offset: u32,
    since: Instant,
}

#[derive(Debug, Default)]
pub struct PersistState {
    value: Mutex<Option<Value>>,
}

#[derive(Debug)]
pub struct NotifyState {
    target: SocketAddr,
    security: Security,
    kind: NotifyKind,
    trap_oid: Oid,
    payload: Vec<Oid>,
    on: Trigger,
}

/// A variation bound to one entry.
#[derive(Debug)]
pub enum Variation {
    Static,
    Counter(CounterState),
    Uptime(UptimeState),
    WriteCache,
    Persist(PersistState),
    Notify(Box<NotifyState>),
}

impl Variation {
    /// Bind a record's variation to its entry. The error becomes the
    /// `reason` of a `MalformedRecord`.
    pub fn from_spec(spec: &VariationSpec, oid: &Oid, value: &Value) -> Result<Self, String> {
        let allowed: &[&str] = match spec.name.as_str() {
            "static" | "writecache" | "persist" => &[],
            "counter" => &["start", "step"],
            "uptime" => &["offset"],
            "notify" => &[
                "target", "community", "version", "kind", "trap-oid", "payload", "on", "user",
            ],
            other => return Err(format!("unknown variation '{other}'")),
        };
        if let Some((key, _)) = spec.params.iter().find(|(k, _)| !allowed.contains(&k.as_str())) {
            return Err(format!("variation '{}' has no parameter '{key}'", spec.name));
        }

        let variation = match spec.name.as_str() {
            "static" => Self::Static,
            "writecache" => Self::WriteCache,
            "persist" => Self::Persist(PersistState::default()),
            "counter" => Self::Counter(counter(spec, value)?),
            "uptime" => {
                if !matches!(value, Value::TimeTicks(_)) {
                    return Err("uptime needs a timeticks value".into());
                }
                Self::Uptime(UptimeState {
                    offset: number(spec, "offset")?.unwrap_or(0),
                    since: Instant::now(),
                })
            }
            _ => Self::Notify(Box::new(notify(spec, oid)?)),
        };
        Ok(variation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Counter(_) => "counter",
            Self::Uptime(_) => "uptime",
            Self::WriteCache => "writecache",
            Self::Persist(_) => "persist",
            Self::Notify(_) => "notify",
        }
    }

    /// The record form of this variation, parameters made explicit.
    pub fn spec(&self) -> VariationSpec {
        let spec = VariationSpec::new(self.name());
        match self {
            Self::Static | Self::WriteCache | Self::Persist(_) => spec,
            Self::Counter(state) => spec
                .with_param("start", state.start.to_string())
                .with_param("step", state.step.to_string()),
            Self::Uptime(state) if state.offset == 0 => spec,
            Self::Uptime(state) => spec.with_param("offset", state.offset.to_string()),
            Self::Notify(state) => {
                let mut spec = spec.with_param("target", state.target.to_string());
                spec = match &state.security {
                    Security::Community { version, community } => spec
                        .with_param("community", String::from_utf8_lossy(community))
                        .with_param("version", version.to_string()),
                    Security::Usm { user } => spec.with_param("user", String::from_utf8_lossy(user)),
                };
                let payload: Vec<String> = state.payload.iter().map(Oid::to_string).collect();
                spec.with_param("kind", state.kind.to_string())
                    .with_param("trap-oid", state.trap_oid.to_string())
                    .with_param("payload", payload.join(";"))
                    .with_param("on", state.on.as_str())
            }
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::WriteCache | Self::Persist(_) | Self::Notify(_))
    }

    /// Keep a written value in module state. Returns false when the value
    /// belongs in the store's overlay instead.
    pub(crate) fn absorb_write(&self, value: &Value) -> bool {
        match self {
            Self::Persist(state) => {
                *state.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.clone());
                true
            }
            _ => false,
        }
    }

    pub fn resolve(&self, slot: &Slot<'_>, ctx: &ResolveContext<'_>) -> Outcome {
        match self {
            Self::Static | Self::WriteCache => Outcome::Static,
            Self::Counter(state) => {
                let calls = state.calls.fetch_add(1, Ordering::Relaxed);
                let raw = state.start.wrapping_add(state.step.wrapping_mul(calls));
                let value = match slot.value {
                    Value::Integer(_) => Value::Integer(raw as i32),
                    Value::Counter32(_) => Value::Counter32(raw as u32),
                    Value::Gauge32(_) => Value::Gauge32(raw as u32),
                    Value::TimeTicks(_) => Value::TimeTicks(raw as u32),
                    _ => Value::Counter64(raw),
                };
                tracing::trace!(target: "snmp_responder::variation", { snmp.oid = %slot.oid, calls }, "counter advanced");
                Outcome::Value(value)
            }
            Self::Uptime(state) => {
                let ticks = (state.since.elapsed().as_millis() / 10) as u32;
                Outcome::Value(Value::TimeTicks(ticks.wrapping_add(state.offset)))
            }
            Self::Persist(state) => {
                match state.value.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
                    Some(value) => Outcome::Value(value.clone()),
                    None => Outcome::Static,
                }
            }
            Self::Notify(state) => {
                if !ctx.side_effects || !state.on.fires_on(ctx.op) {
                    return Outcome::Static;
                }
                let reason = match ctx.op {
                    Operation::Set => Reason::Write {
                        oid: slot.oid.clone(),
                    },
                    _ => Reason::Read {
                        oid: slot.oid.clone(),
                    },
                };
                tracing::debug!(target: "snmp_responder::variation", { snmp.oid = %slot.oid, snmp.target = %state.target, %reason }, "notification triggered");
                Outcome::SideEffect(NotificationJob {
                    target: state.target,
                    security: state.security.clone(),
                    kind: state.kind,
                    trap_oid: state.trap_oid.clone(),
                    payload: state.payload.clone(),
                    context: Some(ctx.context.to_string()),
                    reason,
                })
            }
        }
    }

    /// The widest value `resolve` may return for `slot`, found without
    /// running the variation.
    fn widest(&self, slot: &Slot<'_>) -> Value {
        match self {
            Self::Counter(_) => match slot.value {
                Value::Integer(_) => Value::Integer(i32::MIN),
                Value::Counter32(_) => Value::Counter32(u32::MAX),
                Value::Gauge32(_) => Value::Gauge32(u32::MAX),
                Value::TimeTicks(_) => Value::TimeTicks(u32::MAX),
                _ => Value::Counter64(u64::MAX),
            },
            Self::Uptime(_) => Value::TimeTicks(u32::MAX),
            Self::Persist(state) => state
                .value
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .unwrap_or_else(|| slot.value.clone()),
            Self::Static | Self::WriteCache | Self::Notify(_) => slot.value.clone(),
        }
    }
}

impl Slot<'_> {
    /// Upper bound on the encoded size of this slot's varbind once
    /// resolved.
    pub fn max_encoded_size(&self) -> usize {
        let value = match self.entry.and_then(|e| e.variation.as_ref()) {
            Some(variation) => variation.widest(self),
            None => self.value.clone(),
        };
        VarBind::new(self.oid.clone(), value).encoded_size()
    }

    /// The value to serve, after this slot's variation (if any) ran, plus
    /// the notification it asked for.
    pub fn resolve(&self, ctx: &ResolveContext<'_>) -> (Value, Option<NotificationJob>) {
        let Some(variation) = self.entry.and_then(|e| e.variation.as_ref()) else {
            return (self.value.clone(), None);
        };
        match variation.resolve(self, ctx) {
            Outcome::Static => (self.value.clone(), None),
            Outcome::Value(value) => (value, None),
            Outcome::SideEffect(job) => (self.value.clone(), Some(job)),
        }
    }
}

fn number<T: std::str::FromStr>(spec: &VariationSpec, key: &str) -> Result<Option<T>, String> {
    spec.param(key)
        .map(|text| {
            text.parse()
                .map_err(|_| format!("{} parameter {key}='{text}' is not a valid number", spec.name))
        })
        .transpose()
}

fn counter(spec: &VariationSpec, value: &Value) -> Result<CounterState, String> {
    let recorded = match value {
        Value::Integer(v) => *v as i64 as u64,
        Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => *v as u64,
        Value::Counter64(v) => *v,
        _ => {
            return Err(
                "counter needs an integer, counter32, counter64, gauge32 or timeticks value".into(),
            );
        }
    };
    Ok(CounterState {
        start: number(spec, "start")?.unwrap_or(recorded),
        step: number(spec, "step")?.unwrap_or(1),
        calls: AtomicU64::new(0),
    })
}

fn notify(spec: &VariationSpec, oid: &Oid) -> Result<NotifyState, String> {
    let target = spec
        .param("target")
        .ok_or("notify needs a target=host:port parameter")?;
    let target: SocketAddr = match target.parse() {
        Ok(addr) => addr,
        Err(_) => target
            .parse::<std::net::IpAddr>()
            .map(|ip| SocketAddr::new(ip, 162))
            .map_err(|_| format!("notify target '{target}' is not an address"))?,
    };

    let security = match spec.param("user") {
        Some(user) => Security::Usm {
            user: Bytes::copy_from_slice(user.as_bytes()),
        },
        None => {
            let version = match spec.param("version") {
                None => Version::V2c,
                Some(text) => match text.parse::<Version>()? {
                    Version::V3 => return Err("notify version=3 needs a user=name parameter".into()),
                    version => version,
                },
            };
            let community = spec.param("community").unwrap_or("public");
            Security::Community {
                version,
                community: Bytes::copy_from_slice(community.as_bytes()),
            }
        }
    };

    let kind = match spec.param("kind") {
        Some(text) => text.parse()?,
        None => NotifyKind::Trap,
    };
    if kind == NotifyKind::Inform && security.version() == Version::V1 {
        return Err("SNMPv1 has no inform".into());
    }

    let trap_oid = match spec.param("trap-oid") {
        Some(text) => Oid::parse(text).map_err(|e| e.to_string())?,
        None => oids::cold_start(),
    };

    let payload = match spec.param("payload") {
        Some(list) => list
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Oid::parse(s).map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?,
        None => vec![oid.clone()],
    };

    let on = match spec.param("on") {
        None | Some("write") => Trigger::Write,
        Some("read") => Trigger::Read,
        Some("any") => Trigger::Any,
        Some(other) => return Err(format!("notify on='{other}' is not read, write or any")),
    };

    Ok(NotifyState {
        target,
        security,
        kind,
        trap_oid,
        payload,
        on,
    })
}
