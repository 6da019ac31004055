#![forbid(unsafe_code)]

//! Domain-scoped workers. Each one is the exclusive writer for the tables it
//! declares in its registration; status-ladder changes stay with the state
//! machine. Handlers return structured outcomes only; reply text is the
//! router's job.

mod budget;
mod creative;
mod cultural;
mod guest;
mod timeline;
mod vendor;

use crate::router::WorkerSpec;
use serde_json::Value;

pub(crate) fn register_all(specs: &mut Vec<WorkerSpec>) {
    vendor::register(specs);
    budget::register(specs);
    guest::register(specs);
    timeline::register(specs);
    creative::register(specs);
    cultural::register(specs);
}

pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) fn arg_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(Value::as_i64)
}
