#![forbid(unsafe_code)]

mod text;
mod time;
mod turn_log;

pub(crate) use text::*;
pub(crate) use time::*;
pub(crate) use turn_log::TurnLog;
