#![forbid(unsafe_code)]

//! Bounded context assembly. One payload per turn, sized by fixed caps no
//! matter how old the root is: scoped store slices, the rolling summary, the
//! last K raw turns, and the top-M recalled facts. Reconstruction after a
//! month-long pause costs the same as for a root touched a minute ago.

mod assemble;
mod compact;

pub use assemble::assemble_context;
pub(crate) use compact::maybe_compact;

/// Data scope chosen by intent classification. A fixed enumeration: the
/// classifier must return one of these, and falls back to `Minimal` rather
/// than failing the turn.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScopeTag {
    Vendor,
    Budget,
    Guest,
    Timeline,
    Minimal,
    FullFallback,
}

impl ScopeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeTag::Vendor => "vendor",
            ScopeTag::Budget => "budget",
            ScopeTag::Guest => "guest",
            ScopeTag::Timeline => "timeline",
            ScopeTag::Minimal => "minimal",
            ScopeTag::FullFallback => "full_fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vendor" => Some(ScopeTag::Vendor),
            "budget" => Some(ScopeTag::Budget),
            "guest" => Some(ScopeTag::Guest),
            "timeline" => Some(ScopeTag::Timeline),
            "minimal" => Some(ScopeTag::Minimal),
            "full_fallback" => Some(ScopeTag::FullFallback),
            _ => None,
        }
    }
}

/// Fixed size caps for the assembled payload and the compaction cadence.
#[derive(Clone, Copy, Debug)]
pub struct AssemblerCaps {
    /// Max elements per scoped list; overflow is truncated most-recent-first
    /// and flagged.
    pub per_list: usize,
    /// K: raw turns carried verbatim.
    pub recent_turns: usize,
    /// M: recalled facts ranked by similarity to the message.
    pub recall_facts: usize,
    /// N: user turns between window compactions.
    pub compact_every: usize,
    /// How many stored facts are scanned for ranking.
    pub fact_scan: usize,
    /// Facts are compressed to this many chars before entering the payload.
    pub fact_max_chars: usize,
    /// Active workflow saves carried per payload.
    pub workflow_saves: usize,
}

impl Default for AssemblerCaps {
    fn default() -> Self {
        Self {
            per_list: 20,
            recent_turns: 10,
            recall_facts: 5,
            compact_every: 12,
            fact_scan: 256,
            fact_max_chars: 220,
            workflow_saves: 10,
        }
    }
}
