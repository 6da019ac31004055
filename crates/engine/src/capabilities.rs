#![forbid(unsafe_code)]

//! External-capability seams. The reasoning engine, vendor catalog, cultural
//! knowledge base, notification channel, and embedding model are all outside
//! this system; the engine consumes them through these traits. The default
//! implementations are deterministic stand-ins good enough for the runner and
//! for tests.

use crate::context::ScopeTag;
use crate::router::{WorkerName, WorkerRegistry};
use pl_storage::TurnRow;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq)]
pub struct ActionDecision {
    pub worker: WorkerName,
    pub arguments: Value,
}

/// Text-in/structured-out reasoning. `classify_intent` is infallible by
/// contract: implementations fall back to `Minimal` rather than failing the
/// turn. `decide_action` sees the assembled payload and the worker registry
/// descriptions, never raw history.
pub trait ReasoningCapability {
    fn classify_intent(&self, message: &str) -> ScopeTag;

    fn decide_action(&self, payload: &Value, registry: &WorkerRegistry) -> Option<ActionDecision>;

    /// Collapse older turns into a rolling summary.
    fn summarize(&self, prior_summary: &str, turns: &[TurnRow]) -> String;
}

#[derive(Clone, Debug)]
pub struct CatalogVendor {
    pub name: String,
    pub category: String,
    pub city: Option<String>,
    pub rating: Option<f64>,
    pub price_cents: Option<i64>,
}

/// External vendor catalog. Read-only from the engine's point of view.
pub trait VendorCatalog {
    fn search(&self, category: &str, query: &str, limit: usize) -> Vec<CatalogVendor>;
}

/// External cultural knowledge base. Read-only.
pub trait KnowledgeSource {
    fn lookup(&self, tradition: &str, topic: &str) -> Option<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Failed,
}

/// Fire-and-forget notification channel. Transitions never depend on the
/// outcome; a failed send is logged and dropped.
pub trait NotificationSender {
    fn notify(&self, recipients: &[String], template_id: &str, payload: &Value) -> NotifyOutcome;
}

/// Text embedding for semantic recall.
pub trait Embedder {
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Keyword-driven classifier and planner, the zero-dependency stand-in for a
/// real reasoning engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordReasoner;

impl ReasoningCapability for KeywordReasoner {
    fn classify_intent(&self, message: &str) -> ScopeTag {
        let text = message.to_lowercase();
        if text.is_empty() {
            return ScopeTag::Minimal;
        }
        let has = |keys: &[&str]| keys.iter().any(|k| text.contains(k));
        if has(&["overview", "everything", "where are we", "status"]) {
            return ScopeTag::FullFallback;
        }
        if has(&[
            "venue", "hall", "banquet", "resort", "vendor", "photographer", "caterer", "dj",
            "band", "music", "book",
        ]) {
            return ScopeTag::Vendor;
        }
        if has(&["budget", "cost", "expense", "money", "spend"]) {
            return ScopeTag::Budget;
        }
        if has(&["guest", "rsvp", "invite", "invitation"]) {
            return ScopeTag::Guest;
        }
        if has(&["timeline", "deadline", "due", "schedule", "task"]) {
            return ScopeTag::Timeline;
        }
        ScopeTag::Minimal
    }

    fn decide_action(&self, payload: &Value, registry: &WorkerRegistry) -> Option<ActionDecision> {
        let scope = payload.get("scope").and_then(Value::as_str)?;
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let worker = match ScopeTag::parse(scope)? {
            ScopeTag::Vendor => WorkerName::Vendor,
            ScopeTag::Budget => WorkerName::Budget,
            ScopeTag::Guest => WorkerName::Guest,
            ScopeTag::Timeline => WorkerName::Timeline,
            ScopeTag::Minimal | ScopeTag::FullFallback => return None,
        };
        registry.find(worker)?;
        let arguments = match worker {
            WorkerName::Vendor => {
                let category = if message.contains("photo") {
                    "photographer"
                } else if message.contains("cater") || message.contains("food") {
                    "caterer"
                } else if message.contains("dj") || message.contains("band") || message.contains("music") {
                    "entertainment"
                } else {
                    "venue"
                };
                json!({ "op": "search", "category": category, "query": message })
            }
            WorkerName::Budget => json!({ "op": "summary" }),
            WorkerName::Guest => json!({ "op": "list" }),
            WorkerName::Timeline => json!({ "op": "list" }),
            WorkerName::Creative | WorkerName::Cultural => return None,
        };
        Some(ActionDecision { worker, arguments })
    }

    fn summarize(&self, prior_summary: &str, turns: &[TurnRow]) -> String {
        let mut parts = Vec::new();
        if !prior_summary.trim().is_empty() {
            parts.push(prior_summary.trim().to_string());
        }
        for turn in turns {
            let line = turn.content.trim().replace('\n', " ");
            if !line.is_empty() {
                parts.push(format!("{}: {}", turn.speaker, line));
            }
        }
        crate::support::truncate_chars(&parts.join(" | "), 600)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyCatalog;

impl VendorCatalog for EmptyCatalog {
    fn search(&self, _category: &str, _query: &str, _limit: usize) -> Vec<CatalogVendor> {
        Vec::new()
    }
}

/// Fixed in-memory catalog for the runner and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    pub vendors: Vec<CatalogVendor>,
}

impl VendorCatalog for StaticCatalog {
    fn search(&self, category: &str, _query: &str, limit: usize) -> Vec<CatalogVendor> {
        self.vendors
            .iter()
            .filter(|v| v.category == category)
            .take(limit)
            .cloned()
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyKnowledge;

impl KnowledgeSource for EmptyKnowledge {
    fn lookup(&self, _tradition: &str, _topic: &str) -> Option<String> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl NotificationSender for NoopNotifier {
    fn notify(&self, _recipients: &[String], _template_id: &str, _payload: &Value) -> NotifyOutcome {
        NotifyOutcome::Sent
    }
}

const EMBED_DIM: usize = 64;

/// Token-bucket feature hashing. Not a semantic model, but deterministic and
/// stable across processes, which is what recall tests need.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0f32; EMBED_DIM];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut idx = 0usize;
            for byte in digest.iter().take(8) {
                idx = (idx << 8) | *byte as usize;
            }
            out[idx % EMBED_DIM] += 1.0;
        }
        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in out.iter_mut() {
                *v /= norm;
            }
        }
        out
    }
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
