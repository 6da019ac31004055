#![forbid(unsafe_code)]

use super::dispatch::{WorkerCtx, WorkerOutcome};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Store tables a worker may write. Write-ownership is declared here and
/// checked once at registry construction: exactly one worker per table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Table {
    Shortlist,
    Bookings,
    BudgetItems,
    Guests,
    Tasks,
    TimelineEvents,
    BoardItems,
    RitualNotes,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Shortlist => "shortlist",
            Table::Bookings => "bookings",
            Table::BudgetItems => "budget_items",
            Table::Guests => "guests",
            Table::Tasks => "tasks",
            Table::TimelineEvents => "timeline_events",
            Table::BoardItems => "board_items",
            Table::RitualNotes => "ritual_notes",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum WorkerName {
    Vendor,
    Budget,
    Guest,
    Timeline,
    Creative,
    Cultural,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerName::Vendor => "vendor",
            WorkerName::Budget => "budget",
            WorkerName::Guest => "guest",
            WorkerName::Timeline => "timeline",
            WorkerName::Creative => "creative",
            WorkerName::Cultural => "cultural",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "vendor" => Some(WorkerName::Vendor),
            "budget" => Some(WorkerName::Budget),
            "guest" => Some(WorkerName::Guest),
            "timeline" => Some(WorkerName::Timeline),
            "creative" => Some(WorkerName::Creative),
            "cultural" => Some(WorkerName::Cultural),
            _ => None,
        }
    }
}

pub type WorkerHandler = fn(&mut WorkerCtx<'_>, &Value) -> WorkerOutcome;

#[derive(Clone)]
pub struct WorkerSpec {
    pub name: WorkerName,
    pub description: &'static str,
    pub args_schema: Value,
    pub required_args: &'static [&'static str],
    pub owned_tables: &'static [Table],
    pub handler: WorkerHandler,
}

impl std::fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("owned_tables", &self.owned_tables)
            .finish()
    }
}

pub struct WorkerRegistry {
    specs: Vec<WorkerSpec>,
    by_name: BTreeMap<WorkerName, usize>,
}

impl WorkerRegistry {
    fn build() -> Self {
        let mut specs = Vec::new();
        crate::workers::register_all(&mut specs);

        if let Err(message) = check_single_writer(&specs) {
            panic!("worker registry wiring error: {message}");
        }

        let mut by_name = BTreeMap::new();
        for (idx, spec) in specs.iter().enumerate() {
            if by_name.insert(spec.name, idx).is_some() {
                panic!("worker registered twice: {}", spec.name.as_str());
            }
        }
        Self { specs, by_name }
    }

    pub fn global() -> &'static WorkerRegistry {
        static REGISTRY: OnceLock<WorkerRegistry> = OnceLock::new();
        REGISTRY.get_or_init(WorkerRegistry::build)
    }

    pub fn find(&self, name: WorkerName) -> Option<&WorkerSpec> {
        self.by_name.get(&name).and_then(|idx| self.specs.get(*idx))
    }

    pub fn specs(&self) -> &[WorkerSpec] {
        &self.specs
    }

    /// Capability descriptions handed to the reasoning engine alongside the
    /// context payload: name, what it does, its argument schema, and the
    /// tables it owns. Never handlers, never history.
    pub fn descriptions(&self) -> Value {
        Value::Array(
            self.specs
                .iter()
                .map(|spec| {
                    json!({
                        "name": spec.name.as_str(),
                        "description": spec.description,
                        "args_schema": spec.args_schema,
                        "owned_tables": spec
                            .owned_tables
                            .iter()
                            .map(|t| t.as_str())
                            .collect::<Vec<_>>(),
                    })
                })
                .collect(),
        )
    }
}

/// Every table has exactly one writer. Two workers declaring the same table
/// is a wiring bug, reported before the registry is usable at all.
pub fn check_single_writer(specs: &[WorkerSpec]) -> Result<(), String> {
    let mut seen: BTreeMap<Table, WorkerName> = BTreeMap::new();
    let mut names = BTreeSet::new();
    for spec in specs {
        if !names.insert(spec.name) {
            return Err(format!("worker {} registered twice", spec.name.as_str()));
        }
        for table in spec.owned_tables {
            if let Some(prior) = seen.insert(*table, spec.name) {
                return Err(format!(
                    "table {} claimed by both {} and {}",
                    table.as_str(),
                    prior.as_str(),
                    spec.name.as_str()
                ));
            }
        }
    }
    Ok(())
}
