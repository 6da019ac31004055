#![forbid(unsafe_code)]

//! Provisioning from the embedded template pack: the standard workflows and
//! the task seed list created when a root activates. Due dates are computed
//! here, once, from the root's target date minus the per-template offset.

use crate::error::{EngineError, ValidationKind};
use pl_core::ids::RootId;
use pl_core::model::{ApprovalPolicy, Party, TaskStatus};
use pl_storage::{CreateWorkflowRequest, SqliteStore, TaskCreateRequest};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const DAY_MS: i64 = 86_400_000;
const TEMPLATE_PACK: &str = include_str!("templates.yaml");

#[derive(Clone, Debug, Deserialize)]
struct TemplatePack {
    workflows: Vec<WorkflowTemplate>,
    tasks: Vec<TaskTemplate>,
}

#[derive(Clone, Debug, Deserialize)]
struct WorkflowTemplate {
    name: String,
}

#[derive(Clone, Debug, Deserialize)]
struct TaskTemplate {
    title: String,
    workflow: String,
    owner: String,
    approval: String,
    category: String,
    due_offset_days: i64,
    #[serde(default)]
    description: Option<String>,
}

fn pack() -> &'static TemplatePack {
    static PACK: OnceLock<TemplatePack> = OnceLock::new();
    // Wiring check at first use: a malformed embedded pack is a build
    // defect, same class as a mis-registered worker.
    PACK.get_or_init(|| {
        serde_yaml::from_str(TEMPLATE_PACK).expect("embedded template pack must parse")
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProvisionReport {
    pub workflows: usize,
    pub tasks: usize,
}

pub fn provision(store: &mut SqliteStore, root: &RootId) -> Result<ProvisionReport, EngineError> {
    let map_err = |err| EngineError::from_store(err, "provisioning");

    let root_row = store
        .get_root(root)
        .map_err(map_err)?
        .ok_or_else(|| {
            EngineError::Validation(ValidationKind::UnknownEntity {
                entity: "the plan".to_string(),
            })
        })?;
    let pack = pack();

    let mut workflow_ids: BTreeMap<&str, String> = BTreeMap::new();
    for template in &pack.workflows {
        let row = store
            .create_workflow(
                root,
                CreateWorkflowRequest {
                    name: template.name.clone(),
                    context_summary_json: None,
                    related_ids_json: None,
                    event_payload_json: json!({ "provisioned": true }).to_string(),
                },
            )
            .map_err(map_err)?;
        workflow_ids.insert(template.name.as_str(), row.id);
    }

    let mut requests = Vec::with_capacity(pack.tasks.len());
    for template in &pack.tasks {
        let owner = Party::parse(&template.owner).ok_or(EngineError::Validation(
            ValidationKind::InvalidInput("task template owner is not a known party"),
        ))?;
        let policy = ApprovalPolicy::parse(&template.approval).ok_or(EngineError::Validation(
            ValidationKind::InvalidInput("task template approval policy is unknown"),
        ))?;
        requests.push(TaskCreateRequest {
            workflow_id: workflow_ids.get(template.workflow.as_str()).cloned(),
            title: template.title.clone(),
            description: template.description.clone(),
            status: TaskStatus::NotStarted,
            owning_party: owner,
            approval_policy: policy,
            category: Some(template.category.clone()),
            due_date_ms: root_row
                .target_date_ms
                .map(|target| target - template.due_offset_days * DAY_MS),
            due_offset_days: Some(template.due_offset_days),
            subject_ids_json: None,
        });
    }
    let created = store.create_tasks_bulk(root, requests).map_err(map_err)?;

    Ok(ProvisionReport {
        workflows: pack.workflows.len(),
        tasks: created.len(),
    })
}
