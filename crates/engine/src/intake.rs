#![forbid(unsafe_code)]

//! Two-party intake. The first party creates the root in `onboarding` and
//! names the partner expected to join; the second party's identity is
//! checked against that expectation. Once both primary parties are present
//! the root activates and the standard workflows and task seeds are
//! provisioned.

use crate::capabilities::NotificationSender;
use crate::error::{EngineError, ValidationKind};
use crate::provisioning::provision;
use pl_core::ids::RootId;
use pl_core::model::{Role, RootStatus};
use pl_storage::{CreateRootRequest, RootRow, SqliteStore};
use serde_json::{Value, json};

#[derive(Clone, Debug)]
pub struct IntakeFirstParty {
    pub display_name: String,
    pub target_date_ms: Option<i64>,
    pub identity: String,
    pub expected_partner: Option<String>,
    pub details: Value,
}

#[derive(Clone, Debug)]
pub struct IntakeOutcome {
    pub root: RootId,
    pub activated: bool,
}

pub fn intake_first_party(
    store: &mut SqliteStore,
    request: IntakeFirstParty,
) -> Result<RootRow, EngineError> {
    let IntakeFirstParty {
        display_name,
        target_date_ms,
        identity,
        expected_partner,
        details,
    } = request;

    let mut partner_data = serde_json::Map::new();
    partner_data.insert(identity.clone(), details);
    let details_json = json!({
        "partner_data": Value::Object(partner_data),
        "expected_partner": expected_partner,
    })
    .to_string();

    let row = store
        .create_root(CreateRootRequest {
            display_name,
            target_date_ms,
            details_json,
        })
        .map_err(|err| EngineError::from_store(err, "the plan"))?;
    let root = RootId::try_new(row.id.clone())
        .map_err(|_| EngineError::Validation(ValidationKind::BadRootId))?;
    store
        .add_member(&root, &identity, Role::PrimaryA)
        .map_err(|err| EngineError::from_store(err, "the member"))?;
    Ok(row)
}

pub fn intake_second_party(
    store: &mut SqliteStore,
    notifier: &dyn NotificationSender,
    root: &RootId,
    identity: &str,
    details: &Value,
) -> Result<IntakeOutcome, EngineError> {
    let row = store
        .get_root(root)
        .map_err(|err| EngineError::from_store(err, "the plan"))?
        .ok_or_else(|| {
            EngineError::Validation(ValidationKind::UnknownEntity {
                entity: "the plan".to_string(),
            })
        })?;
    if row.status != RootStatus::Onboarding {
        return Err(EngineError::Validation(ValidationKind::InvalidInput(
            "this plan already finished onboarding",
        )));
    }

    let mut doc: Value =
        serde_json::from_str(&row.details_json).unwrap_or_else(|_| json!({}));
    let expected = doc
        .get("expected_partner")
        .and_then(Value::as_str)
        .map(str::to_string);
    match expected.as_deref() {
        Some(expected) if expected == identity => {}
        other => {
            return Err(EngineError::Validation(ValidationKind::IntakeMismatch {
                expected: other.map(str::to_string),
            }));
        }
    }

    store
        .add_member(root, identity, Role::PrimaryB)
        .map_err(|err| EngineError::from_store(err, "the member"))?;

    if let Some(obj) = doc.as_object_mut() {
        obj.insert("expected_partner".to_string(), Value::Null);
        let partner_data = obj
            .entry("partner_data".to_string())
            .or_insert_with(|| json!({}));
        if let Some(partners) = partner_data.as_object_mut() {
            partners.insert(identity.to_string(), details.clone());
        }
    }
    store
        .set_root_details(root, Some(row.revision), &doc.to_string())
        .map_err(|err| EngineError::from_store(err, "the plan"))?;

    let members = store
        .list_members(root)
        .map_err(|err| EngineError::from_store(err, "members"))?;
    let quorum = members.iter().any(|m| m.role == Role::PrimaryA)
        && members.iter().any(|m| m.role == Role::PrimaryB);
    if !quorum {
        return Ok(IntakeOutcome {
            root: root.clone(),
            activated: false,
        });
    }

    store
        .set_root_status(
            root,
            None,
            RootStatus::Active,
            &json!({ "to": "active" }).to_string(),
        )
        .map_err(|err| EngineError::from_store(err, "the plan"))?;
    provision(store, root)?;

    let recipients: Vec<String> = members.into_iter().map(|m| m.identity).collect();
    let _ = notifier.notify(
        &recipients,
        "root.activated",
        &json!({ "root": root.as_str() }),
    );

    Ok(IntakeOutcome {
        root: root.clone(),
        activated: true,
    })
}
