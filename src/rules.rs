use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Create/update/delete policy for one element type of a configuration import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_missing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_existing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_missing: Option<bool>,
}

impl RulePolicy {
    const fn new(create: Option<bool>, update: Option<bool>, delete: Option<bool>) -> Self {
        RulePolicy {
            create_missing: create,
            update_existing: update,
            delete_missing: delete,
        }
    }
}

/// Rules sent with every `configuration.import`, keyed by element type
pub fn import_rules() -> BTreeMap<&'static str, RulePolicy> {
    const Y: Option<bool> = Some(true);
    const N: Option<bool> = Some(false);
    const UNSET: Option<bool> = None;

    BTreeMap::from([
        ("applications", RulePolicy::new(Y, UNSET, N)),
        ("discoveryRules", RulePolicy::new(Y, Y, Y)),
        ("graphs", RulePolicy::new(Y, Y, N)),
        ("groups", RulePolicy::new(Y, UNSET, UNSET)),
        ("hosts", RulePolicy::new(Y, Y, UNSET)),
        ("httptests", RulePolicy::new(Y, Y, N)),
        ("images", RulePolicy::new(Y, Y, UNSET)),
        ("items", RulePolicy::new(Y, Y, Y)),
        ("maps", RulePolicy::new(Y, Y, UNSET)),
        ("mediaTypes", RulePolicy::new(Y, Y, UNSET)),
        ("templateLinkage", RulePolicy::new(Y, UNSET, Y)),
        ("templates", RulePolicy::new(Y, Y, UNSET)),
        ("templateScreens", RulePolicy::new(Y, Y, Y)),
        ("triggers", RulePolicy::new(Y, Y, Y)),
        ("valueMaps", RulePolicy::new(Y, Y, UNSET)),
    ])
}

pub fn import_rules_json() -> Value {
    serde_json::to_value(import_rules()).unwrap_or(Value::Null)
}
