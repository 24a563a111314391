//! In-memory stand-in for a Zabbix instance
//!
//! Behaves like the real API where the engine depends on it: names are unique
//! per resource, creates of an existing name conflict, deletes of unknown ids
//! report "does not exist", and configuration import upserts by name.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;

use zabbix_migrate::client::ZabbixApi;
use zabbix_migrate::error::{MigrateError, Result};

// resource, id field, name field, export option
const RESOURCES: [(&str, &str, &str, &str); 7] = [
    ("template", "templateid", "host", "templates"),
    ("hostgroup", "groupid", "name", "groups"),
    ("host", "hostid", "host", "hosts"),
    ("mediatype", "mediatypeid", "name", "mediaTypes"),
    ("service", "serviceid", "name", ""),
    ("proxy", "proxyid", "host", ""),
    ("action", "actionid", "name", ""),
];

fn fields(resource: &str) -> (&'static str, &'static str) {
    RESOURCES
        .iter()
        .find(|(r, ..)| *r == resource)
        .map(|(_, id, name, _)| (*id, *name))
        .unwrap_or_else(|| panic!("unknown resource {resource}"))
}

fn resource_for_option(option: &str) -> &'static str {
    RESOURCES
        .iter()
        .find(|(.., opt)| !opt.is_empty() && *opt == option)
        .map(|(r, ..)| *r)
        .unwrap_or_else(|| panic!("unknown export option {option}"))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Create rejection: payloads of `resource` holding `field` = `value` anywhere
struct Rejection {
    resource: String,
    field: String,
    value: String,
    transport: bool,
}

#[derive(Default)]
struct State {
    objects: HashMap<String, Vec<Value>>,
    next_id: u64,
    import_conflicts: HashMap<String, usize>,
    delete_failures: HashMap<String, usize>,
    rejections: Vec<Rejection>,
    calls: Vec<String>,
}

fn holds(value: &Value, field: &str, wanted: &str) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, child)| {
            (key == field && text(child) == wanted) || holds(child, field, wanted)
        }),
        Value::Array(items) => items.iter().any(|item| holds(item, field, wanted)),
        _ => false,
    }
}

pub struct FakeZabbix {
    state: RefCell<State>,
}

impl FakeZabbix {
    /// Instance whose newly created objects are numbered from `first_id`
    pub fn new(first_id: u64) -> Self {
        FakeZabbix {
            state: RefCell::new(State {
                next_id: first_id,
                ..State::default()
            }),
        }
    }

    pub fn with(self, resource: &str, objects: Vec<Value>) -> Self {
        self.state
            .borrow_mut()
            .objects
            .entry(resource.to_string())
            .or_default()
            .extend(objects);
        self
    }

    /// Make the next `times` configuration imports of `resource` conflict
    pub fn fail_imports(&self, resource: &str, times: usize) {
        self.state
            .borrow_mut()
            .import_conflicts
            .insert(resource.to_string(), times);
    }

    /// Make the next `times` deletes of `resource` fail with an API error
    pub fn fail_deletes(&self, resource: &str, times: usize) {
        self.state
            .borrow_mut()
            .delete_failures
            .insert(resource.to_string(), times);
    }

    /// Refuse creates the way the platform refuses a dangling reference
    pub fn reject_creates_referencing(&self, resource: &str, field: &str, value: &str) {
        self.add_rejection(resource, field, value, false);
    }

    /// Drop the connection on creates referencing `field` = `value`
    pub fn drop_creates_referencing(&self, resource: &str, field: &str, value: &str) {
        self.add_rejection(resource, field, value, true);
    }

    fn add_rejection(&self, resource: &str, field: &str, value: &str, transport: bool) {
        self.state.borrow_mut().rejections.push(Rejection {
            resource: resource.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            transport,
        });
    }

    pub fn objects(&self, resource: &str) -> Vec<Value> {
        self.state
            .borrow()
            .objects
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, resource: &str, name: &str) -> Option<Value> {
        let (_, name_field) = fields(resource);
        self.objects(resource)
            .into_iter()
            .find(|o| o.get(name_field).map(text).as_deref() == Some(name))
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn log(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn assign_id(&self) -> String {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        id.to_string()
    }

    // Insert, or overwrite the fields of the object with the same name
    fn upsert(&self, resource: &str, mut object: Value) {
        let (id_field, name_field) = fields(resource);
        let name = object.get(name_field).map(text);
        let existing = name.as_deref().and_then(|n| self.find(resource, n));

        let id = match existing {
            Some(current) => text(&current[id_field]),
            None => self.assign_id(),
        };
        object[id_field] = Value::String(id.clone());

        let mut state = self.state.borrow_mut();
        let list = state.objects.entry(resource.to_string()).or_default();
        match list.iter_mut().find(|o| o.get(id_field).map(text).as_deref() == Some(id.as_str())) {
            Some(slot) => *slot = object,
            None => list.push(object),
        }
    }
}

impl ZabbixApi for FakeZabbix {
    fn get(&self, resource: &str, params: Value) -> Result<Vec<Value>> {
        self.log(format!("{resource}.get"));

        let mut found = self.objects(resource);
        if let Some(filter) = params.get("filter").and_then(Value::as_object) {
            found.retain(|object| {
                filter
                    .iter()
                    .all(|(key, wanted)| object.get(key).map(text) == Some(text(wanted)))
            });
        }

        let output = params.get("output").cloned().unwrap_or(json!("extend"));
        let keep: Option<Vec<String>> = match &output {
            Value::String(s) if s == "extend" => None,
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => Some(items.iter().map(text).collect()),
            _ => None,
        };

        Ok(found
            .into_iter()
            .map(|object| match &keep {
                None => object,
                Some(keys) => {
                    let mut trimmed = Map::new();
                    for key in keys {
                        if let Some(value) = object.get(key) {
                            trimmed.insert(key.clone(), value.clone());
                        }
                    }
                    Value::Object(trimmed)
                }
            })
            .collect())
    }

    fn create(&self, resource: &str, object: &Value) -> Result<String> {
        self.log(format!("{resource}.create"));
        let (id_field, name_field) = fields(resource);

        if object.get(id_field).is_some() {
            return Err(MigrateError::Remote {
                method: format!("{resource}.create"),
                code: -32602,
                message: "Invalid params.".to_string(),
                data: format!("unexpected parameter \"{id_field}\""),
            });
        }

        let rejected = self
            .state
            .borrow()
            .rejections
            .iter()
            .find(|r| r.resource == resource && holds(object, &r.field, &r.value))
            .map(|r| r.transport);
        match rejected {
            Some(true) => {
                return Err(MigrateError::Transport {
                    method: format!("{resource}.create"),
                    message: "connection reset by peer".to_string(),
                })
            }
            Some(false) => {
                return Err(MigrateError::RemoteNotFound {
                    method: format!("{resource}.create"),
                    message: "No permissions to referred object or it does not exist!".to_string(),
                })
            }
            None => {}
        }

        let name = object.get(name_field).map(text).unwrap_or_default();
        if self.find(resource, &name).is_some() {
            return Err(MigrateError::RemoteConflict {
                method: format!("{resource}.create"),
                message: format!("\"{name}\" already exists."),
            });
        }

        let id = self.assign_id();
        let mut stored = object.clone();
        stored[id_field] = Value::String(id.clone());
        self.state
            .borrow_mut()
            .objects
            .entry(resource.to_string())
            .or_default()
            .push(stored);
        Ok(id)
    }

    fn update(&self, resource: &str, object: &Value) -> Result<String> {
        self.log(format!("{resource}.update"));
        let (id_field, _) = fields(resource);
        let id = object.get(id_field).map(text).unwrap_or_default();

        let mut state = self.state.borrow_mut();
        let list = state.objects.entry(resource.to_string()).or_default();
        match list.iter_mut().find(|o| o.get(id_field).map(text).as_deref() == Some(id.as_str())) {
            Some(slot) => {
                for (key, value) in object.as_object().into_iter().flatten() {
                    slot[key.as_str()] = value.clone();
                }
                Ok(id)
            }
            None => Err(MigrateError::RemoteNotFound {
                method: format!("{resource}.update"),
                message: "No permissions to referred object or it does not exist!".to_string(),
            }),
        }
    }

    fn delete(&self, resource: &str, ids: &[String]) -> Result<()> {
        self.log(format!("{resource}.delete {}", ids.join(",")));
        let (id_field, _) = fields(resource);

        let mut state = self.state.borrow_mut();
        if let Some(remaining) = state.delete_failures.get_mut(resource) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(MigrateError::Remote {
                    method: format!("{resource}.delete"),
                    code: -32500,
                    message: "Application error.".to_string(),
                    data: "Cannot delete host group: it is used by a discovery rule.".to_string(),
                });
            }
        }
        let list = state.objects.entry(resource.to_string()).or_default();
        let known = |id: &String| {
            list.iter()
                .any(|o| o.get(id_field).map(text).as_deref() == Some(id.as_str()))
        };
        if !ids.iter().all(known) {
            return Err(MigrateError::RemoteNotFound {
                method: format!("{resource}.delete"),
                message: "No permissions to referred object or it does not exist!".to_string(),
            });
        }

        list.retain(|o| {
            let id = o.get(id_field).map(text).unwrap_or_default();
            !ids.contains(&id)
        });
        Ok(())
    }

    fn export_configuration(&self, options: Value) -> Result<String> {
        self.log("configuration.export".to_string());
        let mut export = Map::new();

        for (option, ids) in options.as_object().into_iter().flatten() {
            let resource = resource_for_option(option);
            let (id_field, _) = fields(resource);
            let wanted: Vec<String> = ids.as_array().into_iter().flatten().map(text).collect();

            let exported: Vec<Value> = self
                .objects(resource)
                .into_iter()
                .filter(|o| wanted.contains(&o.get(id_field).map(text).unwrap_or_default()))
                .map(|mut o| {
                    // exports carry names, never ids
                    if let Some(map) = o.as_object_mut() {
                        map.remove(id_field);
                    }
                    o
                })
                .collect();
            export.insert(option.clone(), Value::Array(exported));
        }

        Ok(json!({"zabbix_export": export}).to_string())
    }

    fn import_configuration(&self, source: &str, rules: &Value) -> Result<()> {
        self.log("configuration.import".to_string());
        assert_eq!(rules["hosts"]["createMissing"], json!(true), "import rules not sent");

        let document: Value = serde_json::from_str(source).expect("import source is JSON");
        let sections = document["zabbix_export"].as_object().cloned().unwrap_or_default();

        for (option, objects) in sections {
            let resource = resource_for_option(&option);

            {
                let mut state = self.state.borrow_mut();
                if let Some(remaining) = state.import_conflicts.get_mut(resource) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(MigrateError::RemoteConflict {
                            method: "configuration.import".to_string(),
                            message: format!("{resource} already exists."),
                        });
                    }
                }
            }

            for object in objects.as_array().cloned().unwrap_or_default() {
                self.upsert(resource, object);
            }
        }

        Ok(())
    }
}

/// Source instance used across the workflow tests
pub fn source_instance() -> FakeZabbix {
    FakeZabbix::new(50000)
        .with(
            "template",
            vec![json!({
                "templateid": "10108",
                "host": "web-tier",
                "name": "Web tier",
                "description": "nginx + php"
            })],
        )
        .with(
            "hostgroup",
            vec![
                json!({"groupid": "8", "name": "legacy", "internal": "0"}),
                json!({"groupid": "10", "name": "linux", "internal": "0"}),
            ],
        )
        .with(
            "host",
            vec![json!({"hostid": "10084", "host": "web-01", "status": "0"})],
        )
        .with(
            "mediatype",
            vec![json!({"mediatypeid": "1", "name": "Email", "type": "0"})],
        )
        .with(
            "service",
            vec![json!({"serviceid": "1", "name": "Checkout", "algorithm": "1", "sortorder": "0"})],
        )
        .with(
            "proxy",
            vec![json!({
                "proxyid": "10255",
                "host": "edge-1",
                "status": "5",
                "lastaccess": "1700000000",
                "auto_compress": "1"
            })],
        )
        .with(
            "action",
            vec![
                json!({
                    "actionid": "7",
                    "name": "Notify admins",
                    "eventsource": "0",
                    "status": "0",
                    "esc_period": "1h",
                    "maintenance_mode": "1",
                    "filter": {
                        "evaltype": "0",
                        "eval_formula": "A",
                        "conditions": [{
                            "conditiontype": "0",
                            "operator": "0",
                            "value": "8",
                            "formulaid": "A"
                        }]
                    },
                    "operations": [
                        {
                            "operationid": "11",
                            "actionid": "7",
                            "operationtype": "0",
                            "opmessage_grp": [{"operationid": "11", "usrgrpid": "7"}]
                        }
                    ]
                }),
                json!({
                    "actionid": "5",
                    "name": "Auto registration",
                    "eventsource": "2",
                    "status": "0",
                    "esc_period": "0",
                    "pause_suppressed": "1",
                    "filter": {"evaltype": "0", "eval_formula": "", "conditions": []},
                    "operations": [
                        {
                            "operationid": "3",
                            "actionid": "5",
                            "operationtype": "6",
                            "optemplate": [{"operationid": "3", "templateid": "10108"}]
                        },
                        {
                            "operationid": "4",
                            "actionid": "5",
                            "operationtype": "4",
                            "opgroup": [
                                {"operationid": "4", "groupid": "10"},
                                {"operationid": "4", "groupid": "8"}
                            ]
                        }
                    ]
                }),
            ],
        )
}

/// Destination instance with its own numbering and one drifted template
pub fn destination_instance() -> FakeZabbix {
    FakeZabbix::new(30000)
        .with(
            "template",
            vec![
                json!({
                    "templateid": "20055",
                    "host": "web-tier",
                    "name": "Web tier",
                    "description": "outdated"
                }),
                json!({
                    "templateid": "10108",
                    "host": "other-template",
                    "name": "Other",
                    "description": ""
                }),
            ],
        )
        .with(
            "hostgroup",
            vec![json!({"groupid": "2", "name": "linux", "internal": "0"})],
        )
        .with(
            "service",
            vec![json!({"serviceid": "4", "name": "Checkout", "algorithm": "0", "sortorder": "0"})],
        )
}
