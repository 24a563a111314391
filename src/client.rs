//! Access to the Zabbix JSON-RPC API
//!
//! The engine only talks to the platform through the [`ZabbixApi`] trait, so
//! backup and restore can run against [`JsonRpcClient`] in production and an
//! in-memory fake in tests.

use serde::Deserialize;
use serde_json::{json, Value};
use std::cell::Cell;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{MigrateError, Result};

/// Typed access to the platform's object collections
pub trait ZabbixApi {
    /// `<resource>.get` with the given parameters
    fn get(&self, resource: &str, params: Value) -> Result<Vec<Value>>;

    /// `<resource>.create`, returning the id assigned by the platform
    fn create(&self, resource: &str, object: &Value) -> Result<String>;

    /// `<resource>.update`, returning the id of the updated object
    fn update(&self, resource: &str, object: &Value) -> Result<String>;

    /// `<resource>.delete` for the given ids
    fn delete(&self, resource: &str, ids: &[String]) -> Result<()>;

    /// `configuration.export` in JSON format; `options` maps an element type
    /// such as `templates` to the ids to export
    fn export_configuration(&self, options: Value) -> Result<String>;

    /// `configuration.import` of a JSON document under the given rules
    fn import_configuration(&self, source: &str, rules: &Value) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

/// Map a JSON-RPC error to the engine's taxonomy
///
/// Zabbix reports collisions and missing objects with generic codes, so the
/// classification goes by the detail text.
pub fn classify_error(method: &str, code: i64, message: &str, data: &str) -> MigrateError {
    let detail = format!("{message} {data}");
    let lower = detail.to_lowercase();

    if lower.contains("not authorized")
        || lower.contains("not authorised")
        || lower.contains("session terminated")
        || lower.contains("incorrect user name or password")
        || lower.contains("login name or password is incorrect")
    {
        MigrateError::Unauthorized {
            method: method.to_string(),
            message: detail.trim().to_string(),
        }
    } else if lower.contains("already exist") {
        MigrateError::RemoteConflict {
            method: method.to_string(),
            message: detail.trim().to_string(),
        }
    } else if lower.contains("does not exist")
        || lower.contains("no permissions to referred object")
    {
        MigrateError::RemoteNotFound {
            method: method.to_string(),
            message: detail.trim().to_string(),
        }
    } else {
        MigrateError::Remote {
            method: method.to_string(),
            code,
            message: message.to_string(),
            data: data.to_string(),
        }
    }
}

/// Server API version as `(major, minor)`, parsed from `apiinfo.version`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ApiVersion(pub u32, pub u32);

impl ApiVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(ApiVersion(major, minor))
    }

    /// 5.4 renamed the `user.login` parameter `user` to `username`
    pub fn login_params(self, user: &str, password: &str) -> Value {
        if self >= ApiVersion(5, 4) {
            json!({"username": user, "password": password})
        } else {
            json!({"user": user, "password": password})
        }
    }

    /// 6.4 accepts the session token as a bearer header; 7.2 no longer
    /// accepts the `auth` envelope field at all
    pub fn uses_bearer_token(self) -> bool {
        self >= ApiVersion(6, 4)
    }
}

/// Methods that must be sent without a session token
const UNAUTHENTICATED_METHODS: [&str; 2] = ["apiinfo.version", "user.login"];

/// Blocking JSON-RPC client authenticated with a session token
pub struct JsonRpcClient {
    http: reqwest::blocking::Client,
    url: String,
    auth: Option<String>,
    version: Option<ApiVersion>,
    next_id: Cell<u64>,
}

impl JsonRpcClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| MigrateError::Transport {
                method: "client".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(JsonRpcClient {
            http,
            url: settings.api_url(),
            auth: None,
            version: None,
            next_id: Cell::new(1),
        })
    }

    /// Probe the API version, then log in with the configured credentials
    pub fn connect(settings: &Settings) -> Result<Self> {
        let mut client = Self::new(settings)?;
        log::info!("Logging in using url={} ...", client.url);

        let version = client.api_version()?;
        log::info!("Zabbix API version {version}");
        client.version = ApiVersion::parse(&version);
        if client.version.is_none() {
            log::warn!("Unrecognised API version \"{version}\"; assuming a current server");
        }

        client.login(&settings.user, &settings.password)?;
        Ok(client)
    }

    pub fn login(&mut self, user: &str, password: &str) -> Result<()> {
        let version = self.version.unwrap_or(ApiVersion(7, 0));
        let token = self.call("user.login", version.login_params(user, password))?;
        let token = token.as_str().ok_or_else(|| MigrateError::Transport {
            method: "user.login".to_string(),
            message: format!("unexpected login result: {token}"),
        })?;
        self.auth = Some(token.to_string());
        Ok(())
    }

    pub fn api_version(&self) -> Result<String> {
        let version = self.call("apiinfo.version", json!([]))?;
        Ok(version.as_str().unwrap_or_default().to_string())
    }

    // Token to attach to `method`, if any
    fn token_for(&self, method: &str) -> Option<&str> {
        if UNAUTHENTICATED_METHODS.contains(&method) {
            return None;
        }
        self.auth.as_deref()
    }

    fn bearer(&self) -> bool {
        self.version.is_some_and(ApiVersion::uses_bearer_token)
    }

    /// JSON-RPC 2.0 request body for one call
    fn envelope(&self, method: &str, params: Value, id: u64) -> Value {
        let mut body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });
        if let Some(token) = self.token_for(method) {
            if !self.bearer() {
                body["auth"] = Value::String(token.to_string());
            }
        }
        body
    }

    /// Send one JSON-RPC request and return its `result`
    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let body = self.envelope(method, params, id);

        log::trace!("-> {method} (id {id})");
        let transport = |message: String| MigrateError::Transport {
            method: method.to_string(),
            message,
        };

        let mut request = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json-rpc")
            .json(&body);
        if let Some(token) = self.token_for(method).filter(|_| self.bearer()) {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(transport(format!("HTTP status {status}")));
        }

        let reply: RpcResponse = response
            .json()
            .map_err(|e| transport(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(err) = reply.error {
            let data = err.data.unwrap_or_default();
            return Err(classify_error(method, err.code, &err.message, &data));
        }

        reply
            .result
            .ok_or_else(|| transport("response carries neither result nor error".to_string()))
    }
}

/// First id of the `<id>s` array returned by create/update calls
fn first_returned_id(method: &str, result: &Value) -> Result<String> {
    result
        .as_object()
        .and_then(|obj| obj.values().find_map(Value::as_array))
        .and_then(|ids| ids.first())
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| MigrateError::Transport {
            method: method.to_string(),
            message: format!("no id in result {result}"),
        })
}

impl ZabbixApi for JsonRpcClient {
    fn get(&self, resource: &str, params: Value) -> Result<Vec<Value>> {
        let method = format!("{resource}.get");
        match self.call(&method, params)? {
            Value::Array(items) => Ok(items),
            other => Err(MigrateError::Transport {
                method,
                message: format!("expected an array, got {other}"),
            }),
        }
    }

    fn create(&self, resource: &str, object: &Value) -> Result<String> {
        let method = format!("{resource}.create");
        let result = self.call(&method, object.clone())?;
        first_returned_id(&method, &result)
    }

    fn update(&self, resource: &str, object: &Value) -> Result<String> {
        let method = format!("{resource}.update");
        let result = self.call(&method, object.clone())?;
        first_returned_id(&method, &result)
    }

    fn delete(&self, resource: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.call(&format!("{resource}.delete"), json!(ids))?;
        Ok(())
    }

    fn export_configuration(&self, options: Value) -> Result<String> {
        let result = self.call(
            "configuration.export",
            json!({"options": options, "format": "json"}),
        )?;
        match result {
            Value::String(source) => Ok(source),
            other => Ok(other.to_string()),
        }
    }

    fn import_configuration(&self, source: &str, rules: &Value) -> Result<()> {
        self.call(
            "configuration.import",
            json!({"format": "json", "source": source, "rules": rules}),
        )?;
        Ok(())
    }
}
