//! Request shapes shared by the resource-management tool groups.
//!
//! Most Admin API tools are a plain list, get, delete, or archive of a
//! child collection under a property. Updates read the current resource,
//! overlay the supplied fields and PATCH it back with an `updateMask`.

use std::sync::Arc;

use rmcp::model::JsonObject;
use serde_json::{Map, Value, json};

use super::args::{ToolError, ToolOutcome, property_name, required_id};
use crate::analytics::{AnalyticsBackend, Api, ApiRequest};

/// `properties/<ID>/<collection>/<child id>` from the arguments.
pub fn child_name(args: &JsonObject, collection: &str, id_key: &str) -> Result<String, ToolError> {
    let property = property_name(args)?;
    let id = required_id(args, id_key)?;
    Ok(format!("{}/{}/{}", property, collection, id))
}

pub async fn send(backend: &Arc<dyn AnalyticsBackend>, request: ApiRequest) -> ToolOutcome {
    Ok(backend.send(request).await?)
}

pub async fn list(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
    api: Api,
    collection: &'static str,
) -> ToolOutcome {
    let property = property_name(&args)?;
    send(&backend, ApiRequest::get(api, format!("{}/{}", property, collection))).await
}

pub async fn get(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
    api: Api,
    collection: &'static str,
    id_key: &'static str,
) -> ToolOutcome {
    let name = child_name(&args, collection, id_key)?;
    send(&backend, ApiRequest::get(api, name)).await
}

pub async fn delete(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
    api: Api,
    collection: &'static str,
    id_key: &'static str,
) -> ToolOutcome {
    let name = child_name(&args, collection, id_key)?;
    backend.send(ApiRequest::delete(api, name)).await?;
    Ok(json!({ "success": true }))
}

/// POST `{name}:archive`; an empty answer becomes `{"success": true}`.
pub async fn archive(
    backend: Arc<dyn AnalyticsBackend>,
    args: JsonObject,
    api: Api,
    collection: &'static str,
    id_key: &'static str,
) -> ToolOutcome {
    let name = child_name(&args, collection, id_key)?;
    let body = backend
        .send(ApiRequest::post(api, format!("{}:archive", name), json!({})))
        .await?;
    Ok(or_success(body))
}

pub fn or_success(body: Value) -> Value {
    match &body {
        Value::Null => json!({ "success": true }),
        Value::Object(map) if map.is_empty() => json!({ "success": true }),
        _ => body,
    }
}

/// A read-modify-write of an existing resource.
pub struct FieldUpdate {
    name: String,
    body: Map<String, Value>,
    mask: Vec<&'static str>,
}

impl FieldUpdate {
    /// Fetch the current state of `name`.
    pub async fn load(
        backend: &Arc<dyn AnalyticsBackend>,
        api: Api,
        name: String,
    ) -> Result<Self, ToolError> {
        let existing = backend.send(ApiRequest::get(api, name.clone())).await?;
        match existing {
            Value::Object(body) => Ok(Self {
                name,
                body,
                mask: Vec::new(),
            }),
            _ => Err(ToolError::Failed(format!("Resource not found: {}", name))),
        }
    }

    pub fn existing(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Overlay a top-level field and record its mask path.
    pub fn set(&mut self, mask_path: &'static str, key: &str, value: Value) {
        self.body.insert(key.to_string(), value);
        self.mask.push(mask_path);
    }

    /// Overlay a field one object deep.
    pub fn set_nested(&mut self, mask_path: &'static str, outer: &str, key: &str, value: Value) {
        let entry = self
            .body
            .entry(outer.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(inner) = entry {
            inner.insert(key.to_string(), value);
        }
        self.mask.push(mask_path);
    }

    pub fn update_mask(&self) -> String {
        self.mask.join(",")
    }

    /// The PATCH request, or an error if nothing was changed.
    pub fn into_request(self, api: Api) -> Result<ApiRequest, ToolError> {
        if self.mask.is_empty() {
            return Err(ToolError::Failed("No fields provided for update".to_string()));
        }
        let mask = self.update_mask();
        Ok(ApiRequest::patch(api, self.name, Value::Object(self.body)).query("updateMask", mask))
    }
}
