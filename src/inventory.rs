//! Tenant-aware inventory operations
//!
//! Built only from the public pipeline API. Interceptors do the reading
//! (`require-tenant`, `ensure-absent`, `load-record`); the business functions
//! are pure and only declare the writes and notifications they need.

use crate::app::{App, Running};
use crate::error::{TenantryError, TenantryResult};
use crate::pipeline::interceptors::effects::effect_types;
use crate::pipeline::{
    Context, Effect, ErrorDetail, FnInterceptor, Operation, OperationDescriptor, OperationKind,
    OperationResult, SharedInterceptor,
};
use crate::repository::{Record, RecordKey};
use serde_json::{json, Value};
use std::sync::Arc;

pub const COLLECTION: &str = "items";

/// Quantities below this trigger a low-stock notification
pub const LOW_STOCK_THRESHOLD: i64 = 5;

pub mod operation_names {
    pub const CREATE: &str = "inventory.create";
    pub const GET: &str = "inventory.get";
    pub const ADJUST: &str = "inventory.adjust";
}

// ============================================================================
// Interceptors
// ============================================================================

/// Throws `Unauthorized` unless the input names a tenant; stores it as `tenant`
pub fn require_tenant() -> SharedInterceptor {
    FnInterceptor::new("require-tenant")
        .on_enter(|ctx| {
            let tenant = ctx
                .param("tenant")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|tenant| !tenant.is_empty())
                .map(str::to_string)
                .ok_or_else(|| TenantryError::Unauthorized("a tenant is required".to_string()))?;
            ctx.set_string("tenant", tenant);
            Ok(())
        })
        .shared()
}

/// Throws `Conflict` when an item with the requested sku already exists
pub fn ensure_absent() -> SharedInterceptor {
    FnInterceptor::new("ensure-absent")
        .on_enter(|ctx| {
            let Some(sku) = ctx.param("sku").and_then(Value::as_str) else {
                return Ok(());
            };
            let key = RecordKey::new(ctx.get_string("tenant")?, COLLECTION, sku);
            if ctx.system().records.exists(&key)? {
                return Err(TenantryError::Conflict(format!("item {} already exists", key)));
            }
            Ok(())
        })
        .shared()
}

/// Reads the item named by `id` into the context as `record`
pub fn load_record() -> SharedInterceptor {
    FnInterceptor::new("load-record")
        .on_enter(|ctx| {
            let id = ctx
                .param("id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| TenantryError::validation("id is required", [("id", "is required")]))?
                .to_string();
            let key = RecordKey::new(ctx.get_string("tenant")?, COLLECTION, id);
            let record = ctx
                .system()
                .records
                .get(&key)?
                .ok_or_else(|| TenantryError::NotFound(format!("item {}", key)))?;
            ctx.set("record", serde_json::to_value(record)?);
            Ok(())
        })
        .shared()
}

// ============================================================================
// Business functions
// ============================================================================

/// Validate the new item and declare its insert
pub fn create_item(ctx: &Context) -> TenantryResult<OperationResult> {
    let tenant = ctx.get_string("tenant")?;
    let mut errors = Vec::new();

    let sku = ctx.param("sku").and_then(Value::as_str).unwrap_or_default();
    if sku.trim().is_empty() {
        errors.push(ErrorDetail::field("sku", "is required"));
    }
    let name = ctx.param("name").and_then(Value::as_str).unwrap_or_default();
    if name.trim().is_empty() {
        errors.push(ErrorDetail::field("name", "is required"));
    }
    let quantity = match ctx.param("quantity") {
        None => 0,
        Some(value) => match value.as_i64() {
            Some(quantity) if quantity >= 0 => quantity,
            _ => {
                errors.push(ErrorDetail::field("quantity", "must be a non-negative integer"));
                0
            }
        },
    };

    if !errors.is_empty() {
        return Ok(OperationResult::error(errors));
    }

    let item = json!({ "id": sku, "sku": sku, "name": name, "quantity": quantity });
    let mut result = OperationResult::success(item.clone()).with_effect(Effect::new(
        effect_types::RECORD_INSERT,
        record_payload(&tenant, sku, item),
    ));
    if quantity < LOW_STOCK_THRESHOLD {
        result = result.with_effect(low_stock(&tenant, sku, quantity));
    }
    Ok(result)
}

/// Return the loaded item
pub fn get_item(ctx: &Context) -> TenantryResult<OperationResult> {
    let record = loaded_record(ctx)?;
    Ok(OperationResult::success(record.data))
}

/// Apply `delta` to the loaded item's quantity
///
/// A missing or out-of-range delta is a declared error; a delta that would
/// take the quantity below zero throws a validation failure.
pub fn adjust_item(ctx: &Context) -> TenantryResult<OperationResult> {
    let Some(delta) = ctx.param("delta").and_then(Value::as_i64) else {
        return Ok(OperationResult::error(vec![ErrorDetail::field(
            "delta",
            "must be an integer",
        )]));
    };

    let record = loaded_record(ctx)?;
    let current = record.data.get("quantity").and_then(Value::as_i64).unwrap_or(0);
    let Some(quantity) = current.checked_add(delta) else {
        return Ok(OperationResult::error(vec![ErrorDetail::field(
            "delta",
            format!("{} is out of range for a stock of {}", delta, current),
        )]));
    };
    if quantity < 0 {
        return Err(TenantryError::validation(
            "quantity cannot go negative",
            [("delta", format!("{} would leave {} in stock", delta, quantity))],
        ));
    }

    let mut item = record.data.clone();
    item["quantity"] = json!(quantity);

    let mut result = OperationResult::success(item.clone()).with_effect(Effect::new(
        effect_types::RECORD_UPDATE,
        record_payload(&record.tenant, &record.id, item),
    ));
    if quantity < LOW_STOCK_THRESHOLD && current >= LOW_STOCK_THRESHOLD {
        result = result.with_effect(low_stock(&record.tenant, &record.id, quantity));
    }
    Ok(result)
}

fn loaded_record(ctx: &Context) -> TenantryResult<Record> {
    let value = ctx.get_required("record")?;
    Ok(serde_json::from_value(value.clone())?)
}

fn record_payload(tenant: &str, id: &str, data: Value) -> Value {
    json!({ "tenant": tenant, "collection": COLLECTION, "id": id, "data": data })
}

fn low_stock(tenant: &str, sku: &str, quantity: i64) -> Effect {
    Effect::new(
        effect_types::NOTIFY_SEND,
        json!({
            "channel": "email",
            "recipient": format!("inventory@{}", tenant),
            "message": format!("Low stock for {}: {} left", sku, quantity),
        }),
    )
}

// ============================================================================
// Composition
// ============================================================================

/// The inventory operations composed for `kind`
pub fn operations(app: &App<Running>, kind: OperationKind) -> Vec<Arc<Operation>> {
    vec![
        Arc::new(app.operation(
            OperationDescriptor::new(operation_names::CREATE, kind)
                .with_interceptor(require_tenant())
                .with_interceptor(ensure_absent()),
            create_item,
        )),
        Arc::new(app.operation(
            OperationDescriptor::new(operation_names::GET, kind)
                .with_interceptor(require_tenant())
                .with_interceptor(load_record()),
            get_item,
        )),
        Arc::new(app.operation(
            OperationDescriptor::new(operation_names::ADJUST, kind)
                .with_interceptor(require_tenant())
                .with_interceptor(load_record()),
            adjust_item,
        )),
    ]
}
