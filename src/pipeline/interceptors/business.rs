use crate::error::TenantryResult;
use crate::pipeline::context::Context;
use crate::pipeline::core::{Interceptor, Phase};
use crate::pipeline::result::OperationResult;
use std::sync::Arc;

/// Pure business function: reads the context, returns a result
///
/// Returning `Err` throws; a declared domain error is an `Ok` result with
/// `Status::Error`.
pub type BusinessFn = Arc<dyn Fn(&Context) -> TenantryResult<OperationResult> + Send + Sync>;

/// Terminal interceptor wrapping a business function
pub struct BusinessInterceptor {
    name: String,
    business: BusinessFn,
}

impl BusinessInterceptor {
    pub fn new<F>(name: impl Into<String>, business: F) -> Self
    where
        F: Fn(&Context) -> TenantryResult<OperationResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            business: Arc::new(business),
        }
    }
}

impl Interceptor for BusinessInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        let result = (self.business)(ctx)?;
        ctx.set_result(result);
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Enter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenantryError;
    use crate::system::System;
    use serde_json::json;

    fn context() -> Context {
        Context::new("test", json!({"n": 2}), Arc::new(System::builder().build()))
    }

    #[test]
    fn test_result_is_stored() {
        let business = BusinessInterceptor::new("double", |ctx| {
            let n = ctx.param("n").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(OperationResult::success(json!({ "n": n * 2 })))
        });
        let mut ctx = context();
        business.enter(&mut ctx).unwrap();
        assert_eq!(ctx.result().unwrap().data["n"], 4);
    }

    #[test]
    fn test_thrown_error_sets_no_result() {
        let business =
            BusinessInterceptor::new("fail", |_| Err(TenantryError::Forbidden("no".to_string())));
        let mut ctx = context();
        assert!(business.enter(&mut ctx).is_err());
        assert!(ctx.result().is_none());
    }
}
