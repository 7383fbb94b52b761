use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use tenantry_lib::error::{Failure, TenantryError};
use tenantry_lib::pipeline::interceptors::{
    BusinessInterceptor, ContextInterceptor, EffectRegistry, EffectsDispatcher, ErrorConverter,
    ErrorMapping, LoggingComplete, LoggingStart, MetricsComplete, MetricsStart,
};
use tenantry_lib::pipeline::{
    Context, Effect, FnInterceptor, HttpResponse, HttpShaper, OperationDescriptor, OperationKind,
    OperationResult, Operation, Phase, Pipeline, PipelineTemplate, Response, SharedInterceptor,
    ShaperInterceptor, CORRELATION_HEADER,
};
use tenantry_lib::system::System;
use uuid::Uuid;

type CallLog = Arc<Mutex<Vec<String>>>;

fn context() -> Context {
    Context::new("test", json!({}), Arc::new(System::builder().build()))
}

/// Interceptor recording every transition as `name:phase`
fn recording(name: &'static str, log: &CallLog) -> FnInterceptor {
    let (enter, leave, error) = (log.clone(), log.clone(), log.clone());
    FnInterceptor::new(name)
        .on_enter(move |_| {
            enter.lock().unwrap().push(format!("{}:enter", name));
            Ok(())
        })
        .on_leave(move |_| {
            leave.lock().unwrap().push(format!("{}:leave", name));
            Ok(())
        })
        .on_error(move |_| {
            error.lock().unwrap().push(format!("{}:error", name));
            Ok(())
        })
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn test_enter_in_order_then_leave_in_reverse() {
    let log = CallLog::default();
    let pipeline = Pipeline::builder("ordered")
        .add(recording("a", &log))
        .add(recording("b", &log))
        .add(recording("c", &log))
        .add(recording("d", &log))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(
        calls(&log),
        vec![
            "a:enter", "b:enter", "c:enter", "d:enter", "d:leave", "c:leave", "b:leave",
            "a:leave"
        ]
    );
    assert!(ctx.exception().is_none());
    assert!(ctx.timing().calls(Phase::Error).is_empty());
}

#[test]
fn test_enter_failure_unwinds_only_entered_interceptors() {
    let log = CallLog::default();
    let failing = log.clone();
    let pipeline = Pipeline::builder("failing")
        .add(recording("a", &log))
        .add(recording("b", &log))
        .add(
            recording("c", &log).on_enter(move |_| {
                failing.lock().unwrap().push("c:enter".to_string());
                Err(TenantryError::Conflict("duplicate".to_string()))
            }),
        )
        .add(recording("d", &log))
        .add(recording("e", &log))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(
        calls(&log),
        vec!["a:enter", "b:enter", "c:enter", "b:error", "a:error"]
    );
    assert_eq!(ctx.exception().unwrap().kind, "conflict");
    assert_eq!(ctx.executed_len(), 0);
}

#[test]
fn test_halt_truncates_forward_pass_but_not_unwind() {
    let log = CallLog::default();
    let halting = log.clone();
    let pipeline = Pipeline::builder("halting")
        .add(recording("a", &log))
        .add(recording("b", &log).on_enter(move |ctx| {
            halting.lock().unwrap().push("b:enter".to_string());
            ctx.halt();
            Ok(())
        }))
        .add(recording("c", &log))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(
        calls(&log),
        vec!["a:enter", "b:enter", "b:leave", "a:leave"]
    );
    assert!(ctx.is_halted());
    assert!(ctx.exception().is_none());
}

#[test]
fn test_preset_halt_runs_nothing() {
    let log = CallLog::default();
    let pipeline = Pipeline::builder("p").add(recording("a", &log)).build();
    let mut ctx = context();
    ctx.halt();

    pipeline.execute(ctx);
    assert!(calls(&log).is_empty());
}

#[test]
fn test_effect_failures_are_isolated() {
    let applied = Arc::new(Mutex::new(Vec::new()));
    let mut registry = EffectRegistry::new();
    for effect_type in ["A", "C"] {
        let applied = applied.clone();
        registry.register(effect_type, move |_, _| {
            applied.lock().unwrap().push(effect_type);
            Ok(())
        });
    }
    registry.register("B", |_, _| Err(TenantryError::Internal("B is down".to_string())));

    let pipeline = Pipeline::builder("effects")
        .add(BusinessInterceptor::new("business", |_| {
            Ok(OperationResult::success(json!({})).with_effects([
                Effect::new("A", json!({})),
                Effect::new("B", json!({})),
                Effect::new("C", json!({})),
            ]))
        }))
        .add(EffectsDispatcher::new(Arc::new(registry)))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(*applied.lock().unwrap(), vec!["A", "C"]);
    assert_eq!(ctx.effect_errors().len(), 1);
    assert_eq!(ctx.effect_errors()[0].effect_type, "B");
    assert!(ctx.exception().is_none());
}

#[test]
fn test_shaper_leaves_existing_response_untouched() {
    let preset = Response::Http(HttpResponse {
        status: 418,
        body: json!({"detail": "already shaped"}),
        headers: BTreeMap::new(),
    });
    let response = preset.clone();
    let pipeline = Pipeline::builder("shaped")
        .add(FnInterceptor::new("preset").on_enter(move |ctx| {
            ctx.set_response(response.clone());
            ctx.set_result(OperationResult::success(json!({"id": 9})));
            Ok(())
        }))
        .add(ShaperInterceptor::new(Arc::new(HttpShaper)))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(ctx.response(), Some(&preset));
}

#[test]
fn test_error_mapping_through_http_template() {
    let template = PipelineTemplate::http(
        Arc::new(ErrorMapping::new().with("validation-error", 400, "Validation Error")),
        Arc::new(EffectRegistry::new()),
    );
    let system = Arc::new(System::builder().build());

    let validating = Operation::new(
        OperationDescriptor::new("validate", OperationKind::Http),
        &template,
        system.clone(),
        |_| Err(TenantryError::validation("bad input", [("qty", "must be positive")])),
    );
    let outcome = validating.call(json!({})).unwrap();
    let http = outcome.response().unwrap().as_http().unwrap();
    assert_eq!(http.status, 400);
    assert_eq!(http.body["title"], "Validation Error");
    assert_eq!(http.body["errors"]["qty"][0], "must be positive");

    let unmapped = Operation::new(
        OperationDescriptor::new("explode", OperationKind::Http),
        &template,
        system,
        |_| Err(Failure::new("reactor-meltdown", "core breach").into()),
    );
    let outcome = unmapped.call(json!({})).unwrap();
    let http = outcome.response().unwrap().as_http().unwrap();
    assert_eq!(http.status, 500);
    assert_eq!(http.body["title"], "Internal Server Error");
}

#[test]
fn test_end_to_end_http_run() {
    let pipeline = Pipeline::builder("create")
        .add(ContextInterceptor)
        .add(LoggingStart)
        .add(MetricsStart)
        .add(ErrorConverter::new(
            Arc::new(ErrorMapping::standard()),
            Arc::new(HttpShaper),
        ))
        .add(BusinessInterceptor::new("business", |_| {
            Ok(OperationResult::success(json!({"id": 1})))
        }))
        .add(EffectsDispatcher::new(Arc::new(EffectRegistry::standard())))
        .add(LoggingComplete)
        .add(MetricsComplete)
        .add(ShaperInterceptor::new(Arc::new(HttpShaper)))
        .build();

    let ctx = pipeline.execute(context());

    let http = ctx.response().unwrap().as_http().unwrap();
    assert_eq!(http.status, 201);
    assert_eq!(http.body, json!({"id": 1}));
    let correlation_id = ctx.correlation_id().unwrap();
    assert!(Uuid::parse_str(correlation_id).is_ok());
    assert_eq!(
        http.headers,
        BTreeMap::from([(CORRELATION_HEADER.to_string(), correlation_id.to_string())])
    );
}

fn responding(name: &'static str, status: u16) -> SharedInterceptor {
    FnInterceptor::new(name)
        .on_error(move |ctx| {
            ctx.set_response(Response::Http(HttpResponse {
                status,
                body: json!({ "by": name }),
                headers: BTreeMap::new(),
            }));
            Ok(())
        })
        .shared()
}

#[test]
fn test_last_error_handler_in_unwind_order_wins() {
    let pipeline = Pipeline::builder("precedence")
        .add_shared(responding("outer", 503))
        .add_shared(responding("inner", 409))
        .add(FnInterceptor::new("thrower").on_enter(|_| Err("boom".into())))
        .build();

    let ctx = pipeline.execute(context());

    let http = ctx.response().unwrap().as_http().unwrap();
    assert_eq!(http.status, 503);
    assert_eq!(http.body["by"], "outer");
    assert_eq!(ctx.timing().calls(Phase::Error), vec!["inner", "outer"]);
}

#[test]
fn test_leave_failure_switches_unwind_to_error() {
    let log = CallLog::default();
    let leaving = log.clone();
    let pipeline = Pipeline::builder("leave-fails")
        .add(recording("a", &log))
        .add(recording("b", &log))
        .add(recording("c", &log).on_leave(move |_| {
            leaving.lock().unwrap().push("c:leave".to_string());
            Err(TenantryError::Repository("flush failed".to_string()))
        }))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(
        calls(&log),
        vec!["a:enter", "b:enter", "c:enter", "c:leave", "b:error", "a:error"]
    );
    assert_eq!(ctx.exception().unwrap().kind, "repository-error");
}

#[test]
fn test_failing_error_handler_replaces_exception() {
    let log = CallLog::default();
    let pipeline = Pipeline::builder("error-fails")
        .add(recording("a", &log))
        .add(FnInterceptor::new("b").on_error(|_| Err(TenantryError::Forbidden("masked".to_string()))))
        .add(FnInterceptor::new("c").on_enter(|_| Err(TenantryError::NotFound("x".to_string()))))
        .build();

    let ctx = pipeline.execute(context());

    assert_eq!(calls(&log), vec!["a:enter", "a:error"]);
    assert_eq!(ctx.exception().unwrap().kind, "forbidden");
    let records = ctx.timing().phases();
    assert!(records.iter().any(|r| r.interceptor == "b" && r.failed));
}

#[test]
fn test_concurrent_runs_share_one_pipeline() {
    let pipeline = Arc::new(
        Pipeline::builder("concurrent")
            .add(ContextInterceptor)
            .add(BusinessInterceptor::new("echo", |ctx| {
                Ok(OperationResult::success(ctx.input().clone()))
            }))
            .add(ShaperInterceptor::new(Arc::new(HttpShaper)))
            .build(),
    );
    let system = Arc::new(System::builder().build());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let pipeline = Arc::clone(&pipeline);
            let system = Arc::clone(&system);
            thread::spawn(move || {
                let mut ctx = Context::new("echo", json!({ "n": n }), system);
                ctx.set_correlation_id(format!("run-{}", n));
                (n, pipeline.execute(ctx))
            })
        })
        .collect();

    for handle in handles {
        let (n, ctx) = handle.join().unwrap();
        let http = ctx.response().unwrap().as_http().unwrap();
        assert_eq!(http.body["n"], n);
        assert_eq!(http.headers[CORRELATION_HEADER], format!("run-{}", n));
        assert_eq!(ctx.executed_len(), 0);
    }
}
