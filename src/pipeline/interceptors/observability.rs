use crate::error::TenantryResult;
use crate::pipeline::context::Context;
use crate::pipeline::core::{Interceptor, Phase};
use crate::pipeline::response::Response;
use uuid::Uuid;

const SOURCE: &str = "pipeline";

/// Establishes the run: correlation id and timing clock
///
/// A correlation id supplied by the caller (e.g. from an incoming header) is
/// kept; otherwise a UUID v4 is generated.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextInterceptor;

impl Interceptor for ContextInterceptor {
    fn name(&self) -> &str {
        "context"
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        if ctx.correlation_id().is_none() {
            ctx.set_correlation_id(Uuid::new_v4().to_string());
        }
        ctx.timing_mut().begin();
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Enter
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStart;

impl Interceptor for LoggingStart {
    fn name(&self) -> &str {
        "logging-start"
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        ctx.system().logger.info(
            SOURCE,
            &format!(
                "Starting operation '{}' (correlation: {})",
                ctx.operation(),
                ctx.correlation_id().unwrap_or("-")
            ),
        );
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Enter
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsStart;

impl Interceptor for MetricsStart {
    fn name(&self) -> &str {
        "metrics-start"
    }

    fn enter(&self, ctx: &mut Context) -> TenantryResult<()> {
        ctx.system()
            .metrics
            .increment("operation.started", &[("operation", ctx.operation())]);
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Enter
    }
}

/// Short description of how a run ended, for completion logs and labels
fn outcome_label(ctx: &Context) -> String {
    match (ctx.response(), ctx.result()) {
        (Some(Response::Http(http)), _) => http.status.to_string(),
        (Some(Response::Cli(cli)), _) => format!("exit {}", cli.exit),
        (None, Some(result)) => result.status.as_str().to_string(),
        (None, None) => "none".to_string(),
    }
}

/// Logs completion once the business result has been produced
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingComplete;

impl Interceptor for LoggingComplete {
    fn name(&self) -> &str {
        "logging-complete"
    }

    fn leave(&self, ctx: &mut Context) -> TenantryResult<()> {
        let logger = &ctx.system().logger;
        logger.info(
            SOURCE,
            &format!(
                "Completed operation '{}' with {} in {:.2}ms (correlation: {}, effect errors: {})",
                ctx.operation(),
                outcome_label(ctx),
                ctx.timing().elapsed().as_secs_f64() * 1000.0,
                ctx.correlation_id().unwrap_or("-"),
                ctx.effect_errors().len()
            ),
        );
        for effect_error in ctx.effect_errors() {
            logger.warn(
                SOURCE,
                &format!(
                    "Effect '{}' failed during '{}': {}",
                    effect_error.effect_type,
                    ctx.operation(),
                    effect_error.message
                ),
            );
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Leave
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsComplete;

impl Interceptor for MetricsComplete {
    fn name(&self) -> &str {
        "metrics-complete"
    }

    fn leave(&self, ctx: &mut Context) -> TenantryResult<()> {
        let metrics = &ctx.system().metrics;
        let outcome = outcome_label(ctx);

        metrics.increment(
            "operation.completed",
            &[("operation", ctx.operation()), ("outcome", outcome.as_str())],
        );
        metrics.observe(
            "operation.duration_ms",
            ctx.timing().elapsed().as_secs_f64() * 1000.0,
            &[("operation", ctx.operation())],
        );
        for effect_error in ctx.effect_errors() {
            metrics.increment(
                "effects.failed",
                &[
                    ("operation", ctx.operation()),
                    ("effect", effect_error.effect_type.as_str()),
                ],
            );
        }
        Ok(())
    }

    fn handles(&self, phase: Phase) -> bool {
        phase == Phase::Leave
    }
}
