//! Reusable interceptors composed into every operation pipeline
//!
//! 1. `observability` - context establishment, start/complete logging and metrics
//! 2. `error_handling` - failure logging, metrics, reporting and conversion
//! 3. `business` - wraps a pure business function as the terminal interceptor
//! 4. `effects` - applies the effects declared by the business result

pub mod business;
pub mod effects;
pub mod error_handling;
pub mod observability;

// Re-export interceptors
pub use business::{BusinessFn, BusinessInterceptor};
pub use effects::{EffectHandler, EffectRegistry, EffectsDispatcher};
pub use error_handling::{
    ErrorConverter, ErrorLogging, ErrorMapping, ErrorMetrics, ErrorReporting,
};
pub use observability::{
    ContextInterceptor, LoggingComplete, LoggingStart, MetricsComplete, MetricsStart,
};
