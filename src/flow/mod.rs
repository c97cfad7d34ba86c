//! Authentication Flows
//!
//! Declarative multi-step login pipelines and their interpreter.
//!
//! A flow is built bottom-up from chained steps (value, supplier, remote
//! call, transform, zip, side effect) and terminated by a login step; the
//! [`FlowExecutor`] then walks it in order against an injected HTTP
//! transport.

pub mod executor;
pub mod steps;

pub use executor::FlowExecutor;
pub use steps::{
    AuthFlow, EffectFn, FlowHttpRequest, FlowStep, FlowValue, LoginFn, MapFn, SupplierFn,
};
