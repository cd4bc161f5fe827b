//! Declarative object assembly.
//!
//! Targets carry key fields; containers map keys to source objects; mapping
//! rules copy, nest or aggregate source values into target fields. A
//! configuration is compiled once into an [`AssemblyPlan`] and then applied by
//! an [`AssemblyEngine`] to batches of targets through a [`PropertyAccessor`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use object_assembly::{
//!     AssemblyConfig, AssemblyEngine, AssemblyPlan, ConstantContainer, ContainerRegistry,
//!     JsonAccessor, OperationConfig, RuleDecl,
//! };
//! use serde_json::json;
//!
//! let config = AssemblyConfig::new().operation(
//!     "Order",
//!     OperationConfig::one_to_one("users", "user_id").prop(RuleDecl::map("name", "user_name")),
//! );
//! let registry = ContainerRegistry::new();
//! registry.register(ConstantContainer::new("users").with(1, json!({"name": "A"})));
//!
//! let engine = AssemblyEngine::new(
//!     Arc::new(AssemblyPlan::build(&config)),
//!     Arc::new(registry),
//!     JsonAccessor::new(),
//! );
//! let mut order = json!({"user_id": 1});
//! let report = engine.assemble_one("Order", &mut order).unwrap();
//! assert!(report.is_complete());
//! ```
pub mod accessor;
pub mod config;
pub mod container;
pub mod convert;
pub mod engine;
pub mod error;
pub mod handler;
pub mod path;
pub mod plan;
pub mod report;
pub mod resolve;
pub mod rule;
pub mod splitter;

pub use accessor::{JsonAccessor, PropertyAccessor, Record, RecordAccessor, RecordType, Schema};
pub use config::{
    config_stub, load_config, validate_config, write_config, AssemblyConfig, OperationConfig,
    TargetConfig, CONFIG_SCHEMA_VERSION,
};
pub use container::{
    ConstantContainer, Container, ContainerProvider, ContainerRegistry, FetchContainer, Key,
    KeyKind, LambdaContainer, Lookup, MappingType, SourceData,
};
pub use convert::{DefaultConverter, TypeConverter, TypeDescriptor};
pub use engine::{AssemblyEngine, EngineOptions};
pub use error::{AssemblyError, AssemblyResult};
pub use handler::{ConversionPolicy, HandlerKind, MissingKeyPolicy};
pub use path::PropertyPath;
pub use plan::{AssemblyOperation, AssemblyPlan, TargetPlan};
pub use report::{AssemblyReport, Issue, Severity};
pub use resolve::ResolvedRules;
pub use rule::{MappingRule, MappingStrategy, PropItem, RuleDecl, RuleOrigin};
pub use splitter::{DelimiterSplitter, KeySplitter, PatternSplitter, SplitterRegistry};
