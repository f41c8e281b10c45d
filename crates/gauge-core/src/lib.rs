//! # gauge-core
//!
//! Core types, traits, and utilities for stackgauge - an OpenStack tenant quota exporter.
//!
//! This crate provides the foundational data structures and interfaces that are
//! shared across all other stackgauge components. It includes:
//!
//! - The tenant quota and resource inventory data model
//! - The status normalizer for volume and snapshot lifecycle states
//! - Port traits for the compute, block-storage, load-balancer and network backends
//! - Label sets used to key every published series
//! - Configuration schema and layered loading
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod labels;
pub mod ports;
pub mod status;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{AuthSettings, CollectorConfig, Config, EndpointOverrides, OpenStackConfig, ServerConfig};
pub use error::{Error, ErrorContext, Result};
pub use labels::LabelSet;
pub use ports::{BlockStoragePort, ComputePort, LoadBalancerPort, NetworkPort, SubsystemPorts};
pub use status::{normalize, InstanceKind, UNKNOWN_STATUS};
pub use types::{Quota, ResourceInstance, ResourceKind, Subsystem, TenantContext};
