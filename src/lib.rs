//! # uabridge: structured remote values for flat record consumers
//!
//! Maps structured values of a remote data source (OPC UA items holding
//! structures and arrays) onto many independent scalar consumers (records).
//! Each item owns a tree of data elements mirroring the part of its value
//! that is bound to records. Incoming values are split along the tree into
//! the leaves, outgoing values are composed from the leaves.
//!
//! ## Architecture
//!
//! - **Tree**: arena of elements per [`Item`], built once through the chain builder
//! - **Connectors**: one [`RecordConnector`] per leaf, owning the lock of the leaf data
//! - **Conversion**: range-checked scalar, string and array conversion in [`convert`]
//! - **Cycles**: per-reason read/write processing of a consumer in [`cycle`]
//! - **Communication**: crossbeam channels carry processing requests to the consumers
//!
//! ## Example
//!
//! ```ignore
//! use uabridge::{
//!     config::BridgeConfig,
//!     connector::processing_channel,
//!     cycle::{read_scalar_cycle, CycleOutcome},
//!     DataValue, ProcessReason, RegistryBuilder,
//! };
//!
//! let config = BridgeConfig::load("bridge.toml")?;
//! let (tx, rx) = processing_channel();
//! let registry = RegistryBuilder::from_config(&config, Arc::new(tx))?.build();
//!
//! // delivery side
//! let pump = registry.item("ns=2;s=Pump").unwrap();
//! pump.set_incoming(Some(&DataValue::new(value)), ProcessReason::FreshData);
//!
//! // consumer side
//! for request in rx.try_iter() {
//!     let connector = registry.connector(&request.record).unwrap();
//!     if let CycleOutcome::Value(v) = read_scalar_cycle::<f64>(connector, &transport) {
//!         println!("{} = {}", request.record, v);
//!     }
//! }
//! ```

pub mod config;
pub mod connector;
pub mod convert;
pub mod cycle;
pub mod error;
pub mod registry;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use config::BridgeConfig;
pub use connector::{LeafState, ProcessRequest, ProcessScheduler, RecordConnector};
pub use cycle::{CycleOutcome, TransportLink};
pub use error::{BridgeError, Result};
pub use registry::{Registry, RegistryBuilder};
pub use tree::{add_element_chain, ElementId, ElementPath, Item};
pub use types::{
    BuiltinType, DataStatus, DataValue, Delivery, ProcessReason, Structure, TimestampSource,
    Variant,
};
