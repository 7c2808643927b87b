//! Record connector: the consumer side of a leaf
//!
//! Every leaf of a data element tree is bound to exactly one
//! [`RecordConnector`], and every connector to exactly one leaf. The connector
//! owns the lock that guards the leaf's data: the incoming slot, the outgoing
//! slot, the read/write status and the current [`ProcessReason`] all live in
//! [`LeafState`] behind the connector's mutex. There is one lock per consumer,
//! so unrelated consumers never contend with each other; the only contention
//! is between a leaf's consumer and the delivery actor of its item.
//!
//! Notifications to the consumer go through the [`ProcessScheduler`] seam and
//! never block. At most one processing request per connector is outstanding;
//! further deliveries before the consumer ran only update the reason. The
//! request counts as taken once the consumer locks the connector, so the next
//! delivery after that notifies again.
//!
//! # Example
//!
//! ```ignore
//! let (tx, rx) = processing_channel();
//! let connector = Arc::new(RecordConnector::new("PUMP:CODE", 0, Arc::new(tx)));
//!
//! // consumer processing cycle
//! let mut state = connector.lock();
//! let code: i32 = state.read_scalar()?;
//! state.clear_incoming();
//! ```

use crate::convert::{self, CopyReport, Scalar};
use crate::error::{BridgeError, Result};
use crate::tree::{ElementId, ElementPath};
use crate::types::{BuiltinType, DataStatus, DataValue, ProcessReason, TimestampSource, Variant};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Request to run a consumer's processing cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    /// Name of the record whose connector asked for processing
    pub record: String,
    pub reason: ProcessReason,
}

/// Schedules consumer processing cycles
///
/// Implementations must return immediately; the consumer runs later in its
/// own context.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessScheduler: Send + Sync {
    fn schedule(&self, request: ProcessRequest);
}

impl ProcessScheduler for Sender<ProcessRequest> {
    fn schedule(&self, request: ProcessRequest) {
        match self.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                tracing::warn!("Processing queue full, dropping request for {}", req.record)
            }
            Err(TrySendError::Disconnected(req)) => {
                tracing::debug!("Processing queue closed, dropping request for {}", req.record)
            }
        }
    }
}

/// Create an unbounded processing request channel
pub fn processing_channel() -> (Sender<ProcessRequest>, Receiver<ProcessRequest>) {
    unbounded()
}

/// Where a connector's leaf lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafBinding {
    /// Name of the item owning the tree
    pub item: String,
    pub element: ElementId,
    pub path: ElementPath,
}

#[derive(Debug, Clone)]
struct Incoming {
    value: Variant,
    native: BuiltinType,
    is_array: bool,
    source_timestamp: Option<DateTime<Utc>>,
    server_timestamp: Option<DateTime<Utc>>,
}

/// Leaf data guarded by the connector lock
#[derive(Debug, Default)]
pub struct LeafState {
    reason: ProcessReason,
    /// A processing request is outstanding
    scheduled: bool,
    /// Path of the bound leaf, for diagnostics
    path: String,

    incoming: Option<Incoming>,
    /// Native type of the last delivery, survives `clear_incoming`
    native: BuiltinType,
    native_is_array: bool,
    read_status: DataStatus,

    outgoing: Option<Variant>,
    /// Last value seen in either direction; composition falls back to it
    last_value: Option<Variant>,
    write_status: DataStatus,
}

impl LeafState {
    /// Reason of the current processing cycle
    pub fn reason(&self) -> ProcessReason {
        self.reason
    }

    pub fn has_incoming(&self) -> bool {
        self.incoming.is_some()
    }

    /// Native type learned from the most recent delivery
    pub fn native_type(&self) -> BuiltinType {
        self.native
    }

    pub fn native_is_array(&self) -> bool {
        self.native_is_array
    }

    pub fn read_status(&self) -> DataStatus {
        self.read_status
    }

    pub fn write_status(&self) -> DataStatus {
        self.write_status
    }

    /// Check status of last read service
    pub fn read_was_ok(&self) -> bool {
        self.read_status.is_good()
    }

    /// Check status of last write service
    pub fn write_was_ok(&self) -> bool {
        self.write_status.is_good()
    }

    fn current(&self) -> Result<&Incoming> {
        match (&self.incoming, self.read_status) {
            (Some(incoming), _) => Ok(incoming),
            (None, DataStatus::Missing) => Err(BridgeError::StructureMismatch {
                path: self.path.clone(),
            }),
            (None, _) => Err(BridgeError::NoData),
        }
    }

    /// Raw incoming value
    pub fn read_variant(&self) -> Result<Variant> {
        self.current().map(|i| i.value.clone())
    }

    /// Read incoming data converted to `T`
    pub fn read_scalar<T: Scalar>(&self) -> Result<T> {
        convert::to_scalar(&self.current()?.value)
    }

    /// Read incoming data as text
    pub fn read_text(&self) -> Result<String> {
        convert::to_text(&self.current()?.value)
    }

    /// Read incoming data as text of at most `capacity` bytes
    ///
    /// Longer text is cut at the last character boundary that fits.
    pub fn read_string(&self, capacity: usize) -> Result<String> {
        let mut text = self.read_text()?;
        if text.len() > capacity {
            let mut end = capacity;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Ok(text)
    }

    /// Read incoming data into a NUL-terminated byte buffer
    pub fn read_cstring(&self, dest: &mut [u8]) -> Result<CopyReport> {
        let text = self.read_text()?;
        Ok(convert::copy_cstring(&text, dest))
    }

    /// Read an incoming array, returning the number of elements copied
    pub fn read_array<T: Scalar>(&self, dest: &mut [T]) -> Result<usize> {
        convert::copy_array(&self.current()?.value, dest)
    }

    /// Read an incoming array as fixed-width strings
    pub fn read_string_array<const N: usize>(&self, dest: &mut [[u8; N]]) -> Result<usize> {
        convert::copy_string_array(&self.current()?.value, dest)
    }

    /// Read the time stamp of the incoming data
    ///
    /// Falls back to the other time stamp if the selected one is absent.
    pub fn read_timestamp(&self, source: TimestampSource) -> Result<DateTime<Utc>> {
        let incoming = self.current()?;
        let (first, second) = match source {
            TimestampSource::Server => (incoming.server_timestamp, incoming.source_timestamp),
            TimestampSource::Source => (incoming.source_timestamp, incoming.server_timestamp),
        };
        first.or(second).ok_or(BridgeError::NoData)
    }

    fn stage(&mut self, value: Variant) {
        self.last_value = Some(value.clone());
        self.outgoing = Some(value);
        self.write_status = DataStatus::Unset;
    }

    fn native_for_scalar(&self, requested: BuiltinType) -> Result<BuiltinType> {
        if self.native_is_array {
            return Err(BridgeError::type_mismatch(
                format!("Array of {}", self.native),
                requested,
            ));
        }
        Ok(self.native)
    }

    fn native_for_array(&self, requested: BuiltinType) -> Result<BuiltinType> {
        if self.native != BuiltinType::Null && !self.native_is_array {
            return Err(BridgeError::type_mismatch(
                self.native,
                format!("Array of {}", requested),
            ));
        }
        Ok(self.native)
    }

    /// Write outgoing data, converted to the native type of the bound path
    pub fn write_scalar<T: Scalar>(&mut self, value: T) -> Result<()> {
        let native = self.native_for_scalar(T::BUILTIN)?;
        let v = convert::scalar_to_native(value, native)?;
        self.stage(v);
        Ok(())
    }

    /// Write outgoing text
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let native = self.native_for_scalar(BuiltinType::String)?;
        let v = convert::text_to_native(value, native)?;
        self.stage(v);
        Ok(())
    }

    /// Write an outgoing array
    pub fn write_array<T: Scalar>(&mut self, values: &[T]) -> Result<()> {
        let native = self.native_for_array(T::BUILTIN)?;
        let v = convert::array_to_native(values, native)?;
        self.stage(v);
        Ok(())
    }

    /// Write an outgoing array of strings
    pub fn write_string_array<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        let native = self.native_for_array(BuiltinType::String)?;
        let v = convert::text_array_to_native(values, native)?;
        self.stage(v);
        Ok(())
    }

    /// Staged outgoing value, if any
    pub fn outgoing(&self) -> Option<&Variant> {
        self.outgoing.as_ref()
    }

    pub fn has_pending_write(&self) -> bool {
        self.outgoing.is_some()
    }

    /// Discard the current incoming data
    pub fn clear_incoming(&mut self) {
        self.incoming = None;
    }

    /// Discard the current outgoing data
    ///
    /// The value stays available as last-known value for composition.
    pub fn clear_outgoing(&mut self) {
        self.outgoing = None;
    }

    // Delivery side, called by the owning item with this lock held.

    pub(crate) fn store_incoming(&mut self, value: &Variant, data: &DataValue) {
        let native = value.builtin_type();
        self.native = native;
        self.native_is_array = value.is_array();
        self.incoming = Some(Incoming {
            value: value.clone(),
            native,
            is_array: value.is_array(),
            source_timestamp: data.source_timestamp,
            server_timestamp: data.server_timestamp,
        });
        self.last_value = Some(value.clone());
        self.read_status = DataStatus::Good;
    }

    pub(crate) fn mark_missing(&mut self) {
        self.incoming = None;
        self.read_status = DataStatus::Missing;
    }

    pub(crate) fn mark_disconnected(&mut self) {
        self.incoming = None;
        self.outgoing = None;
        self.read_status = DataStatus::Disconnected;
        self.write_status = DataStatus::Disconnected;
    }

    pub(crate) fn set_write_result(&mut self, ok: bool) {
        self.outgoing = None;
        self.write_status = if ok {
            DataStatus::Good
        } else {
            DataStatus::Failed
        };
    }

    pub(crate) fn composed_value(&self) -> Option<Variant> {
        self.outgoing.clone().or_else(|| self.last_value.clone())
    }

    pub(crate) fn incoming_summary(&self) -> Option<(BuiltinType, bool)> {
        self.incoming.as_ref().map(|i| (i.native, i.is_array))
    }

    pub(crate) fn begin_cycle(&self) -> ProcessReason {
        self.reason
    }

    pub(crate) fn end_cycle(&mut self) {
        self.reason = ProcessReason::None;
    }
}

/// Consumer adaptor bound 1:1 to a leaf
pub struct RecordConnector {
    name: String,
    debug: i32,
    state: Mutex<LeafState>,
    binding: OnceLock<LeafBinding>,
    scheduler: Arc<dyn ProcessScheduler>,
}

impl std::fmt::Debug for RecordConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordConnector")
            .field("name", &self.name)
            .field("debug", &self.debug)
            .field("binding", &self.binding.get())
            .finish()
    }
}

impl RecordConnector {
    pub fn new(name: impl Into<String>, debug: i32, scheduler: Arc<dyn ProcessScheduler>) -> Self {
        Self {
            name: name.into(),
            debug,
            state: Mutex::new(LeafState::default()),
            binding: OnceLock::new(),
            scheduler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Debug verbosity of the record
    pub fn debug(&self) -> i32 {
        self.debug
    }

    /// Lock the leaf data for the consumer
    ///
    /// Takes the outstanding processing request, if any: deliveries arriving
    /// after this call notify the consumer again. A poisoned lock is
    /// recovered; every mutation of [`LeafState`] leaves it consistent.
    pub fn lock(&self) -> MutexGuard<'_, LeafState> {
        let mut state = self.lock_state();
        state.scheduled = false;
        state
    }

    /// Lock the leaf data for the delivery side, keeping any outstanding
    /// request
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, LeafState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn binding(&self) -> Option<&LeafBinding> {
        self.binding.get()
    }

    pub fn is_linked(&self) -> bool {
        self.binding.get().is_some()
    }

    pub(crate) fn bind(&self, binding: LeafBinding) -> Result<()> {
        let path = binding.path.to_string();
        self.binding.set(binding).map_err(|wanted| {
            let existing = self.binding.get().unwrap_or(&wanted);
            BridgeError::AlreadyLinked {
                record: self.name.clone(),
                item: existing.item.clone(),
                path: existing.path.to_string(),
            }
        })?;
        self.lock_state().path = path;
        Ok(())
    }

    /// Ask the consumer to schedule a processing cycle
    pub fn request_processing(&self, reason: ProcessReason) {
        let state = self.lock_state();
        self.notify(state, reason);
    }

    /// Set the reason and release the lock before notifying
    pub(crate) fn notify(&self, mut state: MutexGuard<'_, LeafState>, reason: ProcessReason) {
        state.reason = reason;
        let send = !state.scheduled;
        state.scheduled = true;
        drop(state);

        if send {
            self.scheduler.schedule(ProcessRequest {
                record: self.name.clone(),
                reason,
            });
        } else if self.debug > 1 {
            tracing::debug!(
                "{}: processing already requested, reason now {}",
                self.name,
                reason
            );
        }
    }
}
