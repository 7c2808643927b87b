//! Consumer processing cycles
//!
//! A consumer is run once per [`ProcessRequest`](crate::connector::ProcessRequest).
//! What it does depends on the reason stored in its leaf state:
//!
//! | reason           | read cycle                     | write cycle                    |
//! |------------------|--------------------------------|--------------------------------|
//! | `FreshData`      | read value, clear incoming     | read back value, clear incoming|
//! | `ReadComplete`   | read value, clear incoming     | read back value, clear incoming|
//! | `WriteComplete`  | (ignored)                      | check write status             |
//! | `ConnectionLost` | disconnected                   | disconnected                   |
//! | `None`           | request a read, pending        | stage value, request a write   |
//!
//! The reason is reset after every cycle. Transport requests are issued after
//! the connector lock is released; the transport may deliver synchronously.

use crate::connector::{LeafState, RecordConnector};
use crate::convert::Scalar;
use crate::error::{BridgeError, Result};
use crate::types::ProcessReason;

/// Asynchronous read/write requests towards the transport
#[cfg_attr(test, mockall::automock)]
pub trait TransportLink: Send + Sync {
    /// Request a one-shot read of `item`; answered with `ReadComplete`
    fn request_read(&self, item: &str);
    /// Request a write of the composed value of `item`; answered with
    /// `WriteComplete`
    fn request_write(&self, item: &str);
}

/// Result of one processing cycle
#[derive(Debug)]
pub enum CycleOutcome<T> {
    /// Value read from incoming data
    Value(T),
    /// Transport confirmed the write
    Written,
    /// Request issued, the answer arrives with a later cycle
    Pending,
    /// Nothing to do for this reason
    Idle,
    /// Conversion, missing data or a failed service
    Failed(BridgeError),
    /// Connection to the source is lost
    Disconnected,
}

impl<T> CycleOutcome<T> {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_) | CycleOutcome::Disconnected)
    }

    pub fn value(self) -> Option<T> {
        match self {
            CycleOutcome::Value(v) => Some(v),
            _ => None,
        }
    }
}

enum Request {
    Read,
    Write,
}

fn issue(connector: &RecordConnector, transport: &dyn TransportLink, request: Request) -> Result<()> {
    let binding = connector
        .binding()
        .ok_or_else(|| BridgeError::NotLinked(connector.name().to_string()))?;
    match request {
        Request::Read => transport.request_read(&binding.item),
        Request::Write => transport.request_write(&binding.item),
    }
    Ok(())
}

fn read_incoming<T, F>(state: &mut LeafState, read: F) -> CycleOutcome<T>
where
    F: FnOnce(&LeafState) -> Result<T>,
{
    let result = read(state);
    state.clear_incoming();
    match result {
        Ok(v) => CycleOutcome::Value(v),
        Err(e) => CycleOutcome::Failed(e),
    }
}

fn log_outcome<T>(connector: &RecordConnector, reason: ProcessReason, outcome: &CycleOutcome<T>) {
    match outcome {
        CycleOutcome::Failed(e) => {
            if connector.debug() > 0 {
                tracing::warn!("{}: {} cycle failed: {}", connector.name(), reason, e);
            }
        }
        _ if connector.debug() > 1 => {
            tracing::debug!("{}: {} cycle done", connector.name(), reason)
        }
        _ => {}
    }
}

/// Run an input consumer's cycle with a custom read
pub fn read_cycle<T, F>(
    connector: &RecordConnector,
    transport: &dyn TransportLink,
    read: F,
) -> CycleOutcome<T>
where
    F: FnOnce(&LeafState) -> Result<T>,
{
    let mut state = connector.lock();
    let reason = state.begin_cycle();
    let outcome = match reason {
        reason if reason.carries_data() => read_incoming(&mut *state, read),
        ProcessReason::ConnectionLost => CycleOutcome::Disconnected,
        ProcessReason::WriteComplete => CycleOutcome::Idle,
        _ => {
            state.end_cycle();
            drop(state);
            let outcome = match issue(connector, transport, Request::Read) {
                Ok(()) => CycleOutcome::Pending,
                Err(e) => CycleOutcome::Failed(e),
            };
            log_outcome(connector, reason, &outcome);
            return outcome;
        }
    };
    state.end_cycle();
    drop(state);
    log_outcome(connector, reason, &outcome);
    outcome
}

/// Run an output consumer's cycle
///
/// `read_back` handles data arriving on the output (subscription updates or
/// the answer to a read), `write` stages the outgoing value.
pub fn write_cycle<T, R, W>(
    connector: &RecordConnector,
    transport: &dyn TransportLink,
    read_back: R,
    write: W,
) -> CycleOutcome<T>
where
    R: FnOnce(&LeafState) -> Result<T>,
    W: FnOnce(&mut LeafState) -> Result<()>,
{
    let mut state = connector.lock();
    let reason = state.begin_cycle();
    let outcome = match reason {
        reason if reason.carries_data() => read_incoming(&mut *state, read_back),
        ProcessReason::WriteComplete => {
            if state.write_was_ok() {
                CycleOutcome::Written
            } else {
                CycleOutcome::Failed(BridgeError::WriteFailed(connector.name().to_string()))
            }
        }
        ProcessReason::ConnectionLost => CycleOutcome::Disconnected,
        _ => {
            let staged = write(&mut *state);
            state.end_cycle();
            drop(state);
            let outcome = match staged.and_then(|()| issue(connector, transport, Request::Write)) {
                Ok(()) => CycleOutcome::Pending,
                Err(e) => CycleOutcome::Failed(e),
            };
            log_outcome(connector, reason, &outcome);
            return outcome;
        }
    };
    state.end_cycle();
    drop(state);
    log_outcome(connector, reason, &outcome);
    outcome
}

/// Read cycle converting the value to `T`
pub fn read_scalar_cycle<T: Scalar>(
    connector: &RecordConnector,
    transport: &dyn TransportLink,
) -> CycleOutcome<T> {
    read_cycle(connector, transport, |state| state.read_scalar::<T>())
}

/// Write cycle for a scalar; read back values are converted to `T`
pub fn write_scalar_cycle<T: Scalar>(
    connector: &RecordConnector,
    transport: &dyn TransportLink,
    value: T,
) -> CycleOutcome<T> {
    write_cycle(
        connector,
        transport,
        |state| state.read_scalar::<T>(),
        |state| state.write_scalar(value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::processing_channel;
    use crate::tree::Item;
    use crate::types::{DataValue, Structure, Variant};
    use mockall::predicate::eq;
    use std::sync::Arc;

    fn linked(path: &str) -> (Item, Arc<RecordConnector>) {
        let (tx, _rx) = processing_channel();
        let mut item = Item::new("ns=1;s=Motor", 0);
        let c = Arc::new(RecordConnector::new("MOTOR:RPM", 1, Arc::new(tx)));
        item.add_element_chain(&c, path).unwrap();
        (item, c)
    }

    fn motor(rpm: i32) -> DataValue {
        DataValue::new(Structure::new().with_field("rpm", rpm))
    }

    #[test]
    fn test_read_cycle_fresh_data() {
        let (item, c) = linked("rpm");
        let transport = MockTransportLink::new();
        item.set_incoming(Some(&motor(1200)), ProcessReason::FreshData);

        let outcome = read_scalar_cycle::<u16>(&c, &transport);
        assert_eq!(outcome.value(), Some(1200));
        // incoming consumed, reason reset
        let state = c.lock();
        assert!(!state.has_incoming());
        assert_eq!(state.reason(), ProcessReason::None);
    }

    #[test]
    fn test_read_cycle_requests_read() {
        let (_item, c) = linked("rpm");
        let mut transport = MockTransportLink::new();
        transport
            .expect_request_read()
            .with(eq("ns=1;s=Motor"))
            .times(1)
            .return_const(());

        let outcome = read_scalar_cycle::<i32>(&c, &transport);
        assert!(matches!(outcome, CycleOutcome::Pending));
    }

    #[test]
    fn test_read_cycle_conversion_failure() {
        let (item, c) = linked("rpm");
        let transport = MockTransportLink::new();
        item.set_incoming(Some(&motor(-5)), ProcessReason::ReadComplete);

        let outcome = read_scalar_cycle::<u32>(&c, &transport);
        assert!(matches!(
            outcome,
            CycleOutcome::Failed(BridgeError::RangeOverflow { .. })
        ));
    }

    #[test]
    fn test_read_cycle_connection_lost() {
        let (item, c) = linked("rpm");
        let transport = MockTransportLink::new();
        item.set_incoming(None, ProcessReason::ConnectionLost);
        let outcome = read_scalar_cycle::<i32>(&c, &transport);
        assert!(matches!(outcome, CycleOutcome::Disconnected));
        assert!(outcome.is_failure());
    }

    #[test]
    fn test_write_cycle_round_trip() {
        let (item, c) = linked("rpm");
        item.set_incoming(Some(&motor(0)), ProcessReason::FreshData);
        let transport = MockTransportLink::new();
        assert_eq!(read_scalar_cycle::<i32>(&c, &transport).value(), Some(0));

        let mut transport = MockTransportLink::new();
        transport
            .expect_request_write()
            .with(eq("ns=1;s=Motor"))
            .times(1)
            .return_const(());
        let outcome = write_scalar_cycle(&c, &transport, 900i64);
        assert!(matches!(outcome, CycleOutcome::Pending));

        assert_eq!(
            item.get_outgoing(),
            Variant::Structure(Structure::new().with_field("rpm", 900i32))
        );
        item.write_complete(true);

        let transport = MockTransportLink::new();
        let outcome = write_scalar_cycle(&c, &transport, 900i64);
        assert!(matches!(outcome, CycleOutcome::Written));
    }

    #[test]
    fn test_write_cycle_failure_reported() {
        let (item, c) = linked("rpm");
        let mut transport = MockTransportLink::new();
        transport.expect_request_write().times(1).return_const(());
        assert!(matches!(
            write_scalar_cycle(&c, &transport, 1i32),
            CycleOutcome::Pending
        ));

        item.write_complete(false);
        let transport = MockTransportLink::new();
        assert!(matches!(
            write_scalar_cycle(&c, &transport, 1i32),
            CycleOutcome::Failed(BridgeError::WriteFailed(_))
        ));
    }

    #[test]
    fn test_write_cycle_conversion_error_skips_request() {
        let (item, c) = linked("rpm");
        item.set_incoming(Some(&motor(1)), ProcessReason::FreshData);
        let transport = MockTransportLink::new();
        read_scalar_cycle::<i32>(&c, &transport);

        // request_write must not be called
        let transport = MockTransportLink::new();
        let outcome = write_scalar_cycle(&c, &transport, u64::MAX);
        assert!(matches!(
            outcome,
            CycleOutcome::Failed(BridgeError::RangeOverflow { .. })
        ));
    }

    #[test]
    fn test_unlinked_connector() {
        let (tx, _rx) = processing_channel();
        let c = RecordConnector::new("lonely", 0, Arc::new(tx));
        let transport = MockTransportLink::new();
        assert!(matches!(
            read_scalar_cycle::<i32>(&c, &transport),
            CycleOutcome::Failed(BridgeError::NotLinked(_))
        ));
    }
}
