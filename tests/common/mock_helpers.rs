//! Recording implementations of the transport and scheduler seams

use std::sync::Mutex;
use uabridge::{ProcessRequest, ProcessScheduler, TransportLink};

/// A request the consumers sent to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Read(String),
    Write(String),
}

/// Transport that only records the requests it gets
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<TransportCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl TransportLink for RecordingTransport {
    fn request_read(&self, item: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Read(item.to_string()));
    }

    fn request_write(&self, item: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TransportCall::Write(item.to_string()));
    }
}

/// Scheduler that collects requests in memory
#[derive(Default)]
pub struct CollectingScheduler {
    requests: Mutex<Vec<ProcessRequest>>,
}

impl CollectingScheduler {
    pub fn take(&self) -> Vec<ProcessRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl ProcessScheduler for CollectingScheduler {
    fn schedule(&self, request: ProcessRequest) {
        self.requests.lock().unwrap().push(request);
    }
}
