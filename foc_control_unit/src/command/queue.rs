//! Fixed-capacity request FIFO from the facade to the control tick.

use foc_common::consts::REQUEST_QUEUE_CAPACITY;
use foc_common::motor_id::Mode;
use heapless::Deque;
use static_assertions::const_assert;

use super::CommandError;
use super::arbitration::SetpointRequest;

const_assert!(REQUEST_QUEUE_CAPACITY >= 1);

/// Command waiting for the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request {
    Setpoint(SetpointRequest),
    BeginMotorIdentification(Mode),
    BeginHardwareTest,
    Beep { frequency: f64, duration: f64 },
}

impl Request {
    /// True for a zero setpoint.
    #[inline]
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Setpoint(s) if s.is_stop())
    }
}

/// Bounded FIFO of pending requests.
#[derive(Debug, Default)]
pub struct RequestQueue {
    inner: Deque<Request, REQUEST_QUEUE_CAPACITY>,
}

impl RequestQueue {
    pub const fn new() -> Self {
        Self {
            inner: Deque::new(),
        }
    }

    /// Enqueue in issue order.
    ///
    /// A stop supersedes everything queued before it and is never refused.
    pub fn push(&mut self, request: Request) -> Result<(), CommandError> {
        if request.is_stop() {
            self.inner.clear();
        }
        self.inner
            .push_back(request)
            .map_err(|_| CommandError::QueueFull)
    }

    /// Replace everything pending with a single stop.
    pub fn push_stop(&mut self) {
        self.inner.clear();
        // Cannot fail on an empty queue.
        let _ = self.inner.push_back(Request::Setpoint(SetpointRequest::stop()));
    }

    /// Oldest pending request.
    #[inline]
    pub fn pop(&mut self) -> Option<Request> {
        self.inner.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
