pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error used at every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Delivery quality requested from the pub/sub transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    pub fn level(self) -> u8 {
        match self {
            Qos::AtMostOnce => 0,
            Qos::AtLeastOnce => 1,
            Qos::ExactlyOnce => 2,
        }
    }
}

/// Publishing half of the pub/sub transport session.
pub trait Publisher {
    /// True while the broker session is established.
    fn is_connected(&self) -> bool;
    /// Hand a payload to the transport. `Err` reports a failed acknowledgement.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), BoxError>;
}

/// Outbound fan-out to connected viewers (web sockets in production).
pub trait FanOut {
    fn emit(&mut self, event: &str, payload: &str) -> Result<(), BoxError>;
}

/// External order lookup. Returns the raw response body.
pub trait OrderLookup {
    fn find_one(
        &mut self,
        nomor_mo: &str,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, BoxError>;
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), BoxError> {
        (**self).publish(topic, payload, qos)
    }
}

impl<F: FanOut + ?Sized> FanOut for Box<F> {
    fn emit(&mut self, event: &str, payload: &str) -> Result<(), BoxError> {
        (**self).emit(event, payload)
    }
}

impl<L: OrderLookup + ?Sized> OrderLookup for Box<L> {
    fn find_one(
        &mut self,
        nomor_mo: &str,
        timeout: std::time::Duration,
    ) -> Result<Vec<u8>, BoxError> {
        (**self).find_one(nomor_mo, timeout)
    }
}
