//! Outbound side of the reliable-messaging transport.

use std::sync::Mutex;

use stagecentral_wire::Packet;

/// Delivery interface of one client connection.
///
/// Implemented by the transport; services hand it fully framed packets or
/// ask it to signal an RMC error.
pub trait Transport {
    /// Queue a framed packet for reliable delivery.
    fn send(&self, packet: Packet);

    /// Send an RMC error response for `call_id`.
    fn send_error(&self, protocol_id: u8, call_id: u32, error_code: u32);
}

/// Something handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Packet(Packet),
    Error {
        protocol_id: u8,
        call_id: u32,
        error_code: u32,
    },
}

/// Transport that keeps everything it is asked to send.
///
/// Used by embedders that drive the services without a network, and by tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Outbound>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything sent so far.
    pub fn take(&self) -> Vec<Outbound> {
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *sent)
    }

    fn push(&self, outbound: Outbound) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(outbound);
    }
}

impl Transport for RecordingTransport {
    fn send(&self, packet: Packet) {
        self.push(Outbound::Packet(packet));
    }

    fn send_error(&self, protocol_id: u8, call_id: u32, error_code: u32) {
        self.push(Outbound::Error {
            protocol_id,
            call_id,
            error_code,
        });
    }
}
