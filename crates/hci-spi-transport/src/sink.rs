// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Upper-layer sink for completed inbound frames

/// Consumer of inbound frames
///
/// Called once per completed read from the interrupt path. The slice borrows
/// the transport's single InboundFrame, so anything kept past the call must be
/// copied out. Implementations must return quickly and must not wait on a
/// write that itself needs an interrupt edge to complete.
pub trait FrameSink: Send {
    /// Handle one frame; `payload` starts at the HCI type tag
    fn on_frame_received(&mut self, payload: &[u8]);
}

impl<F> FrameSink for F
where
    F: FnMut(&[u8]) + Send,
{
    fn on_frame_received(&mut self, payload: &[u8]) {
        self(payload)
    }
}

/// Sink that drops every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl FrameSink for DiscardSink {
    fn on_frame_received(&mut self, _payload: &[u8]) {}
}
