#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    frames_received: u64,
    frames_dropped: u64,
    handler_failures: u64,
    reconnects: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames_received += 1;
    }

    /// A frame no handler was registered for.
    pub(crate) fn record_dropped(&mut self) {
        self.frames_dropped += 1;
    }

    pub(crate) fn record_handler_failure(&mut self) {
        self.handler_failures += 1;
    }

    pub(crate) fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn handler_failures(&self) -> u64 {
        self.handler_failures
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }
}
