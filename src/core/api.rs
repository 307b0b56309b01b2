// core/api.rs

// Mode-change requests as seen from outside the control loop. Asynchronous
// producers (the bridge thread, a pin edge handler) only record a request;
// the active loop consumes it at its next iteration boundary.

use embedded_hal::digital::v2::InputPin;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use super::state::Mode;

const NONE: u8 = 0;
const MANUAL: u8 = 1;
const AUTOMATIC: u8 = 2;

// A line that cannot be read counts as low, so it never produces an edge.
fn level<P: InputPin>(pin: &P) -> bool {
    pin.is_high().unwrap_or(false)
}

/// Named mode-change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeRequest {
    /// Switch to teleoperation
    Manual,
    /// Switch to autonomous exploration
    Automatic,
}

impl ModeRequest {
    fn encode(self) -> u8 {
        match self {
            ModeRequest::Manual => MANUAL,
            ModeRequest::Automatic => AUTOMATIC,
        }
    }

    fn decode(raw: u8) -> Option<Self> {
        match raw {
            MANUAL => Some(ModeRequest::Manual),
            AUTOMATIC => Some(ModeRequest::Automatic),
            _ => None,
        }
    }
}

/// Single-slot, latest-wins mode request mailbox shared between producers and
/// the controller
#[derive(Debug, Clone, Default)]
pub struct ModeSwitch {
    slot: Arc<AtomicU8>,
}

impl ModeSwitch {
    /// Empty mailbox
    pub fn new() -> Self {
        ModeSwitch {
            slot: Arc::new(AtomicU8::new(NONE)),
        }
    }

    /// Record a request, replacing any request not yet consumed
    pub fn request(&self, request: ModeRequest) {
        self.slot.store(request.encode(), Ordering::Release);
    }

    /// Peek at the pending request without consuming it
    pub fn pending(&self) -> Option<ModeRequest> {
        ModeRequest::decode(self.slot.load(Ordering::Acquire))
    }

    /// Pending request that would move the rover out of `active`. A request
    /// for the mode already running does not count and stays pending.
    pub fn pending_change(&self, active: Mode) -> Option<ModeRequest> {
        self.pending().filter(|request| Mode::from(*request) != active)
    }

    /// Consume the pending request
    pub fn take(&self) -> Option<ModeRequest> {
        ModeRequest::decode(self.slot.swap(NONE, Ordering::AcqRel))
    }

    // Put back a request that could not be applied, unless a newer one has
    // arrived since it was taken.
    pub(crate) fn restore(&self, request: ModeRequest) {
        let _ = self
            .slot
            .compare_exchange(NONE, request.encode(), Ordering::AcqRel, Ordering::Acquire);
    }
}

/// Rising-edge detector over the two mode lines driven by the companion
/// controller (one line per target mode)
pub struct ModeLines<M: InputPin, A: InputPin> {
    manual_line: M,
    auto_line: A,
    last: (bool, bool),
    switch: ModeSwitch,
}

impl<M: InputPin, A: InputPin> ModeLines<M, A> {
    /// Start watching both lines; their current levels count as already seen
    pub fn new(manual_line: M, auto_line: A, switch: ModeSwitch) -> Self {
        let last = (level(&manual_line), level(&auto_line));
        ModeLines {
            manual_line,
            auto_line,
            last,
            switch,
        }
    }

    /// Sample both lines and raise a request on a rising edge. If both rise in
    /// the same sample, manual wins.
    pub fn sample(&mut self) -> Option<ModeRequest> {
        let now = (level(&self.manual_line), level(&self.auto_line));
        let (was_manual, was_auto) = std::mem::replace(&mut self.last, now);

        let request = if now.0 && !was_manual {
            Some(ModeRequest::Manual)
        } else if now.1 && !was_auto {
            Some(ModeRequest::Automatic)
        } else {
            None
        };
        if let Some(request) = request {
            info!("Mode line edge: {:?}", request);
            self.switch.request(request);
        }
        request
    }
}
