// src/interface/bridge.rs
// Companion bridge between the web front end and the controller. Request paths
// become channel tokens or mode-change events.

use log::{debug, info};
use std::sync::mpsc::Sender;

use super::Command;
use crate::RoverError;
use crate::core::{ModeRequest, ModeSwitch};

const MOTION_ROUTES: [(&str, Command); 5] = [
    ("/stop", Command::Stop),
    ("/fwd", Command::Forward),
    ("/bck", Command::Backward),
    ("/rleft", Command::RotateLeft),
    ("/rright", Command::RotateRight),
];

/// What the bridge did with a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    /// A motion token was written to the command channel
    Forwarded(Command),
    /// A mode-change event was raised
    Mode(ModeRequest),
}

/// Translates front-end requests into channel bytes and mode events
pub struct Bridge {
    commands: Sender<Vec<u8>>,
    switch: ModeSwitch,
    manual: bool,
}

impl Bridge {
    /// Create a bridge that assumes the rover starts in manual mode when
    /// `manual` is set
    pub fn new(commands: Sender<Vec<u8>>, switch: ModeSwitch, manual: bool) -> Self {
        Bridge {
            commands,
            switch,
            manual,
        }
    }

    /// Whether motion routes are currently forwarded
    pub fn is_manual(&self) -> bool {
        self.manual
    }

    /// Handle one request line (for example `GET /fwd/ HTTP/1.1`)
    pub fn handle(&mut self, request: &str) -> Result<Option<BridgeAction>, RoverError> {
        if request.contains("/Auto") {
            self.switch.request(ModeRequest::Automatic);
            self.manual = false;
            info!("Bridge raised automatic mode request");
            return Ok(Some(BridgeAction::Mode(ModeRequest::Automatic)));
        }
        if request.contains("/manual") {
            self.switch.request(ModeRequest::Manual);
            self.manual = true;
            info!("Bridge raised manual mode request");
            return Ok(Some(BridgeAction::Mode(ModeRequest::Manual)));
        }

        let Some(command) = route_command(request) else {
            debug!("Bridge ignored request {:?}", request);
            return Ok(None);
        };
        if !self.manual {
            debug!("Bridge dropped {:?} outside manual mode", command);
            return Ok(None);
        }
        let token = command.token().unwrap_or_default();
        self.commands
            .send(token.as_bytes().to_vec())
            .map_err(|_| RoverError::ChannelError("command channel closed".to_string()))?;
        Ok(Some(BridgeAction::Forwarded(command)))
    }
}

/// Motion command for a request path, matched by containment
pub fn route_command(request: &str) -> Option<Command> {
    MOTION_ROUTES
        .iter()
        .find(|(route, _)| request.contains(route))
        .map(|(_, command)| *command)
}
