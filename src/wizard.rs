//! # Calibration Wizard Module
//!
//! Small forward-only state machine gating the on-device calibration
//! sequence.
//!
//! The wizard sends `cal` to begin and `next` to confirm each step; it never
//! waits for a device acknowledgment. Advancement is driven purely by local
//! user confirmation and the device is trusted to have captured whatever it
//! needed before the command returned (fire-and-forget, like the rest of the
//! command surface).

use crate::command::CommandChannel;
use crate::error::Result;
use crate::protocol::Command;
use std::sync::Arc;
use tracing::info;

/// Wizard position. Monotonically advances, terminal at `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    /// Waiting for the user to center the stick
    Center,
    /// Waiting for the user to sweep the stick to its extremes
    Extremes,
    /// Sequence finished; further advances are no-ops
    Done,
}

impl WizardStep {
    /// Instruction text shown to the user for this step
    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            WizardStep::Center => "Step 1: Center the stick and press Next to save center.",
            WizardStep::Extremes => {
                "Step 2: Rotate the stick to all edges (min/max). Press Next to finish."
            }
            WizardStep::Done => "Calibration complete.",
        }
    }

    fn next(self) -> WizardStep {
        match self {
            WizardStep::Center => WizardStep::Extremes,
            WizardStep::Extremes | WizardStep::Done => WizardStep::Done,
        }
    }
}

/// Drives the on-device calibration sequence step by step.
#[derive(Debug)]
pub struct CalibrationWizard {
    channel: Arc<CommandChannel>,
    step: WizardStep,
}

impl CalibrationWizard {
    #[must_use]
    pub fn new(channel: Arc<CommandChannel>) -> Self {
        Self {
            channel,
            step: WizardStep::Center,
        }
    }

    /// Current step
    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// Instruction text for the current step
    #[must_use]
    pub fn instruction(&self) -> &'static str {
        self.step.instruction()
    }

    /// Tells the device to begin calibration and resets to the first step.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::JoystickLinkError::NotConnected`] when no
    /// transport is open.
    pub async fn start(&mut self) -> Result<()> {
        self.channel.send(&Command::Calibrate).await?;
        self.step = WizardStep::Center;
        info!("Calibration started: {}", self.instruction());
        Ok(())
    }

    /// Confirms the current step and moves to the next one.
    ///
    /// Sends `next` for each confirmation; once `Done`, further calls issue
    /// no command and stay at `Done`.
    pub async fn advance(&mut self) -> Result<WizardStep> {
        if self.step == WizardStep::Done {
            return Ok(self.step);
        }
        self.channel.send(&Command::Next).await?;
        self.step = self.step.next();
        info!("Calibration advanced: {}", self.instruction());
        Ok(self.step)
    }
}
