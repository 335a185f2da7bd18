//! Maps control-change pairs onto what they mean for the performer.

use std::fmt;

use crate::midi::{CC_REVERB, CC_SUSTAIN, SUSTAIN_THRESHOLD};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlAction {
    SustainDown { value: u8 },
    SustainUp { value: u8 },
    Reverb { level: u8 },
    /// Anything we don't interpret ourselves goes to the synth as-is.
    Passthrough { controller: u8, value: u8 },
}

pub fn interpret(controller: u8, value: u8) -> ControlAction {
    match controller {
        CC_SUSTAIN if value >= SUSTAIN_THRESHOLD => ControlAction::SustainDown { value },
        CC_SUSTAIN => ControlAction::SustainUp { value },
        CC_REVERB => ControlAction::Reverb { level: value },
        _ => ControlAction::Passthrough { controller, value },
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::SustainDown { value } => write!(f, "Sustain ON: level: {value}"),
            Self::SustainUp { value } => write!(f, "Sustain OFF: level: {value}"),
            Self::Reverb { level } => write!(f, "Reverb: level: {level}"),
            Self::Passthrough { controller, value } => write!(
                f,
                "Unparsed command: controller: {controller} value: {value}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sustain_threshold_splits_at_64() {
        assert_eq!(interpret(64, 0), ControlAction::SustainUp { value: 0 });
        assert_eq!(interpret(64, 63), ControlAction::SustainUp { value: 63 });
        assert_eq!(interpret(64, 64), ControlAction::SustainDown { value: 64 });
        assert_eq!(interpret(64, 127), ControlAction::SustainDown { value: 127 });
    }

    #[test]
    fn reverb_and_passthrough() {
        assert_eq!(interpret(91, 64), ControlAction::Reverb { level: 64 });
        assert_eq!(
            interpret(7, 100),
            ControlAction::Passthrough {
                controller: 7,
                value: 100
            }
        );
    }
}
