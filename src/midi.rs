//! MIDI message parsing and hardware input.
//!
//! Status-byte switch mirrors the teacher's `MidiEvent::from_bytes`; the
//! reserved sysex channel and instruction framing are the engine's own
//! control-plane addition (spec §6).

use midir::{MidiInput, MidiInputConnection};

use crate::error::{EngineError, Result};

/// Reserved pseudo-channel name for control-knob sysex updates.
pub const SOIR_INTERNAL_CONTROLS: &str = "soir_internal_controls";

pub const CC_MUTE: u8 = 0x01;
pub const CC_VOLUME: u8 = 0x02;
pub const CC_PAN: u8 = 0x03;

#[derive(Clone, Debug, PartialEq)]
pub enum MidiMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    PitchBend { value: u16 },
    SysEx { instruction: u8, payload: Vec<u8> },
    Other,
}

impl MidiMessage {
    /// Parses a single MIDI message's bytes, including the status byte.
    /// A NoteOn with velocity zero is normalized to NoteOff, matching how
    /// real controllers encode note releases.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let Some(&status) = bytes.first() else {
            return MidiMessage::Other;
        };
        if status == 0xF0 {
            let instruction = bytes.get(1).copied().unwrap_or(0);
            let payload = bytes.get(2..).map(|s| s.to_vec()).unwrap_or_default();
            return MidiMessage::SysEx {
                instruction,
                payload,
            };
        }
        match status & 0xF0 {
            0x90 => {
                let note = bytes.get(1).copied().unwrap_or(0);
                let velocity = bytes.get(2).copied().unwrap_or(0);
                if velocity == 0 {
                    MidiMessage::NoteOff { note, velocity }
                } else {
                    MidiMessage::NoteOn { note, velocity }
                }
            }
            0x80 => MidiMessage::NoteOff {
                note: bytes.get(1).copied().unwrap_or(0),
                velocity: bytes.get(2).copied().unwrap_or(0),
            },
            0xB0 => MidiMessage::ControlChange {
                controller: bytes.get(1).copied().unwrap_or(0),
                value: bytes.get(2).copied().unwrap_or(0),
            },
            0xC0 => MidiMessage::ProgramChange {
                program: bytes.get(1).copied().unwrap_or(0),
            },
            0xE0 => {
                let lsb = bytes.get(1).copied().unwrap_or(0) as u16;
                let msb = bytes.get(2).copied().unwrap_or(0) as u16;
                MidiMessage::PitchBend {
                    value: (msb << 7) | lsb,
                }
            }
            _ => MidiMessage::Other,
        }
    }

    /// Channel nibble of the status byte, for non-sysex messages.
    pub fn channel(bytes: &[u8]) -> Option<u8> {
        bytes.first().map(|b| b & 0x0F)
    }
}

/// Wraps a `midir` input connection for one hardware MIDI device.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<()>,
}

impl MidiInputHandler {
    pub fn list_devices() -> Result<Vec<String>> {
        let input = MidiInput::new("soir-engine-probe")
            .map_err(|e| EngineError::Internal(format!("midi input init: {e}")))?;
        Ok(input
            .ports()
            .iter()
            .filter_map(|p| input.port_name(p).ok())
            .collect())
    }

    /// Connects to the named device, forwarding every received message to
    /// `on_message`. `on_message` must not block.
    pub fn connect(
        device_name: &str,
        mut on_message: impl FnMut(&[u8]) + Send + 'static,
    ) -> Result<Self> {
        let input = MidiInput::new("soir-engine")
            .map_err(|e| EngineError::Internal(format!("midi input init: {e}")))?;
        let port = input
            .ports()
            .into_iter()
            .find(|p| input.port_name(p).map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| EngineError::NotFound(format!("midi device `{device_name}`")))?;
        let connection = input
            .connect(
                &port,
                "soir-engine-input",
                move |_stamp, message, _| on_message(message),
                (),
            )
            .map_err(|e| EngineError::Internal(format!("midi connect: {e}")))?;
        Ok(Self {
            _connection: connection,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_parses() {
        let msg = MidiMessage::from_bytes(&[0x90, 60, 100]);
        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                note: 60,
                velocity: 100
            }
        );
    }

    #[test]
    fn note_on_with_zero_velocity_is_note_off() {
        let msg = MidiMessage::from_bytes(&[0x90, 60, 0]);
        assert_eq!(
            msg,
            MidiMessage::NoteOff {
                note: 60,
                velocity: 0
            }
        );
    }

    #[test]
    fn control_change_parses() {
        let msg = MidiMessage::from_bytes(&[0xB0, CC_VOLUME, 64]);
        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                controller: CC_VOLUME,
                value: 64
            }
        );
    }

    #[test]
    fn sysex_parses_instruction_and_payload() {
        let msg = MidiMessage::from_bytes(&[0xF0, 1, b'{', b'}']);
        assert_eq!(
            msg,
            MidiMessage::SysEx {
                instruction: 1,
                payload: vec![b'{', b'}']
            }
        );
    }
}
