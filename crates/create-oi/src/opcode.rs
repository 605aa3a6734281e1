//! Open Interface command opcodes
//!
//! Each OI command starts with a single opcode byte, optionally followed by
//! data bytes. This module only carries the opcodes the driver and its
//! collaborators use; the full table lives in the iRobot Create 2 OI spec.

/// Single-byte OI command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Start the OI; the robot enters Passive mode from any state.
    Start = 128,
    /// Change the OI baud rate.
    Baud = 129,
    /// Enter Safe mode.
    Safe = 131,
    /// Enter Full mode.
    Full = 132,
    /// Power down the robot.
    Power = 133,
    /// Drive with a velocity and turning radius.
    Drive = 137,
    /// Request a single sensor packet.
    Sensors = 142,
    /// Drive the wheels independently.
    DriveDirect = 145,
    /// Begin streaming sensor packets every 15 ms.
    Stream = 148,
    /// Request a list of sensor packets once.
    QueryList = 149,
    /// Pause or resume an active sensor stream.
    PauseResumeStream = 150,
    /// Stop the OI; the robot no longer responds to commands until Start.
    Stop = 173,
}

impl From<Opcode> for u8 {
    fn from(code: Opcode) -> u8 {
        code as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        // Values fixed by the OI spec; the robot will misinterpret anything else.
        assert_eq!(u8::from(Opcode::Start), 128);
        assert_eq!(u8::from(Opcode::Safe), 131);
        assert_eq!(u8::from(Opcode::Stream), 148);
        assert_eq!(u8::from(Opcode::Stop), 173);
    }
}
