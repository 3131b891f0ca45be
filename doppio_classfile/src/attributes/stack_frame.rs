//! Compressed stack map frames.
//!
//! A `StackMapTable` is a delta-compressed list of frames; each frame kind encodes how the
//! stack and locals differ from the previous frame, and the byte offset as a delta from the
//! previous frame's offset.

use crate::attributes::VerificationType;
use crate::error::Error::InvalidStackFrameKind;
use crate::error::Result;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;

/// One compressed stack map frame.
///
/// | Kind | Tag range | Contents |
/// |---|---|---|
/// | `SameFrame` | 0–63 | offset delta in the tag |
/// | `SameLocals1StackItemFrame` | 64–127 | offset delta = tag − 64; one type |
/// | `SameLocals1StackItemFrameExtended` | 247 | explicit offset delta; one type |
/// | `ChopFrame` | 248–250 | 251 − tag trailing locals removed |
/// | `SameFrameExtended` | 251 | explicit offset delta |
/// | `AppendFrame` | 252–254 | tag − 251 locals added |
/// | `FullFrame` | 255 | full locals and stack arrays |
#[derive(Clone, Debug, PartialEq)]
pub enum StackFrame {
    SameFrame {
        frame_type: u8,
    },
    SameLocals1StackItemFrame {
        frame_type: u8,
        stack: Vec<VerificationType>,
    },
    SameLocals1StackItemFrameExtended {
        frame_type: u8,
        offset_delta: u16,
        stack: Vec<VerificationType>,
    },
    ChopFrame {
        frame_type: u8,
        offset_delta: u16,
    },
    SameFrameExtended {
        frame_type: u8,
        offset_delta: u16,
    },
    AppendFrame {
        frame_type: u8,
        offset_delta: u16,
        locals: Vec<VerificationType>,
    },
    FullFrame {
        frame_type: u8,
        offset_delta: u16,
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl StackFrame {
    /// The offset delta this frame encodes.
    #[must_use]
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackFrame::SameFrame { frame_type } => u16::from(*frame_type),
            StackFrame::SameLocals1StackItemFrame { frame_type, .. } => {
                u16::from(*frame_type) - 64
            }
            StackFrame::SameLocals1StackItemFrameExtended { offset_delta, .. }
            | StackFrame::ChopFrame { offset_delta, .. }
            | StackFrame::SameFrameExtended { offset_delta, .. }
            | StackFrame::AppendFrame { offset_delta, .. }
            | StackFrame::FullFrame { offset_delta, .. } => *offset_delta,
        }
    }

    /// Deserialize a stack frame from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame kind byte is reserved.
    pub fn from_bytes(bytes: &mut Cursor<Vec<u8>>) -> Result<StackFrame> {
        let frame_type = bytes.read_u8()?;
        let frame = match frame_type {
            0..=63 => StackFrame::SameFrame { frame_type },
            64..=127 => StackFrame::SameLocals1StackItemFrame {
                frame_type,
                stack: vec![VerificationType::from_bytes(bytes)?],
            },
            247 => StackFrame::SameLocals1StackItemFrameExtended {
                frame_type,
                offset_delta: bytes.read_u16::<BigEndian>()?,
                stack: vec![VerificationType::from_bytes(bytes)?],
            },
            248..=250 => StackFrame::ChopFrame {
                frame_type,
                offset_delta: bytes.read_u16::<BigEndian>()?,
            },
            251 => StackFrame::SameFrameExtended {
                frame_type,
                offset_delta: bytes.read_u16::<BigEndian>()?,
            },
            252..=254 => {
                let offset_delta = bytes.read_u16::<BigEndian>()?;
                let count = frame_type - 251;
                let mut locals = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    locals.push(VerificationType::from_bytes(bytes)?);
                }
                StackFrame::AppendFrame {
                    frame_type,
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = bytes.read_u16::<BigEndian>()?;
                let locals_count = bytes.read_u16::<BigEndian>()?;
                let mut locals = Vec::with_capacity(locals_count as usize);
                for _ in 0..locals_count {
                    locals.push(VerificationType::from_bytes(bytes)?);
                }
                let stack_count = bytes.read_u16::<BigEndian>()?;
                let mut stack = Vec::with_capacity(stack_count as usize);
                for _ in 0..stack_count {
                    stack.push(VerificationType::from_bytes(bytes)?);
                }
                StackFrame::FullFrame {
                    frame_type,
                    offset_delta,
                    locals,
                    stack,
                }
            }
            _ => return Err(InvalidStackFrameKind(frame_type)),
        };
        Ok(frame)
    }

    /// Serialize the stack frame to bytes.
    ///
    /// # Errors
    ///
    /// If the number of locals or stack items exceeds 65,535.
    pub fn to_bytes(&self, bytes: &mut Vec<u8>) -> Result<()> {
        match self {
            StackFrame::SameFrame { frame_type } => {
                bytes.write_u8(*frame_type)?;
            }
            StackFrame::SameLocals1StackItemFrame { frame_type, stack } => {
                bytes.write_u8(*frame_type)?;
                stack[0].to_bytes(bytes)?;
            }
            StackFrame::SameLocals1StackItemFrameExtended {
                frame_type,
                offset_delta,
                stack,
            } => {
                bytes.write_u8(*frame_type)?;
                bytes.write_u16::<BigEndian>(*offset_delta)?;
                stack[0].to_bytes(bytes)?;
            }
            StackFrame::ChopFrame {
                frame_type,
                offset_delta,
            }
            | StackFrame::SameFrameExtended {
                frame_type,
                offset_delta,
            } => {
                bytes.write_u8(*frame_type)?;
                bytes.write_u16::<BigEndian>(*offset_delta)?;
            }
            StackFrame::AppendFrame {
                frame_type,
                offset_delta,
                locals,
            } => {
                bytes.write_u8(*frame_type)?;
                bytes.write_u16::<BigEndian>(*offset_delta)?;
                for local in locals {
                    local.to_bytes(bytes)?;
                }
            }
            StackFrame::FullFrame {
                frame_type,
                offset_delta,
                locals,
                stack,
            } => {
                bytes.write_u8(*frame_type)?;
                bytes.write_u16::<BigEndian>(*offset_delta)?;
                bytes.write_u16::<BigEndian>(u16::try_from(locals.len())?)?;
                for local in locals {
                    local.to_bytes(bytes)?;
                }
                bytes.write_u16::<BigEndian>(u16::try_from(stack.len())?)?;
                for item in stack {
                    item.to_bytes(bytes)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StackFrame::SameFrame { frame_type } => write!(f, "same[{frame_type}]"),
            StackFrame::SameLocals1StackItemFrame { frame_type, stack } => {
                write!(f, "same_locals_1_stack[{frame_type}, stack={stack:?}]")
            }
            StackFrame::SameLocals1StackItemFrameExtended {
                offset_delta,
                stack,
                ..
            } => write!(
                f,
                "same_locals_1_stack_extended[+{offset_delta}, stack={stack:?}]"
            ),
            StackFrame::ChopFrame {
                frame_type,
                offset_delta,
            } => write!(f, "chop[{}, +{offset_delta}]", 251 - frame_type),
            StackFrame::SameFrameExtended { offset_delta, .. } => {
                write!(f, "same_extended[+{offset_delta}]")
            }
            StackFrame::AppendFrame {
                offset_delta,
                locals,
                ..
            } => write!(f, "append[+{offset_delta}, locals={locals:?}]"),
            StackFrame::FullFrame {
                offset_delta,
                locals,
                stack,
                ..
            } => write!(
                f,
                "full[+{offset_delta}, locals={locals:?}, stack={stack:?}]"
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip(frame: &StackFrame, expected_bytes: &[u8]) -> Result<()> {
        let mut bytes = Vec::new();
        frame.to_bytes(&mut bytes)?;
        assert_eq!(expected_bytes, &bytes[..]);
        let mut cursor = Cursor::new(expected_bytes.to_vec());
        assert_eq!(*frame, StackFrame::from_bytes(&mut cursor)?);
        Ok(())
    }

    #[test]
    fn test_invalid_kind() {
        let mut bytes = Cursor::new(vec![128]);
        assert_eq!(
            Err(InvalidStackFrameKind(128)),
            StackFrame::from_bytes(&mut bytes)
        );
    }

    #[test]
    fn test_same_frame() -> Result<()> {
        let frame = StackFrame::SameFrame { frame_type: 5 };
        assert_eq!(5, frame.offset_delta());
        round_trip(&frame, &[5])
    }

    #[test]
    fn test_same_locals_one_stack() -> Result<()> {
        let frame = StackFrame::SameLocals1StackItemFrame {
            frame_type: 70,
            stack: vec![VerificationType::Integer],
        };
        assert_eq!(6, frame.offset_delta());
        round_trip(&frame, &[70, 1])
    }

    #[test]
    fn test_same_locals_one_stack_extended() -> Result<()> {
        let frame = StackFrame::SameLocals1StackItemFrameExtended {
            frame_type: 247,
            offset_delta: 300,
            stack: vec![VerificationType::Null],
        };
        round_trip(&frame, &[247, 1, 44, 5])
    }

    #[test]
    fn test_chop_frame() -> Result<()> {
        let frame = StackFrame::ChopFrame {
            frame_type: 249,
            offset_delta: 12,
        };
        round_trip(&frame, &[249, 0, 12])
    }

    #[test]
    fn test_append_frame() -> Result<()> {
        let frame = StackFrame::AppendFrame {
            frame_type: 253,
            offset_delta: 3,
            locals: vec![VerificationType::Long, VerificationType::Integer],
        };
        round_trip(&frame, &[253, 0, 3, 4, 1])
    }

    #[test]
    fn test_full_frame() -> Result<()> {
        let frame = StackFrame::FullFrame {
            frame_type: 255,
            offset_delta: 9,
            locals: vec![VerificationType::Object { cpool_index: 2 }],
            stack: vec![VerificationType::Integer],
        };
        round_trip(&frame, &[255, 0, 9, 0, 1, 7, 0, 2, 0, 1, 1])
    }
}
