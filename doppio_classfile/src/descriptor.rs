//! Minimal field and method descriptor parsing.
//!
//! The analysis core only needs enough descriptor structure to lay out initial frames and to
//! model field and invoke instructions: parameter types, return type, and slot sizes. Generic
//! signatures are out of scope.

use crate::analysis::FrameType;
use crate::error::Error::InvalidDescriptor;
use crate::error::Result;

/// The parsed shape of a method descriptor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FrameType>,
    /// `None` for `void`.
    pub return_type: Option<FrameType>,
}

impl MethodDescriptor {
    /// Total number of local slots the parameters occupy.
    #[must_use]
    pub fn parameter_slots(&self) -> usize {
        self.parameters
            .iter()
            .map(|parameter| usize::from(parameter.category()))
            .sum()
    }
}

/// Parse a field descriptor such as `I`, `[J` or `Ljava/lang/String;`.
///
/// # Errors
///
/// Returns an error if the descriptor is malformed.
pub fn parse_field_descriptor(descriptor: &str) -> Result<FrameType> {
    let mut chars = descriptor.chars();
    let field_type = parse_type(&mut chars, descriptor)?;
    if chars.next().is_some() {
        return Err(InvalidDescriptor(descriptor.to_string()));
    }
    Ok(field_type)
}

/// Parse a method descriptor such as `(I[JLjava/lang/Object;)V`.
///
/// # Errors
///
/// Returns an error if the descriptor is malformed.
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor> {
    let mut chars = descriptor.chars();
    if chars.next() != Some('(') {
        return Err(InvalidDescriptor(descriptor.to_string()));
    }

    let mut parameters = Vec::new();
    let mut remainder = chars.clone();
    loop {
        match remainder.clone().next() {
            Some(')') => {
                remainder.next();
                break;
            }
            Some(_) => parameters.push(parse_type(&mut remainder, descriptor)?),
            None => return Err(InvalidDescriptor(descriptor.to_string())),
        }
    }

    let return_type = match remainder.clone().next() {
        Some('V') => {
            remainder.next();
            None
        }
        Some(_) => Some(parse_type(&mut remainder, descriptor)?),
        None => return Err(InvalidDescriptor(descriptor.to_string())),
    };
    if remainder.next().is_some() {
        return Err(InvalidDescriptor(descriptor.to_string()));
    }

    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

fn parse_type(chars: &mut std::str::Chars, descriptor: &str) -> Result<FrameType> {
    let mut dims = 0u8;
    loop {
        let code = chars
            .next()
            .ok_or_else(|| InvalidDescriptor(descriptor.to_string()))?;
        let base = match code {
            '[' => {
                dims = dims
                    .checked_add(1)
                    .ok_or_else(|| InvalidDescriptor(descriptor.to_string()))?;
                continue;
            }
            'B' => FrameType::Byte,
            'C' => FrameType::Char,
            'D' => FrameType::Double,
            'F' => FrameType::Float,
            'I' => FrameType::Int,
            'J' => FrameType::Long,
            'S' => FrameType::Short,
            'Z' => FrameType::Boolean,
            'L' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some(';') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(InvalidDescriptor(descriptor.to_string())),
                    }
                }
                FrameType::reference(name)
            }
            _ => return Err(InvalidDescriptor(descriptor.to_string())),
        };
        return Ok(FrameType::array(dims, base));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_field_descriptors() -> Result<()> {
        assert_eq!(FrameType::Int, parse_field_descriptor("I")?);
        assert_eq!(FrameType::Long, parse_field_descriptor("J")?);
        assert_eq!(FrameType::Boolean, parse_field_descriptor("Z")?);
        assert_eq!(
            FrameType::reference("java/lang/String"),
            parse_field_descriptor("Ljava/lang/String;")?
        );
        assert_eq!(
            FrameType::array(2, FrameType::Int),
            parse_field_descriptor("[[I")?
        );
        Ok(())
    }

    #[test]
    fn test_invalid_field_descriptors() {
        assert!(parse_field_descriptor("").is_err());
        assert!(parse_field_descriptor("X").is_err());
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("II").is_err());
        assert!(parse_field_descriptor("[").is_err());
    }

    #[test]
    fn test_method_descriptors() -> Result<()> {
        let descriptor = parse_method_descriptor("(II)I")?;
        assert_eq!(vec![FrameType::Int, FrameType::Int], descriptor.parameters);
        assert_eq!(Some(FrameType::Int), descriptor.return_type);
        assert_eq!(2, descriptor.parameter_slots());

        let descriptor = parse_method_descriptor("(J[Ljava/lang/Object;)V")?;
        assert_eq!(
            vec![
                FrameType::Long,
                FrameType::array(1, FrameType::object()),
            ],
            descriptor.parameters
        );
        assert_eq!(None, descriptor.return_type);
        assert_eq!(3, descriptor.parameter_slots());

        let descriptor = parse_method_descriptor("()V")?;
        assert!(descriptor.parameters.is_empty());
        assert_eq!(0, descriptor.parameter_slots());
        Ok(())
    }

    #[test]
    fn test_invalid_method_descriptors() {
        assert!(parse_method_descriptor("").is_err());
        assert!(parse_method_descriptor("I").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("()").is_err());
        assert!(parse_method_descriptor("()VV").is_err());
    }
}
