//! Typed control flow edges.

use crate::attributes::Instruction;
use crate::graph::{Label, RETHROW_LABEL, RETURN_LABEL};
use std::fmt;

/// What kind of control transfer an edge represents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EdgeKind {
    /// Sequential flow into the next block; also carries the return or `athrow` terminator on
    /// edges into the pseudo blocks.
    Fallthrough,
    /// A conditional or unconditional branch.
    Jump,
    /// The taken side of a `jsr`.
    JsrJump,
    /// The continuation a subroutine returns to; entered only via `ret`.
    JsrFallthrough,
    /// A `ret`; its target is opaque until subroutine resolution.
    Ret,
    /// One case of a `tableswitch`/`lookupswitch`; `value` is `None` for the default case.
    Switch { value: Option<i32> },
    /// A protected-range transfer to an exception handler. Lower `priority` sorts earlier in
    /// the handler table. `inline_coverage` extends the emitted range over inlined targets.
    Exception {
        priority: u16,
        inline_coverage: bool,
    },
}

impl EdgeKind {
    /// The maximum number of parallel out-edges of this kind a block may have, or `None` when
    /// unbounded.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        match self {
            EdgeKind::Fallthrough
            | EdgeKind::Jump
            | EdgeKind::JsrJump
            | EdgeKind::JsrFallthrough
            | EdgeKind::Ret => Some(1),
            EdgeKind::Switch { .. } | EdgeKind::Exception { .. } => None,
        }
    }
}

/// A directed, typed edge between two blocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub from: Label,
    /// `None` for opaque edges (a `ret` before subroutine resolution).
    pub to: Option<Label>,
    pub kind: EdgeKind,
    /// The terminator that created the edge, when there is one.
    pub instruction: Option<Instruction>,
    /// The caught class of an exception edge; `None` catches everything.
    pub throwable: Option<String>,
}

impl Edge {
    /// A plain fallthrough edge.
    #[must_use]
    pub fn fallthrough(from: Label, to: Label) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::Fallthrough,
            instruction: None,
            throwable: None,
        }
    }

    /// The edge into the return pseudo block, carrying the return instruction.
    #[must_use]
    pub fn returning(from: Label, instruction: Instruction) -> Self {
        Self {
            from,
            to: Some(RETURN_LABEL),
            kind: EdgeKind::Fallthrough,
            instruction: Some(instruction),
            throwable: None,
        }
    }

    /// The edge into the rethrow pseudo block, carrying `athrow`.
    #[must_use]
    pub fn rethrowing(from: Label) -> Self {
        Self {
            from,
            to: Some(RETHROW_LABEL),
            kind: EdgeKind::Fallthrough,
            instruction: Some(Instruction::Athrow),
            throwable: None,
        }
    }

    /// A jump edge created by a branch instruction.
    #[must_use]
    pub fn jump(from: Label, to: Label, instruction: Instruction) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::Jump,
            instruction: Some(instruction),
            throwable: None,
        }
    }

    /// The taken side of a `jsr`.
    #[must_use]
    pub fn jsr_jump(from: Label, to: Label, instruction: Instruction) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::JsrJump,
            instruction: Some(instruction),
            throwable: None,
        }
    }

    /// The continuation of a `jsr`, entered when the subroutine returns.
    #[must_use]
    pub fn jsr_fallthrough(from: Label, to: Label) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::JsrFallthrough,
            instruction: None,
            throwable: None,
        }
    }

    /// An opaque `ret` edge.
    #[must_use]
    pub fn ret(from: Label, instruction: Instruction) -> Self {
        Self {
            from,
            to: None,
            kind: EdgeKind::Ret,
            instruction: Some(instruction),
            throwable: None,
        }
    }

    /// One case of a switch; `value` is `None` for the default case.
    #[must_use]
    pub fn switch(from: Label, to: Label, instruction: Instruction, value: Option<i32>) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::Switch { value },
            instruction: Some(instruction),
            throwable: None,
        }
    }

    /// An exception edge; `throwable` of `None` catches everything.
    #[must_use]
    pub fn exception(
        from: Label,
        to: Label,
        priority: u16,
        throwable: Option<String>,
    ) -> Self {
        Self {
            from,
            to: Some(to),
            kind: EdgeKind::Exception {
                priority,
                inline_coverage: false,
            },
            instruction: None,
            throwable,
        }
    }

    /// `true` while the target is unknown (only `ret` edges before resolution).
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.to.is_none()
    }

    /// `true` for edges into the return or rethrow pseudo blocks.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self.to, Some(RETURN_LABEL | RETHROW_LABEL))
    }

    /// The local variable index a `ret` edge reads its return address from.
    #[must_use]
    pub fn ret_index(&self) -> Option<u16> {
        match self.instruction {
            Some(Instruction::Ret(index)) => Some(u16::from(index)),
            Some(Instruction::Ret_w(index)) => Some(index),
            _ => None,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match &self.kind {
            EdgeKind::Fallthrough => "fallthrough".to_string(),
            EdgeKind::Jump => "jump".to_string(),
            EdgeKind::JsrJump => "jsr".to_string(),
            EdgeKind::JsrFallthrough => "jsr fallthrough".to_string(),
            EdgeKind::Ret => "ret".to_string(),
            EdgeKind::Switch { value: Some(value) } => format!("switch case {value}"),
            EdgeKind::Switch { value: None } => "switch default".to_string(),
            EdgeKind::Exception { priority, .. } => format!("exception priority {priority}"),
        };
        match self.to {
            Some(to) => write!(f, "{} -> {} ({kind})", self.from, to),
            None => write!(f, "{} -> ? ({kind})", self.from),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_limits() {
        assert_eq!(Some(1), EdgeKind::Fallthrough.limit());
        assert_eq!(Some(1), EdgeKind::Jump.limit());
        assert_eq!(Some(1), EdgeKind::Ret.limit());
        assert_eq!(None, EdgeKind::Switch { value: None }.limit());
        assert_eq!(
            None,
            EdgeKind::Exception {
                priority: 0,
                inline_coverage: false
            }
            .limit()
        );
    }

    #[test]
    fn test_opaque_and_leaf() {
        let ret = Edge::ret(4, Instruction::Ret(1));
        assert!(ret.is_opaque());
        assert_eq!(Some(1), ret.ret_index());

        let returning = Edge::returning(2, Instruction::Ireturn);
        assert!(returning.is_leaf());
        assert!(!returning.is_opaque());

        let jump = Edge::jump(0, 1, Instruction::Goto(0));
        assert!(!jump.is_leaf());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            "0 -> 1 (jump)",
            Edge::jump(0, 1, Instruction::Goto(0)).to_string()
        );
        assert_eq!("4 -> ? (ret)", Edge::ret(4, Instruction::Ret(0)).to_string());
    }
}
