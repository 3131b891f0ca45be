//! Abstract interpretation over the instruction graph: the verification type lattice, the
//! frame calculus, the trace engine and liveness.

pub(crate) mod execute;
mod frame;
mod frame_type;
mod hierarchy;
mod liveness;
mod trace;

pub use frame::{
    Access, Entry, EntryId, Frame, FrameDelta, FrozenEntry, FrozenState, MethodContext, Source,
};
pub use frame_type::{FrameType, NewSite};
pub use hierarchy::{ClassHierarchy, PermissiveHierarchy};
pub use liveness::Liveness;
pub use trace::{Constraint, Subroutine, Trace, TraceOptions};
