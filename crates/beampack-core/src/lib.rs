#![deny(clippy::all, warnings)]

mod build;
mod collect;
mod emit;
mod header;
mod locate;
mod outcome;

pub use beampack_domain::{discover_project_root, project_root_from, EscriptError};

pub use crate::build::{escriptize, BuildOutput, EscriptizeRequest};
pub use crate::collect::collect;
pub use crate::emit::emit;
pub use crate::header::{compose_headers, HeaderLines};
pub use crate::locate::{dependency_entries, BeamLocator};
pub use crate::outcome::{CommandStatus, ExecutionOutcome};
