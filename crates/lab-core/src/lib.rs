#![deny(missing_docs)]
#![doc = "Core error and provenance types shared by the lab sweep runner crates."]

pub mod errors;
pub mod provenance;

pub use errors::{ErrorInfo, LabError};
pub use provenance::{VcsKind, VcsProvenance};
