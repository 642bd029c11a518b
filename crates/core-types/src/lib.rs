pub mod enums;
pub mod error;
pub mod playback;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ConservationStatus, ProjectStatus};
pub use error::CoreError;
pub use playback::{preferred_call, AudioSource};
pub use structs::{
    CatalogCall, Call, ConservationProject, NewCall, NewProject, NewSighting, NewSpecies, Sighting, Species,
};
