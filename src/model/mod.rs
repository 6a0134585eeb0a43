pub mod category;
pub mod trial;

pub use category::{Category, ExperimentMode};
pub use trial::{InvalidParticipantId, SessionDefinition, SessionKey, TrialOutcome, TrialSpec};
