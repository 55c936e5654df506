pub mod medications;

pub use medications::{MedicationPayload, MedicationResponse};
