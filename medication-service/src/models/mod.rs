pub mod medication;

pub use medication::Medication;
