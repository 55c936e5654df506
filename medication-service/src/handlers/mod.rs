pub mod health;
pub mod medications;

pub use health::{health_check, metrics};
pub use medications::{
    create_medication, delete_medication, get_medication, list_medications, update_medication,
};
