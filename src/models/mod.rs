mod appointment;
mod enums;
mod filters;
mod medical_record;
mod patient;
mod practitioner;
mod requests;

pub use appointment::*;
pub use enums::*;
pub use filters::*;
pub use medical_record::*;
pub use patient::*;
pub use practitioner::*;
pub use requests::*;
