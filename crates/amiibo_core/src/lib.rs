pub mod backup;
pub mod binary;
pub mod core_api;
pub mod derive;
pub mod diagnosis;
pub mod doctor;
pub mod image;
pub mod layout;
pub mod repair;
pub mod scan;
pub mod text;
pub mod uid;
pub mod upgrade;
