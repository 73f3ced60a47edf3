pub mod error;
pub mod models;
pub mod repo;
pub mod schema;

pub use error::DbError;
pub use repo::ClinicRepository;
