pub mod job;
pub mod store;
pub mod technician;
