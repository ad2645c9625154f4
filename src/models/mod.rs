pub mod analysis;
pub mod job;
pub mod results;
pub mod upload;
