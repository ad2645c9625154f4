pub mod analysis;
pub mod http;
pub mod results;
pub mod status;
pub mod upload;
