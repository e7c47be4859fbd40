pub mod blob_service;
pub mod http_service;
