pub mod extract;
pub mod health_handlers;
pub mod principal;
pub mod upload_handlers;
