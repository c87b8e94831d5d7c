pub mod envelope_service;
pub mod project_service;
