pub mod dto;
pub mod profile_store;
pub mod session;
pub mod task_store;
