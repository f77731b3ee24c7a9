pub mod retry;
pub mod size;
