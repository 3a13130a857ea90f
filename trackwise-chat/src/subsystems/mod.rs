pub mod assembler;
pub mod notify;
pub mod session;
pub mod summary;
