pub mod intake;
pub mod session;
