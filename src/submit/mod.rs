pub mod command;
pub mod device;
pub(crate) mod status;
pub(crate) mod stream;
