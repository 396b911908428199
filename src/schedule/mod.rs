pub(crate) mod csc;
pub(crate) mod phase;
pub(crate) mod scaling;
pub(crate) mod scheduler;
