pub(crate) mod cache;
pub(crate) mod csc;
pub(crate) mod descriptor;
pub(crate) mod library;
