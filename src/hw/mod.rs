pub mod caps;
pub(crate) mod static_data;
