//! Adaptive video scaler (AVS) coefficient tables and their cache.

pub(crate) mod cache;
pub(crate) mod polyphase;
