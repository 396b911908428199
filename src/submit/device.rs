//! Boundary contract with the device command layer.

use crate::foundation::core::GpuContextId;
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::submit::command::Command;

/// Primary command buffer handed out by the device.
///
/// `data` holds everything emitted so far; `remaining` is the free space in dwords.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    data: Vec<u32>,
    remaining: usize,
}

impl CommandBuffer {
    /// Empty buffer with room for `capacity` dwords.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            remaining: capacity,
        }
    }

    /// Dwords emitted so far.
    pub fn cursor(&self) -> usize {
        self.data.len()
    }

    /// Free space in dwords.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Emitted stream.
    pub fn dwords(&self) -> &[u32] {
        &self.data
    }

    pub(crate) fn emit(&mut self, cmd: &Command<'_>) -> CompositeResult<()> {
        let n = cmd.dwords();
        if n > self.remaining {
            return Err(CompositeError::submission(format!(
                "command buffer full: {n} dwords needed, {} left",
                self.remaining
            )));
        }
        cmd.encode(&mut self.data);
        self.remaining -= n;
        Ok(())
    }

    /// Restore a position captured with [`CommandBuffer::cursor`] / [`CommandBuffer::remaining`].
    pub(crate) fn rollback(&mut self, cursor: usize, remaining: usize) {
        self.data.truncate(cursor);
        self.remaining = remaining;
    }
}

/// Device command layer owned by the embedding driver.
///
/// Completion tags are per GPU context and advance once per finished composite call. The sync tag
/// retires batch buffers and advances once per submitted phase.
pub trait CommandDevice {
    /// Borrow the primary command buffer.
    fn get_command_buffer(&mut self) -> CompositeResult<CommandBuffer>;

    /// Give back a command buffer without submitting it.
    fn return_command_buffer(&mut self, buf: CommandBuffer);

    /// Queue `buf` for execution. With `null_render` the device skips execution but still
    /// advances its tags.
    fn submit_command_buffer(
        &mut self,
        buf: CommandBuffer,
        null_render: bool,
    ) -> CompositeResult<()>;

    /// Next completion tag of `ctx`.
    fn completion_tag(&self, ctx: GpuContextId) -> u32;

    /// Advance the completion tag of `ctx`.
    fn increment_completion_tag(&mut self, ctx: GpuContextId);

    /// Last completion tag `ctx` has reported done.
    fn reported_completion_tag(&self, ctx: GpuContextId) -> u32;

    /// Last sync tag the device has reported done.
    fn reported_sync_tag(&self) -> u32;
}
