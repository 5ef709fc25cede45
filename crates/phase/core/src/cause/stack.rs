//! Frame-scoped cause stack.
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use tracing::warn;

use super::{Cause, CauseObject, CauseStackError, ContextValue, EventContextKey};

/// Handle identifying one open frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

#[derive(Debug)]
struct FrameRecord {
    id: FrameId,
    /// Cause depth when the frame was opened.
    depth: usize,
    /// Phase that opened the frame, if any.
    phase: Option<u64>,
    /// First value seen for every key touched inside the frame.
    touched: Vec<(EventContextKey, Option<ContextValue>)>,
}

impl FrameRecord {
    fn record_touch(&mut self, key: EventContextKey, previous: Option<&ContextValue>) {
        if self.touched.iter().all(|(touched, _)| *touched != key) {
            self.touched.push((key, previous.cloned()));
        }
    }
}

/// Ordered causes plus keyed context, scoped by frames.
///
/// Leaving a frame truncates the causes back to the depth recorded on entry
/// and restores every context key touched inside it, even when inner frames
/// were never closed.
#[derive(Debug, Default)]
pub struct CauseStack {
    causes: Vec<CauseObject>,
    context: BTreeMap<EventContextKey, ContextValue>,
    frames: Vec<FrameRecord>,
    next_frame: u64,
}

impl CauseStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cause(&mut self, cause: CauseObject) {
        self.causes.push(cause);
    }

    /// Pops the most recent cause.
    ///
    /// Causes pushed before the innermost open frame belong to that frame's
    /// parent and cannot be popped from inside it.
    pub fn pop_cause(&mut self) -> Result<CauseObject, CauseStackError> {
        let floor = self.frames.last().map_or(0, |frame| frame.depth);
        if self.causes.len() <= floor {
            return Err(if self.causes.is_empty() {
                CauseStackError::Empty
            } else {
                CauseStackError::PopBelowFrame {
                    depth: self.causes.len(),
                    floor,
                }
            });
        }
        self.causes.pop().ok_or(CauseStackError::Empty)
    }

    pub fn peek_cause(&self) -> Option<&CauseObject> {
        self.causes.last()
    }

    /// Upserts a context value, returning the value it replaced.
    pub fn add_context(
        &mut self,
        key: EventContextKey,
        value: ContextValue,
    ) -> Option<ContextValue> {
        if let Some(frame) = self.frames.last_mut() {
            frame.record_touch(key, self.context.get(&key));
        }
        self.context.insert(key, value)
    }

    pub fn remove_context(&mut self, key: EventContextKey) -> Option<ContextValue> {
        if let Some(frame) = self.frames.last_mut() {
            frame.record_touch(key, self.context.get(&key));
        }
        self.context.remove(&key)
    }

    pub fn context(&self, key: EventContextKey) -> Option<&ContextValue> {
        self.context.get(&key)
    }

    /// Number of causes currently on the stack.
    pub fn depth(&self) -> usize {
        self.causes.len()
    }

    /// Number of open frames.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty() && self.context.is_empty() && self.frames.is_empty()
    }

    /// Opens a frame; close it with [`CauseStack::pop_frame`].
    pub fn push_frame(&mut self) -> FrameId {
        self.open_frame(None)
    }

    pub(crate) fn push_phase_frame(&mut self, phase: u64) -> FrameId {
        self.open_frame(Some(phase))
    }

    fn open_frame(&mut self, phase: Option<u64>) -> FrameId {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        self.frames.push(FrameRecord {
            id,
            depth: self.causes.len(),
            phase,
            touched: Vec::new(),
        });
        id
    }

    /// Closes `id` and every frame opened after it.
    pub fn pop_frame(&mut self, id: FrameId) -> Result<(), CauseStackError> {
        let index = self
            .frames
            .iter()
            .rposition(|frame| frame.id == id)
            .ok_or(CauseStackError::UnknownFrame)?;

        let nested = self.frames.len() - index - 1;
        if nested > 0 {
            warn!(
                target: "phase_core::cause",
                frame = ?id,
                nested,
                "closing cause frame with nested frames still open"
            );
        }

        while self.frames.len() > index {
            if let Some(frame) = self.frames.pop() {
                self.restore(frame);
            }
        }
        Ok(())
    }

    fn restore(&mut self, frame: FrameRecord) {
        self.causes.truncate(frame.depth);
        for (key, previous) in frame.touched.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.context.insert(key, value);
                }
                None => {
                    self.context.remove(&key);
                }
            }
        }
    }

    /// Opens a frame that closes itself when the returned guard is dropped.
    pub fn frame(&mut self) -> CauseStackFrame<'_> {
        let id = self.push_frame();
        CauseStackFrame { stack: self, id }
    }

    /// Phase that opened the innermost frame, if that frame belongs to a phase.
    pub fn current_phase_frame(&self) -> Option<u64> {
        self.frames.last().and_then(|frame| frame.phase)
    }

    /// Snapshot of the stack, most recent cause first.
    pub fn current_cause(&self) -> Cause {
        Cause::new(
            self.causes.iter().rev().cloned().collect(),
            self.context.clone(),
        )
    }
}

/// Scoped cause frame.
///
/// Dereferences to the underlying [`CauseStack`]; dropping it closes the frame
/// on every exit path.
pub struct CauseStackFrame<'a> {
    stack: &'a mut CauseStack,
    id: FrameId,
}

impl CauseStackFrame<'_> {
    pub fn id(&self) -> FrameId {
        self.id
    }
}

impl Deref for CauseStackFrame<'_> {
    type Target = CauseStack;

    fn deref(&self) -> &CauseStack {
        self.stack
    }
}

impl DerefMut for CauseStackFrame<'_> {
    fn deref_mut(&mut self) -> &mut CauseStack {
        self.stack
    }
}

impl Drop for CauseStackFrame<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.stack.pop_frame(self.id) {
            warn!(
                target: "phase_core::cause",
                frame = ?self.id,
                %error,
                "cause frame already closed"
            );
        }
    }
}
