//! Frame-based output sink.

use crate::BuildError;

/// A single buffered frame of serialized output.
///
/// Each frame tracks separator state per open container so entries can be
/// emitted incrementally without a trailing-comma fixup pass.
#[derive(Debug)]
struct Frame {
    buf: String,
    /// One flag per open container; `true` once the container has entries.
    /// The bottom flag describes the scope the frame itself lives in.
    seps: Vec<bool>,
    /// Set after an attribute name has been written and its value is still
    /// outstanding; the next emission must not write a separator.
    pending_value: bool,
}

impl Frame {
    fn new(continuing: bool) -> Self {
        Self {
            buf: String::new(),
            seps: vec![continuing],
            pending_value: false,
        }
    }
}

/// Mutable output sink threaded through every emission call.
///
/// Capture is a push/pop of the frame stack: a pushed frame isolates all
/// output produced while it is on top, and popping returns that text to the
/// caller untouched. A frame pushed as "continuing" behaves as if its
/// enclosing container already holds entries, so the first emission carries
/// its leading separator.
#[derive(Debug)]
pub struct OutputSink {
    frames: Vec<Frame>,
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink {
    /// Create a sink with a single root frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new(false)],
        }
    }

    fn top(&mut self) -> &mut Frame {
        // The root frame is never popped, so the stack is non-empty.
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Push an isolated capture frame.
    pub fn push_frame(&mut self, continuing: bool) {
        self.frames.push(Frame::new(continuing));
    }

    /// Pop the top capture frame and return its buffered text.
    pub fn pop_frame(&mut self) -> Result<String, BuildError> {
        if self.frames.len() < 2 {
            return Err(BuildError::CaptureUnderflow);
        }
        Ok(self.frames.pop().map(|f| f.buf).unwrap_or_default())
    }

    /// Append raw text to the current frame.
    pub fn write_raw(&mut self, text: &str) {
        self.top().buf.push_str(text);
    }

    /// Write the separator for a new entry in the current container, unless
    /// an attribute name is pending its value.
    pub fn entry_prefix(&mut self) {
        let frame = self.top();
        if frame.pending_value {
            frame.pending_value = false;
            return;
        }
        if let Some(has_entries) = frame.seps.last_mut() {
            if *has_entries {
                frame.buf.push(',');
            } else {
                *has_entries = true;
            }
        }
    }

    /// Mark the current container as holding entries without writing.
    pub fn mark_entry(&mut self) {
        if let Some(has_entries) = self.top().seps.last_mut() {
            *has_entries = true;
        }
    }

    /// Flag that an attribute name has been written and its value follows.
    pub fn expect_value(&mut self) {
        self.top().pending_value = true;
    }

    /// Open a container scope with the given delimiter.
    pub fn open_container(&mut self, delim: char) {
        let frame = self.top();
        frame.buf.push(delim);
        frame.seps.push(false);
    }

    /// Close the innermost container scope.
    pub fn close_container(&mut self, delim: char) -> Result<(), BuildError> {
        let frame = self.top();
        if frame.seps.len() < 2 {
            return Err(BuildError::ScopeUnderflow(format!(
                "unmatched '{delim}'"
            )));
        }
        frame.seps.pop();
        frame.buf.push(delim);
        Ok(())
    }

    /// Whether emission is currently at the root of the document.
    pub fn at_root(&self) -> bool {
        self.frames.len() == 1 && self.frames[0].seps.len() == 1
    }

    /// Consume the sink and return the root frame's text.
    pub fn into_output(mut self) -> String {
        std::mem::take(&mut self.frames[0].buf)
    }
}
