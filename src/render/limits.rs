use crate::{Error, Result};

/// Counters and ceilings that bound the cost of a single render.
///
/// A fresh instance is created for every render so the counters only ever
/// grow while a template is being rendered.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    render_length_limit: Option<usize>,
    render_score_limit: Option<usize>,
    assign_score_limit: Option<usize>,
    render_score: usize,
    assign_score: usize,
    /// The length of the capture buffer when it was last charged, only set
    /// while rendering inside a `capture`.
    last_capture_length: Option<usize>,
    reached: bool,
}

impl ResourceLimits {
    pub(crate) fn new(
        render_length_limit: Option<usize>,
        render_score_limit: Option<usize>,
        assign_score_limit: Option<usize>,
    ) -> Self {
        Self {
            render_length_limit,
            render_score_limit,
            assign_score_limit,
            ..Self::default()
        }
    }

    pub fn render_score(&self) -> usize {
        self.render_score
    }

    pub fn assign_score(&self) -> usize {
        self.assign_score
    }

    /// Whether any limit has been exceeded.
    pub fn reached(&self) -> bool {
        self.reached
    }

    /// Charges for visiting `amount` nodes.
    pub fn increment_render_score(&mut self, amount: usize) -> Result<()> {
        self.render_score = self.render_score.saturating_add(amount);
        match self.render_score_limit {
            Some(limit) if self.render_score > limit => self.limits_reached(),
            _ => Ok(()),
        }
    }

    /// Charges for assigning data of the given score.
    pub fn increment_assign_score(&mut self, amount: usize) -> Result<()> {
        self.assign_score = self.assign_score.saturating_add(amount);
        match self.assign_score_limit {
            Some(limit) if self.assign_score > limit => self.limits_reached(),
            _ => Ok(()),
        }
    }

    /// Charges for the output written so far.
    ///
    /// Inside a capture only the bytes written since the last call count,
    /// towards the assign score. Otherwise the whole output is checked
    /// against the render length limit.
    pub fn increment_write_score(&mut self, output: &str) -> Result<()> {
        let len = output.len();
        if let Some(last) = self.last_capture_length {
            self.last_capture_length = Some(len);
            self.increment_assign_score(len.saturating_sub(last))
        } else {
            match self.render_length_limit {
                Some(limit) if len > limit => self.limits_reached(),
                _ => Ok(()),
            }
        }
    }

    /// Starts a capture, writes are charged as assignments until the
    /// returned state is passed to [`end_capture`][Self::end_capture].
    pub(crate) fn begin_capture(&mut self) -> Option<usize> {
        self.last_capture_length.replace(0)
    }

    /// Starts rendering into a scratch buffer. Its writes are only checked
    /// against the render length limit, a capture pays for them once they
    /// are copied into it.
    ///
    /// Pass the returned state to [`end_capture`][Self::end_capture] once
    /// the buffer is done.
    pub(crate) fn begin_buffer(&mut self) -> Option<usize> {
        self.last_capture_length.take()
    }

    pub(crate) fn end_capture(&mut self, old: Option<usize>) {
        self.last_capture_length = old;
    }

    fn limits_reached(&mut self) -> Result<()> {
        self.reached = true;
        Err(Error::memory())
    }
}
