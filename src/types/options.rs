/// How strictly tag markup is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorMode {
    /// Unrecognized trailing markup is ignored.
    #[default]
    Lax,
    /// Markup is parsed strictly, on failure it is reparsed leniently and a
    /// warning is recorded on the template.
    Warn,
    /// Malformed markup is a syntax error.
    Strict,
}

/// The engine configuration.
///
/// Use [`Options::default()`] for lenient parsing without any resource
/// limits and [`Options::builder()`] to customize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub(crate) error_mode: ErrorMode,
    pub(crate) render_length_limit: Option<usize>,
    pub(crate) render_score_limit: Option<usize>,
    pub(crate) assign_score_limit: Option<usize>,
    pub(crate) bug_compatible_whitespace_trimming: bool,
    pub(crate) strict_variables: bool,
    pub(crate) strict_filters: bool,
    pub(crate) line_numbers: bool,
}

/// A builder for the engine configuration.
///
/// This struct is typically created using [`Options::builder()`].
#[derive(Debug, Clone)]
pub struct OptionsBuilder {
    options: Options,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Lax,
            render_length_limit: None,
            render_score_limit: None,
            assign_score_limit: None,
            bug_compatible_whitespace_trimming: false,
            strict_variables: false,
            strict_filters: false,
            line_numbers: true,
        }
    }
}

impl Options {
    /// Create a new options builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use dry::{ErrorMode, Options};
    ///
    /// let options = Options::builder()
    ///     .error_mode(ErrorMode::Strict)
    ///     .render_length_limit(1024)
    ///     .build();
    /// ```
    #[inline]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder {
            options: Options::default(),
        }
    }

    /// Returns the configured error mode.
    #[inline]
    pub fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }
}

impl OptionsBuilder {
    /// Set how strictly tag markup is parsed.
    ///
    /// Defaults to [`ErrorMode::Lax`].
    #[inline]
    pub fn error_mode(&mut self, mode: ErrorMode) -> &mut Self {
        self.options.error_mode = mode;
        self
    }

    /// Abort rendering once the output grows past this many bytes.
    #[inline]
    pub fn render_length_limit(&mut self, limit: usize) -> &mut Self {
        self.options.render_length_limit = Some(limit);
        self
    }

    /// Abort rendering once more than this many nodes have been rendered.
    #[inline]
    pub fn render_score_limit(&mut self, limit: usize) -> &mut Self {
        self.options.render_score_limit = Some(limit);
        self
    }

    /// Abort rendering once the size of all assigned and captured data
    /// exceeds this limit.
    #[inline]
    pub fn assign_score_limit(&mut self, limit: usize) -> &mut Self {
        self.options.assign_score_limit = Some(limit);
        self
    }

    /// When trimming whitespace before a tag would leave the preceding text
    /// empty, keep its first byte instead.
    ///
    /// Older templates can rely on this behaviour.
    #[inline]
    pub fn bug_compatible_whitespace_trimming(&mut self, yes: bool) -> &mut Self {
        self.options.bug_compatible_whitespace_trimming = yes;
        self
    }

    /// Make undefined variables an error by default.
    #[inline]
    pub fn strict_variables(&mut self, yes: bool) -> &mut Self {
        self.options.strict_variables = yes;
        self
    }

    /// Make unknown filters an error by default.
    #[inline]
    pub fn strict_filters(&mut self, yes: bool) -> &mut Self {
        self.options.strict_filters = yes;
        self
    }

    /// Whether error messages include the line they occurred on.
    ///
    /// Defaults to `true`.
    #[inline]
    pub fn line_numbers(&mut self, yes: bool) -> &mut Self {
        self.options.line_numbers = yes;
        self
    }

    /// Builds the options.
    #[inline]
    pub fn build(&self) -> Options {
        self.options.clone()
    }
}
