//! # Stack normalization
//!
//! Converts the raw trace the extension hands over into the stack entries of a
//! frame.
//!
//! A raw trace is whatever the host runtime's backtrace facility produced: one
//! record per call level, call site first, with optional class, call operator,
//! file, line and arguments. Normalization:
//!
//! - derives a call descriptor (`foo()`, `Cart->total()`, `{closure}`,
//!   `{extension}` for calls the runtime could not resolve)
//! - rewrites paths relative to the project root
//! - substitutes `[internal]` for records without a source file (native calls)
//! - synthesizes a `{main}` entry when the trace is empty, so a frame always has
//!   at least one entry

use logsnap_protocol::{EntryKind, StackEntry};
use serde::Deserialize;

use crate::path::PathNormalizer;
use crate::render::Renderer;
use crate::value::Value;

/// Function name the runtime reports for calls it cannot resolve.
pub const UNKNOWN_FUNCTION: &str = "unknown";
/// Descriptor substituted for [`UNKNOWN_FUNCTION`].
pub const EXTENSION_CALL: &str = "{extension}";
/// Descriptor of the synthesized top-level entry.
pub const MAIN_CALL: &str = "{main}";
/// Fragment the runtime uses in the names of anonymous functions.
pub const CLOSURE_MARKER: &str = "{closure}";
/// File name substituted for records without a source file.
pub const INTERNAL_FILE: &str = "[internal]";
/// Default pseudo-file the extension reports for code it evaluates itself.
pub const DEFAULT_EVAL_MARKER: &str = "logsnap://debug-eval";

/// One record of the runtime's backtrace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTraceEntry
{
    /// Function or method name.
    pub function: String,
    /// Declaring class for method calls.
    pub class: Option<String>,
    /// Call operator (`->` or `::`) for method calls.
    pub call_type: Option<String>,
    /// Source file of the call site, absent for native calls.
    pub file: Option<String>,
    /// Line of the call site, absent for native calls.
    pub line: Option<u32>,
    /// Call arguments, when the runtime captured them.
    pub args: Vec<Value>,
}

impl RawTraceEntry
{
    /// Plain function call at `file:line`.
    pub fn call(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self
    {
        Self {
            function: function.into(),
            file: Some(file.into()),
            line: Some(line),
            ..Self::default()
        }
    }

    /// Turn the record into a method call.
    #[must_use]
    pub fn on_class(mut self, class: impl Into<String>, call_type: impl Into<String>) -> Self
    {
        self.class = Some(class.into());
        self.call_type = Some(call_type.into());
        self
    }

    /// Attach captured arguments.
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self
    {
        self.args = args;
        self
    }
}

/// How call descriptors and locations are derived.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StackOptions
{
    /// Prefix method calls with their class and call operator.
    pub include_class: bool,
    /// Render call arguments inside the parentheses.
    pub include_args: bool,
    /// Pseudo-file reported for extension-evaluated code.
    pub eval_marker: String,
}

impl Default for StackOptions
{
    fn default() -> Self
    {
        Self {
            include_class: true,
            include_args: false,
            eval_marker: DEFAULT_EVAL_MARKER.to_string(),
        }
    }
}

/// Builds stack entries from raw traces.
#[derive(Debug, Clone)]
pub struct StackNormalizer
{
    paths: PathNormalizer,
    renderer: Renderer,
    options: StackOptions,
}

impl StackNormalizer
{
    /// Normalizer using `paths` for file names and `renderer` for arguments.
    #[must_use]
    pub fn new(paths: PathNormalizer, renderer: Renderer, options: StackOptions) -> Self
    {
        Self {
            paths,
            renderer,
            options,
        }
    }

    /// Path normalizer in use.
    #[must_use]
    pub fn paths(&self) -> &PathNormalizer
    {
        &self.paths
    }

    /// Stack entries for a trace, call site first. Never empty.
    #[must_use]
    pub fn normalize(&self, trace: &[RawTraceEntry], called_from_file: &str, called_from_line: u32) -> Vec<StackEntry>
    {
        if trace.is_empty() {
            let file = self.paths.normalize(called_from_file);
            return vec![StackEntry::new(MAIN_CALL, EntryKind::File, file, called_from_line)];
        }

        trace.iter().map(|record| self.entry(record)).collect()
    }

    /// Location a frame is attributed to.
    ///
    /// Code evaluated by the extension itself reports a pseudo-file with no
    /// useful line; such frames take the location of the first trace record.
    #[must_use]
    pub fn frame_location(&self, trace: &[RawTraceEntry], called_from_file: &str, called_from_line: u32) -> (String, u32)
    {
        if called_from_file == self.options.eval_marker {
            if let Some(RawTraceEntry {
                file: Some(file),
                line,
                ..
            }) = trace.first()
            {
                return (self.paths.normalize(file).into_owned(), line.unwrap_or(0));
            }
        }

        (self.paths.normalize(called_from_file).into_owned(), called_from_line)
    }

    fn entry(&self, record: &RawTraceEntry) -> StackEntry
    {
        let call = self.describe(record);
        match &record.file {
            Some(file) => StackEntry::new(call, EntryKind::File, self.paths.normalize(file), record.line.unwrap_or(0)),
            None => StackEntry::new(call, EntryKind::File, INTERNAL_FILE, record.line.unwrap_or(0)),
        }
    }

    /// Call descriptor of a record.
    #[must_use]
    pub fn describe(&self, record: &RawTraceEntry) -> String
    {
        if record.function == UNKNOWN_FUNCTION || record.function.is_empty() {
            return EXTENSION_CALL.to_string();
        }

        let mut call = String::new();
        if self.options.include_class {
            if let Some(class) = &record.class {
                call.push_str(class);
                call.push_str(record.call_type.as_deref().unwrap_or("->"));
            }
        }
        call.push_str(&record.function);

        if !record.function.contains(CLOSURE_MARKER) {
            call.push('(');
            if self.options.include_args {
                let args: Vec<String> = record.args.iter().map(|arg| self.renderer.render_inline(arg)).collect();
                call.push_str(&args.join(", "));
            }
            call.push(')');
        }

        call
    }
}
