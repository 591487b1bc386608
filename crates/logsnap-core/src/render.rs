//! # Value rendering
//!
//! Turns a captured [`Value`] into a short, readable string.
//!
//! Rendering is the backpressure point of the whole pipeline: a single request
//! can hold megabytes of state, and everything rendered here ends up in a
//! payload that has to be shipped while the request winds down. Three bounds
//! keep the output small:
//!
//! - `max_depth`: containers nested deeper than this collapse to a one-line
//!   summary (`array:3 [ …3]`, `Cart {#4 …2}`)
//! - `max_items`: entries past this count are replaced by a `…N` marker
//! - `max_string`: strings are cut after this many characters, followed by
//!   `…N` with the number of characters dropped. Mapping keys, property names
//!   and class names are cut the same way.
//!
//! ## Output format
//!
//! ```text
//! array:2 [
//!   "id" => 42
//!   "tags" => array:3 [ …3]
//! ]
//! Cart {#4
//!   +items: array:1 [ …1]
//!   +owner: User {#9} *RECURSION*
//! }
//! ```

use std::fmt::Write as _;

use serde::Deserialize;

use crate::value::{Key, ObjectValue, Value};

/// Marker emitted for back-references and repeated object handles.
pub const RECURSION_MARKER: &str = "*RECURSION*";

/// Size limits applied by the [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderBounds
{
    /// Deepest container level that is expanded (the top level is depth 0).
    pub max_depth: usize,
    /// Entries shown per container.
    pub max_items: usize,
    /// Characters shown per string.
    pub max_string: usize,
}

impl Default for RenderBounds
{
    fn default() -> Self
    {
        Self {
            max_depth: 1,
            max_items: 50,
            max_string: 160,
        }
    }
}

/// Bounded value renderer.
///
/// Pure: the same value and bounds always give the same string.
#[derive(Debug, Clone, Copy, Default)]
pub struct Renderer
{
    bounds: RenderBounds,
}

impl Renderer
{
    /// Renderer with the given bounds.
    #[must_use]
    pub const fn new(bounds: RenderBounds) -> Self
    {
        Self { bounds }
    }

    /// Bounds in use.
    #[must_use]
    pub const fn bounds(&self) -> RenderBounds
    {
        self.bounds
    }

    /// Multi-line rendering used in variable dumps.
    #[must_use]
    pub fn render(&self, value: &Value) -> String
    {
        let mut walker = Walker::new(self.bounds);
        walker.value(value, 0);
        walker.out
    }

    /// Single-line rendering used for call arguments. Containers are never
    /// expanded.
    #[must_use]
    pub fn render_inline(&self, value: &Value) -> String
    {
        let bounds = RenderBounds {
            max_depth: 0,
            ..self.bounds
        };
        let mut walker = Walker::new(bounds);
        walker.value(value, 0);
        walker.out
    }
}

enum Label<'v>
{
    Index(usize),
    Key(&'v Key),
    Property(&'v str),
}

struct Walker
{
    bounds: RenderBounds,
    out: String,
    /// Handles of the objects currently being expanded.
    ancestors: Vec<u64>,
}

impl Walker
{
    fn new(bounds: RenderBounds) -> Self
    {
        Self {
            bounds,
            out: String::new(),
            ancestors: Vec::new(),
        }
    }

    fn value(&mut self, value: &Value, depth: usize)
    {
        match value {
            Value::Null => self.out.push_str("null"),
            Value::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Int(i) => {
                let _ = write!(self.out, "{i}");
            }
            Value::Float(f) => self.float(*f),
            Value::String(s) => self.string(s),
            Value::Sequence(items) => {
                let head = format!("array:{}", items.len());
                let entries = items.iter().enumerate().map(|(i, v)| (Label::Index(i), v));
                self.container(&head, "[", "]", items.len(), entries, depth);
            }
            Value::Mapping(entries) => {
                let head = format!("array:{}", entries.len());
                let labelled = entries.iter().map(|(k, v)| (Label::Key(k), v));
                self.container(&head, "[", "]", entries.len(), labelled, depth);
            }
            Value::Object(object) => self.object(object, depth),
            Value::Reference { class, handle } => self.recursion(class, Some(*handle)),
            Value::Opaque { type_name } => self.out.push_str(type_name),
        }
    }

    fn float(&mut self, f: f64)
    {
        if f.is_nan() {
            self.out.push_str("NAN");
        } else if f.is_infinite() {
            self.out.push_str(if f > 0.0 { "INF" } else { "-INF" });
        } else if f.fract() == 0.0 && f.abs() < 1e15 {
            let _ = write!(self.out, "{f:.1}");
        } else {
            let _ = write!(self.out, "{f}");
        }
    }

    /// First `max_string` characters of `s` with control characters escaped,
    /// and the number of characters cut.
    fn clip(&self, s: &str) -> (String, usize)
    {
        let mut text = String::new();
        for c in s.chars().take(self.bounds.max_string) {
            match c {
                '\n' => text.push_str("\\n"),
                '\r' => text.push_str("\\r"),
                '\t' => text.push_str("\\t"),
                c => text.push(c),
            }
        }
        (text, s.chars().count().saturating_sub(self.bounds.max_string))
    }

    fn string(&mut self, s: &str)
    {
        let (text, dropped) = self.clip(s);
        let _ = write!(self.out, "\"{text}\"");
        if dropped > 0 {
            let _ = write!(self.out, "…{dropped}");
        }
    }

    /// Unquoted identifier (class or property name), cut like a string.
    fn name(&self, s: &str) -> String
    {
        let (mut text, dropped) = self.clip(s);
        if dropped > 0 {
            let _ = write!(text, "…{dropped}");
        }
        text
    }

    fn object(&mut self, object: &ObjectValue, depth: usize)
    {
        if let Some(handle) = object.handle {
            if self.ancestors.contains(&handle) {
                self.recursion(&object.class, Some(handle));
                return;
            }
        }

        let class = self.name(&object.class);
        let head = match object.handle {
            Some(handle) => format!("{class} {{#{handle}"),
            None => format!("{class} {{"),
        };

        if object.properties.is_empty() {
            self.out.push_str(&head);
            self.out.push('}');
            return;
        }

        if let Some(handle) = object.handle {
            self.ancestors.push(handle);
        }
        let entries = object.properties.iter().map(|(k, v)| (Label::Property(k), v));
        self.container(&head, "", "}", object.properties.len(), entries, depth);
        if object.handle.is_some() {
            self.ancestors.pop();
        }
    }

    fn recursion(&mut self, class: &str, handle: Option<u64>)
    {
        let class = self.name(class);
        match handle {
            Some(handle) => {
                let _ = write!(self.out, "{class} {{#{handle}}} {RECURSION_MARKER}");
            }
            None => {
                let _ = write!(self.out, "{class} {{}} {RECURSION_MARKER}");
            }
        }
    }

    /// `head` + `open` starts the container (`array:2` + ` [`, `Cart {#4` + ``).
    fn container<'v, I>(&mut self, head: &str, open: &str, close: &str, len: usize, entries: I, depth: usize)
    where
        I: Iterator<Item = (Label<'v>, &'v Value)>,
    {
        self.out.push_str(head);
        if !open.is_empty() {
            self.out.push(' ');
            self.out.push_str(open);
        }

        if len == 0 {
            self.out.push_str(close);
            return;
        }

        if depth >= self.bounds.max_depth {
            let _ = write!(self.out, " …{len}{close}");
            return;
        }

        let indent = "  ".repeat(depth + 1);
        for (label, value) in entries.take(self.bounds.max_items) {
            self.out.push('\n');
            self.out.push_str(&indent);
            match label {
                Label::Index(i) => {
                    let _ = write!(self.out, "{i} => ");
                }
                Label::Key(Key::Int(key)) => {
                    let _ = write!(self.out, "{key} => ");
                }
                Label::Key(Key::Str(key)) => {
                    self.string(key);
                    self.out.push_str(" => ");
                }
                Label::Property(name) => {
                    let name = self.name(name);
                    let _ = write!(self.out, "+{name}: ");
                }
            }
            self.value(value, depth + 1);
        }

        if len > self.bounds.max_items {
            self.out.push('\n');
            self.out.push_str(&indent);
            let _ = write!(self.out, "…{}", len - self.bounds.max_items);
        }

        self.out.push('\n');
        self.out.push_str(&"  ".repeat(depth));
        self.out.push_str(close);
    }
}
