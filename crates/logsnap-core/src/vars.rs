//! Variable groups attached to the call-site stack entry.

use logsnap_protocol::StackEntry;

use crate::render::Renderer;
use crate::value::{Bindings, Value};

/// Group holding the local variables of the call site.
pub const LOCALS: &str = "Locals";
/// Group holding the request's global variables (first frame only).
pub const SUPERGLOBALS: &str = "Superglobals";
/// Group holding user-defined constants (first frame only).
pub const USER_CONSTANTS: &str = "User defined constants";
/// Name given to a watched value the extension did not name.
pub const DEFAULT_WATCH_NAME: &str = "value";

/// Request superglobals that the runtime includes in the local scope.
///
/// They describe the request, not user state, and are never shown as locals.
pub const RESERVED_LOCALS: [&str; 7] = ["_GET", "_POST", "_COOKIE", "_FILES", "_ENV", "_REQUEST", "_SERVER"];

/// Named set of bindings rendered into a stack entry's dump.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableGroup
{
    /// Header line, omitted for unnamed groups.
    pub name: Option<String>,
    /// Whether names are variables (`$name`) rather than constants.
    pub sigil: bool,
    /// The bindings, in order.
    pub bindings: Bindings,
}

impl VariableGroup
{
    /// Group of variables.
    pub fn named(name: impl Into<String>, bindings: Bindings) -> Self
    {
        Self {
            name: Some(name.into()),
            sigil: true,
            bindings,
        }
    }

    /// Group of user-defined constants; names are printed without a sigil.
    #[must_use]
    pub fn constants(bindings: Bindings) -> Self
    {
        Self {
            name: Some(USER_CONSTANTS.to_string()),
            sigil: false,
            bindings,
        }
    }

    /// Single explicitly watched value, under `label` if one is configured.
    #[must_use]
    pub fn watched(label: Option<&str>, name: Option<&str>, value: Value) -> Self
    {
        let mut bindings = Bindings::new();
        bindings.insert(name.unwrap_or(DEFAULT_WATCH_NAME), value);
        Self {
            name: label.map(str::to_string),
            sigil: true,
            bindings,
        }
    }

    /// Rendered block: optional `// name` header, then one `$var = value;` line
    /// per binding.
    #[must_use]
    pub fn render(&self, renderer: &Renderer) -> String
    {
        let mut out = String::new();
        if let Some(name) = &self.name {
            out.push_str("// ");
            out.push_str(name);
            out.push('\n');
        }
        for (name, value) in self.bindings.iter() {
            if self.sigil {
                out.push('$');
            }
            out.push_str(name);
            out.push_str(" = ");
            out.push_str(renderer.render(value).trim());
            out.push_str(";\n");
        }
        out
    }

    /// Render into `entry` and mark it as carrying context. Groups are separated
    /// by a blank line.
    pub fn attach_to(&self, entry: &mut StackEntry, renderer: &Renderer)
    {
        entry.retrieve_context = true;
        if !entry.dump_readable.is_empty() {
            entry.dump_readable.push('\n');
        }
        entry.dump_readable.push_str(&self.render(renderer));
    }
}

/// Remove reserved names from a local scope.
pub fn strip_reserved(locals: &mut Bindings, reserved: &[String])
{
    locals.retain(|name| !reserved.iter().any(|r| r == name));
}
