//! Discovery of a module's generated export surface.

use std::collections::BTreeSet;

use kura_core::Capability;
use rquickjs::{Ctx, Function, Object, Value};

use crate::error::{HostError, HostResult};

/// Property marking the object a module's generated functions live on.
pub const EXPORTS_MARKER: &str = "__generatedExports";

/// Resolves a name in global scope, lexical declarations included.
const RESOLVE_BINDING: &str =
    "(name) => { try { return (0, eval)(name); } catch (_) { return undefined; } }";

/// Words that can never name a top-level binding.
const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// The callable surface a loaded module exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSurface {
    binding: String,
    capabilities: Vec<Capability>,
}

impl ExportSurface {
    /// Top-level binding holding the marked object.
    #[must_use]
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Capabilities whose functions are present, in declaration order.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Whether the function for `capability` is present.
    #[must_use]
    pub fn exports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Search the module's top-level bindings for exactly one marked object.
///
/// Global object properties (`var`, function declarations, assignments to
/// `globalThis`) are enumerated directly. `const`, `let` and `class`
/// declarations live outside the global object, so every identifier in
/// `code` is additionally resolved in global scope.
pub(crate) fn discover(ctx: &Ctx<'_>, code: &str) -> HostResult<ExportSurface> {
    let globals = ctx.globals();

    let mut candidates = BTreeSet::new();
    for key in globals.keys::<String>() {
        let key = key?;
        let value: Value = globals.get(key.as_str())?;
        if exports_of(&value)?.is_some() {
            candidates.insert(key);
        }
    }

    let resolver: Function = ctx.eval(RESOLVE_BINDING)?;
    for name in identifiers(code) {
        if candidates.contains(&name) || globals.contains_key(name.as_str())? {
            continue;
        }
        let value: Value = resolver.call((name.as_str(),))?;
        if exports_of(&value)?.is_some() {
            candidates.insert(name);
        }
    }

    let mut candidates: Vec<String> = candidates.into_iter().collect();
    let binding = match candidates.len() {
        0 => return Err(HostError::MissingExports),
        1 => candidates.remove(0),
        _ => return Err(HostError::AmbiguousExports(candidates)),
    };

    let exports = lookup_exports(ctx, &binding)?;
    let mut capabilities = Vec::new();
    for capability in Capability::ALL {
        let member: Value = exports.get(capability.method_name())?;
        if member.is_function() {
            capabilities.push(capability);
        }
    }

    if !capabilities.contains(&Capability::Manifest) {
        return Err(HostError::MissingCapability(Capability::Manifest));
    }

    Ok(ExportSurface {
        binding,
        capabilities,
    })
}

/// Resolve the exports object and the function for `capability`.
pub(crate) fn lookup<'js>(
    ctx: &Ctx<'js>,
    surface: &ExportSurface,
    capability: Capability,
) -> HostResult<(Object<'js>, Function<'js>)> {
    let exports = lookup_exports(ctx, surface.binding())?;
    let member: Value = exports.get(capability.method_name())?;
    let function = member
        .as_function()
        .cloned()
        .ok_or(HostError::MissingCapability(capability))?;
    Ok((exports, function))
}

fn lookup_exports<'js>(ctx: &Ctx<'js>, binding: &str) -> HostResult<Object<'js>> {
    let globals = ctx.globals();
    let value: Value = if globals.contains_key(binding)? {
        globals.get(binding)?
    } else {
        let resolver: Function = ctx.eval(RESOLVE_BINDING)?;
        resolver.call((binding,))?
    };
    exports_of(&value)?.ok_or(HostError::MissingExports)
}

fn exports_of<'js>(value: &Value<'js>) -> rquickjs::Result<Option<Object<'js>>> {
    let Some(object) = value.as_object() else {
        return Ok(None);
    };
    let marked: Value = object.get(EXPORTS_MARKER)?;
    Ok(marked.as_object().cloned())
}

/// Identifiers in `code` outside comments and string literals, skipping
/// property accesses and reserved words.
fn identifiers(code: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut chars = code.chars().peekable();
    let mut after_dot = false;

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            },
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut star = false;
                for next in chars.by_ref() {
                    if star && next == '/' {
                        break;
                    }
                    star = next == '*';
                }
            },
            '"' | '\'' | '`' => {
                let mut escaped = false;
                for next in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == c {
                        break;
                    }
                }
            },
            c if is_identifier_start(c) => {
                let mut name = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !is_identifier_part(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                if !after_dot && !RESERVED.contains(&name.as_str()) {
                    names.insert(name);
                }
            },
            _ => {},
        }
        if !c.is_whitespace() {
            after_dot = c == '.';
        }
    }

    names
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
