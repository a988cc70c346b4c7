//! Built-in method tables
//!
//! One registry per backend maps `(structure kind, method name)` to a
//! translation descriptor. Tables are validated against the verb morphology
//! when they are built, so an entry whose declared flags name no grammatical
//! form, or contradict a regular name's ending, is rejected before any
//! generation starts.

use crate::backend::Target;
use crate::morphology::{form_from_flags, resolve, Form, MethodFlags};
use faber_ast::StructureKind;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Receiver and argument text handed to an emission
#[derive(Debug, Clone, Copy)]
pub struct CallParts<'a> {
    pub receiver: &'a str,
    pub args: &'a [String],
    pub allocator: Option<&'a str>,
}

impl<'a> CallParts<'a> {
    pub fn new(receiver: &'a str, args: &'a [String]) -> Self {
        CallParts {
            receiver,
            args,
            allocator: None,
        }
    }

    pub fn with_allocator(mut self, allocator: Option<&'a str>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn joined_args(&self) -> String {
        self.args.join(", ")
    }
}

#[derive(Clone, Copy)]
pub enum Emission {
    /// `receiver.name(args)`
    Method(&'static str),
    /// `receiver.name`
    Property(&'static str),
    /// `$r` receiver, `$0`..`$9` arguments, `$*` all arguments, `$a` allocator
    Template(&'static str),
    Generate(fn(&CallParts<'_>) -> String),
    /// Renders the backend's compile-time failure marker
    Unsupported(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct MethodDescriptor {
    pub flags: MethodFlags,
    /// Set for historical names whose ending does not describe their behaviour
    pub irregular: bool,
    pub emission: Emission,
}

impl MethodDescriptor {
    pub const fn regular(flags: MethodFlags, emission: Emission) -> Self {
        MethodDescriptor {
            flags,
            irregular: false,
            emission,
        }
    }

    pub const fn irregular(flags: MethodFlags, emission: Emission) -> Self {
        MethodDescriptor {
            flags,
            irregular: true,
            emission,
        }
    }

    pub fn mutates(&self) -> bool {
        self.flags.contains(MethodFlags::MUTATES)
    }

    pub fn needs_allocation(&self) -> bool {
        self.flags.contains(MethodFlags::ALLOCATES)
    }

    pub fn is_async(&self) -> bool {
        self.flags.contains(MethodFlags::ASYNC)
    }
}

/// Synthesises a missing form from a sibling with the same stem.
///
/// The sibling is rendered against `binding` as its receiver, then `wrap`
/// embeds that text around the real receiver.
#[derive(Clone, Copy)]
pub struct Bridge {
    pub requested: Form,
    pub sibling: Form,
    pub binding: &'static str,
    pub wrap: fn(inner: &str, parts: &CallParts<'_>) -> String,
}

impl fmt::Debug for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Emission::Method(name) => write!(f, "Method({name})"),
            Emission::Property(name) => write!(f, "Property({name})"),
            Emission::Template(template) => write!(f, "Template({template:?})"),
            Emission::Generate(_) => write!(f, "Generate(..)"),
            Emission::Unsupported(message) => write!(f, "Unsupported({message:?})"),
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("requested", &self.requested)
            .field("sibling", &self.sibling)
            .field("binding", &self.binding)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Lookup<'r> {
    Explicit(&'r MethodDescriptor),
    Derived {
        form: Form,
        sibling: &'r str,
        descriptor: &'r MethodDescriptor,
        bridge: &'r Bridge,
    },
}

impl Lookup<'_> {
    pub fn flags(&self) -> MethodFlags {
        match self {
            Lookup::Explicit(descriptor) => descriptor.flags,
            Lookup::Derived { form, .. } => form.flags(),
        }
    }

    pub fn needs_allocation(&self) -> bool {
        self.flags().contains(MethodFlags::ALLOCATES)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{target} registry: {kind:?}.{method} declares flags {flags:?}, which match no verb form")]
    UnknownForm {
        target: Target,
        kind: StructureKind,
        method: String,
        flags: MethodFlags,
    },

    #[error("{target} registry: {kind:?}.{method} is declared {declared} but its ending reads as {derived}")]
    FormMismatch {
        target: Target,
        kind: StructureKind,
        method: String,
        declared: Form,
        derived: Form,
    },

    #[error("{target} registry: {kind:?}.{method} is listed twice")]
    Duplicate {
        target: Target,
        kind: StructureKind,
        method: String,
    },
}

pub type MethodTable = &'static [(&'static str, MethodDescriptor)];

pub struct MethodRegistry {
    target: Target,
    tables: HashMap<StructureKind, HashMap<&'static str, MethodDescriptor>>,
    bridges: Vec<Bridge>,
    marker: fn(&str) -> String,
}

impl MethodRegistry {
    pub fn build(
        target: Target,
        tables: &[(StructureKind, MethodTable)],
        bridges: &[Bridge],
        marker: fn(&str) -> String,
    ) -> Result<Self, RegistryError> {
        let mut built: HashMap<StructureKind, HashMap<&'static str, MethodDescriptor>> =
            HashMap::new();

        for (kind, entries) in tables {
            let table = built.entry(*kind).or_default();
            for (method, descriptor) in entries.iter() {
                validate_entry(target, *kind, method, descriptor)?;
                if table.insert(*method, *descriptor).is_some() {
                    return Err(RegistryError::Duplicate {
                        target,
                        kind: *kind,
                        method: method.to_string(),
                    });
                }
            }
        }

        debug!(
            backend = %target,
            methods = built.values().map(HashMap::len).sum::<usize>(),
            bridges = bridges.len(),
            "built method registry"
        );

        Ok(MethodRegistry {
            target,
            tables: built,
            bridges: bridges.to_vec(),
            marker,
        })
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Explicit entries first; otherwise a bridge from a same-stem sibling
    pub fn lookup(&self, kind: StructureKind, name: &str) -> Option<Lookup<'_>> {
        let table = self.tables.get(&kind)?;
        if let Some(descriptor) = table.get(name) {
            return Some(Lookup::Explicit(descriptor));
        }

        let conjugation = resolve(name)?;
        self.bridges
            .iter()
            .filter(|bridge| bridge.requested == conjugation.form)
            .find_map(|bridge| {
                bridge.sibling.suffixes().find_map(|suffix| {
                    let candidate = format!("{}{}", conjugation.stem, suffix);
                    table
                        .get_key_value(candidate.as_str())
                        .map(|(sibling, descriptor)| Lookup::Derived {
                            form: conjugation.form,
                            sibling: *sibling,
                            descriptor,
                            bridge,
                        })
                })
            })
    }

    pub fn render(&self, lookup: &Lookup<'_>, parts: &CallParts<'_>) -> String {
        match lookup {
            Lookup::Explicit(descriptor) => self.render_emission(&descriptor.emission, parts),
            Lookup::Derived {
                descriptor, bridge, ..
            } => {
                let inner_parts = CallParts {
                    receiver: bridge.binding,
                    ..*parts
                };
                let inner = self.render_emission(&descriptor.emission, &inner_parts);
                (bridge.wrap)(&inner, parts)
            }
        }
    }

    fn render_emission(&self, emission: &Emission, parts: &CallParts<'_>) -> String {
        match emission {
            Emission::Method(name) => format!("{}.{}({})", parts.receiver, name, parts.joined_args()),
            Emission::Property(name) => format!("{}.{}", parts.receiver, name),
            Emission::Template(template) => expand_template(template, parts),
            Emission::Generate(generate) => generate(parts),
            Emission::Unsupported(message) => (self.marker)(message),
        }
    }
}

fn validate_entry(
    target: Target,
    kind: StructureKind,
    method: &str,
    descriptor: &MethodDescriptor,
) -> Result<(), RegistryError> {
    let declared = form_from_flags(descriptor.flags).ok_or_else(|| RegistryError::UnknownForm {
        target,
        kind,
        method: method.to_string(),
        flags: descriptor.flags,
    })?;

    if descriptor.irregular {
        return Ok(());
    }
    match resolve(method) {
        Some(conjugation) if conjugation.form != declared => Err(RegistryError::FormMismatch {
            target,
            kind,
            method: method.to_string(),
            declared,
            derived: conjugation.form,
        }),
        _ => Ok(()),
    }
}

/// Expand `$r`, `$a`, `$*`, `$0`..`$9` and `$$`
pub fn expand_template(template: &str, parts: &CallParts<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('r') => {
                chars.next();
                out.push_str(parts.receiver);
            }
            Some('a') => {
                chars.next();
                out.push_str(parts.allocator.unwrap_or("allocator"));
            }
            Some('*') => {
                chars.next();
                out.push_str(&parts.joined_args());
            }
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let index = d.to_digit(10).unwrap_or(0) as usize;
                out.push_str(parts.arg(index));
            }
            _ => out.push('$'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTATES: MethodFlags = MethodFlags::MUTATES;
    const NEW: MethodFlags = MethodFlags::RETURNS_NEW.union(MethodFlags::ALLOCATES);

    fn marker(message: &str) -> String {
        format!("FAIL({message})")
    }

    fn copy_then(inner: &str, parts: &CallParts<'_>) -> String {
        format!("copy({}, c => {})", parts.receiver, inner)
    }

    const BRIDGES: &[Bridge] = &[Bridge {
        requested: Form::Perfect,
        sibling: Form::Imperative,
        binding: "c",
        wrap: copy_then,
    }];

    fn registry(entries: MethodTable) -> Result<MethodRegistry, RegistryError> {
        MethodRegistry::build(
            Target::TypeScript,
            &[(StructureKind::Sequence, entries)],
            BRIDGES,
            marker,
        )
    }

    #[test]
    fn test_explicit_entry_wins() {
        const TABLE: MethodTable = &[
            ("ordina", MethodDescriptor::regular(MUTATES, Emission::Method("sort"))),
            ("ordinata", MethodDescriptor::regular(NEW, Emission::Template("[...$r].sort()"))),
        ];
        let registry = registry(TABLE).unwrap();
        let lookup = registry.lookup(StructureKind::Sequence, "ordinata").unwrap();
        assert!(matches!(lookup, Lookup::Explicit(_)));
        let args: Vec<String> = Vec::new();
        assert_eq!(registry.render(&lookup, &CallParts::new("xs", &args)), "[...xs].sort()");
    }

    #[test]
    fn test_perfect_form_derived_from_imperative_sibling() {
        const TABLE: MethodTable =
            &[("ordina", MethodDescriptor::regular(MUTATES, Emission::Method("sort")))];
        let registry = registry(TABLE).unwrap();

        let lookup = registry.lookup(StructureKind::Sequence, "ordinata").unwrap();
        match lookup {
            Lookup::Derived { form, sibling, .. } => {
                assert_eq!(form, Form::Perfect);
                assert_eq!(sibling, "ordina");
            }
            other => panic!("expected derived lookup, got {other:?}"),
        }
        assert_eq!(lookup.flags(), NEW);
        let args: Vec<String> = Vec::new();
        assert_eq!(
            registry.render(&lookup, &CallParts::new("xs", &args)),
            "copy(xs, c => c.sort())"
        );
    }

    #[test]
    fn test_no_generic_primitive_reports_absent() {
        const TABLE: MethodTable =
            &[("ordina", MethodDescriptor::regular(MUTATES, Emission::Method("sort")))];
        let registry = registry(TABLE).unwrap();
        // prospective forms have no bridge here
        assert!(registry.lookup(StructureKind::Sequence, "ordinatura").is_none());
        assert!(registry.lookup(StructureKind::Sequence, "longitudo").is_none());
        assert!(registry.lookup(StructureKind::Map, "ordina").is_none());
    }

    #[test]
    fn test_unknown_flag_combination_is_rejected() {
        const TABLE: MethodTable = &[(
            "longitudo",
            MethodDescriptor::irregular(MethodFlags::ASYNC, Emission::Property("length")),
        )];
        assert!(matches!(registry(TABLE), Err(RegistryError::UnknownForm { .. })));
    }

    #[test]
    fn test_regular_name_must_agree_with_its_ending() {
        const TABLE: MethodTable = &[("filtrata", MethodDescriptor::regular(MUTATES, Emission::Method("filter")))];
        match registry(TABLE) {
            Err(RegistryError::FormMismatch {
                declared, derived, ..
            }) => {
                assert_eq!(declared, Form::Imperative);
                assert_eq!(derived, Form::Perfect);
            }
            other => panic!("expected mismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_irregular_names_may_disagree() {
        const TABLE: MethodTable = &[(
            "coniunge",
            MethodDescriptor::irregular(NEW, Emission::Method("join")),
        )];
        assert!(registry(TABLE).is_ok());
    }

    #[test]
    fn test_duplicates_are_rejected() {
        const TABLE: MethodTable = &[
            ("adde", MethodDescriptor::regular(MUTATES, Emission::Method("push"))),
            ("adde", MethodDescriptor::regular(MUTATES, Emission::Method("add"))),
        ];
        assert!(matches!(registry(TABLE), Err(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn test_unsupported_renders_marker() {
        const TABLE: MethodTable = &[(
            "mappata",
            MethodDescriptor::regular(NEW, Emission::Unsupported("lista.mappata needs closures")),
        )];
        let registry = registry(TABLE).unwrap();
        let lookup = registry.lookup(StructureKind::Sequence, "mappata").unwrap();
        let args: Vec<String> = Vec::new();
        assert_eq!(
            registry.render(&lookup, &CallParts::new("xs", &args)),
            "FAIL(lista.mappata needs closures)"
        );
    }

    #[test]
    fn test_template_expansion() {
        let args = vec!["1".to_string(), "2".to_string()];
        let parts = CallParts::new("xs", &args).with_allocator(Some("arena"));
        assert_eq!(
            expand_template("$r.insert($a, $1, $0) // $$ $*", &parts),
            "xs.insert(arena, 2, 1) // $ 1, 2"
        );
        let parts = CallParts::new("xs", &args);
        assert_eq!(expand_template("$r.append($a, $0)", &parts), "xs.append(allocator, 1)");
    }
}
