//! Zig method table
//!
//! Collections are the unmanaged std containers, so every growing call takes
//! `$a`, the innermost allocator binding. Transformations that need a closure
//! have no Zig equivalent and render a compile-time failure.

use crate::backend::utils::quote;
use crate::backend::Target;
use crate::morphology::{Form, MethodFlags};
use crate::registry::{
    Bridge, CallParts, Emission, Lookup, MethodDescriptor, MethodRegistry, MethodTable,
    RegistryError,
};
use faber_ast::StructureKind;
use once_cell::sync::Lazy;

pub(super) const MARKER: &str = "@compileError";

const MUTATES: MethodFlags = MethodFlags::MUTATES;
const NEW: MethodFlags = MethodFlags::RETURNS_NEW.union(MethodFlags::ALLOCATES);
const QUERY: MethodFlags = MethodFlags::empty();

const fn regular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::regular(flags, emission)
}

const fn irregular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::irregular(flags, emission)
}

const NEEDS_CLOSURE: Emission = Emission::Unsupported("closures are not available in Zig");

fn slice(parts: &CallParts<'_>) -> String {
    match parts.args {
        [start] => format!("{}.items[@intCast({})..]", parts.receiver, start),
        [start, end, ..] => format!(
            "{}.items[@intCast({})..@intCast({})]",
            parts.receiver, start, end
        ),
        [] => format!("{}.items", parts.receiver),
    }
}

const SEQUENCE: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Template("$r.append($a, $0) catch @panic(\"OOM\")"))),
    ("praepone", regular(MUTATES, Emission::Template("$r.insert($a, 0, $0) catch @panic(\"OOM\")"))),
    ("remove", regular(MUTATES, Emission::Template("$r.pop()"))),
    ("decapita", irregular(MUTATES, Emission::Template("$r.orderedRemove(0)"))),
    ("filtra", regular(MUTATES, NEEDS_CLOSURE)),
    ("filtrata", regular(NEW, NEEDS_CLOSURE)),
    ("mappata", regular(NEW, NEEDS_CLOSURE)),
    ("explanata", regular(NEW, NEEDS_CLOSURE)),
    (
        "ordina",
        regular(
            MUTATES,
            Emission::Template("std.mem.sort(@TypeOf($r.items[0]), $r.items, {}, std.sort.asc(@TypeOf($r.items[0])))"),
        ),
    ),
    ("inverte", regular(MUTATES, Emission::Template("std.mem.reverse(@TypeOf($r.items[0]), $r.items)"))),
    (
        "inversa",
        regular(
            NEW,
            Emission::Template(
                "blk: { const __r = $a.dupe(@TypeOf($r.items[0]), $r.items) catch @panic(\"OOM\"); std.mem.reverse(@TypeOf(__r[0]), __r); break :blk __r; }",
            ),
        ),
    ),
    ("purga", regular(MUTATES, Emission::Template("$r.clearRetainingCapacity()"))),
    (
        "continet",
        regular(QUERY, Emission::Template("(std.mem.indexOfScalar(@TypeOf($r.items[0]), $r.items, $0) != null)")),
    ),
    ("longitudo", regular(QUERY, Emission::Template("@as(i64, @intCast($r.items.len))"))),
    ("primus", regular(QUERY, Emission::Template("(if ($r.items.len > 0) $r.items[0] else null)"))),
    ("ultimus", regular(QUERY, Emission::Template("$r.getLastOrNull()"))),
    ("sectio", regular(NEW, Emission::Generate(slice))),
    ("reducta", regular(NEW, NEEDS_CLOSURE)),
    ("omnes", regular(QUERY, NEEDS_CLOSURE)),
    ("aliquis", regular(QUERY, NEEDS_CLOSURE)),
    (
        "summa",
        irregular(
            QUERY,
            Emission::Template("blk: { var __s: i64 = 0; for ($r.items) |__x| __s += __x; break :blk __s; }"),
        ),
    ),
    ("maximum", regular(QUERY, Emission::Template("std.mem.max(@TypeOf($r.items[0]), $r.items)"))),
    ("minimum", regular(QUERY, Emission::Template("std.mem.min(@TypeOf($r.items[0]), $r.items)"))),
    ("coniunge", irregular(NEW, Emission::Template("std.mem.join($a, $0, $r.items) catch @panic(\"OOM\")"))),
    ("inveni", irregular(QUERY, NEEDS_CLOSURE)),
    (
        "indiceDe",
        irregular(QUERY, Emission::Template("std.mem.indexOfScalar(@TypeOf($r.items[0]), $r.items, $0)")),
    ),
    ("perambula", irregular(QUERY, NEEDS_CLOSURE)),
    ("accipe", irregular(QUERY, Emission::Template("$r.items[@intCast($0)]"))),
];

const MAP: MethodTable = &[
    ("pone", regular(MUTATES, Emission::Template("$r.put($a, $0, $1) catch @panic(\"OOM\")"))),
    ("accipe", irregular(QUERY, Emission::Template("$r.get($0)"))),
    ("habet", regular(QUERY, Emission::Template("$r.contains($0)"))),
    ("dele", regular(MUTATES, Emission::Template("$r.remove($0)"))),
    ("purga", regular(MUTATES, Emission::Template("$r.clearRetainingCapacity()"))),
    ("claves", regular(NEW, Emission::Unsupported("tabula.claves: iterate with keyIterator"))),
    ("valores", regular(NEW, Emission::Unsupported("tabula.valores: iterate with valueIterator"))),
    ("paria", irregular(NEW, Emission::Unsupported("tabula.paria: iterate with iterator"))),
    ("longitudo", regular(QUERY, Emission::Template("@as(i64, @intCast($r.count()))"))),
];

const SET: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Template("$r.put($a, $0, {}) catch @panic(\"OOM\")"))),
    ("habet", regular(QUERY, Emission::Template("$r.contains($0)"))),
    ("dele", regular(MUTATES, Emission::Template("$r.remove($0)"))),
    ("purga", regular(MUTATES, Emission::Template("$r.clearRetainingCapacity()"))),
    ("longitudo", regular(QUERY, Emission::Template("@as(i64, @intCast($r.count()))"))),
    ("unita", regular(NEW, Emission::Unsupported("copia.unita is not available in Zig"))),
    ("intersecta", regular(NEW, Emission::Unsupported("copia.intersecta is not available in Zig"))),
];

const SCALAR: MethodTable = &[
    ("initium", regular(QUERY, Emission::Template("std.mem.startsWith(u8, $r, $0)"))),
    ("finis", regular(QUERY, Emission::Template("std.mem.endsWith(u8, $r, $0)"))),
    ("maiuscula", irregular(NEW, Emission::Template("std.ascii.allocUpperString($a, $r) catch @panic(\"OOM\")"))),
    ("minuscula", irregular(NEW, Emission::Template("std.ascii.allocLowerString($a, $r) catch @panic(\"OOM\")"))),
    ("recide", irregular(NEW, Emission::Template("std.mem.trim(u8, $r, \" \\t\\r\\n\")"))),
    ("divide", irregular(NEW, Emission::Template("std.mem.splitSequence(u8, $r, $0)"))),
    (
        "muta",
        irregular(NEW, Emission::Template("std.mem.replaceOwned(u8, $a, $r, $0, $1) catch @panic(\"OOM\")")),
    ),
    ("continet", regular(QUERY, Emission::Template("(std.mem.indexOf(u8, $r, $0) != null)"))),
    ("longitudo", regular(QUERY, Emission::Template("@as(i64, @intCast($r.len))"))),
    (
        "inversa",
        regular(
            NEW,
            Emission::Template(
                "blk: { const __t = $a.dupe(u8, $r) catch @panic(\"OOM\"); std.mem.reverse(u8, __t); break :blk __t; }",
            ),
        ),
    ),
];

/// Calls whose Zig translation yields no value and may stand as a statement
const VOID_RESULTS: &[(StructureKind, &str)] = &[
    (StructureKind::Sequence, "adde"),
    (StructureKind::Sequence, "praepone"),
    (StructureKind::Sequence, "ordina"),
    (StructureKind::Sequence, "inverte"),
    (StructureKind::Sequence, "purga"),
    (StructureKind::Map, "pone"),
    (StructureKind::Map, "purga"),
    (StructureKind::Set, "adde"),
    (StructureKind::Set, "purga"),
];

pub(super) fn returns_void(kind: StructureKind, name: &str) -> bool {
    VOID_RESULTS.contains(&(kind, name))
}

/// Whether rendering `lookup` references the allocator
pub(super) fn uses_allocator(lookup: &Lookup<'_>) -> bool {
    match lookup {
        Lookup::Explicit(descriptor) => match descriptor.emission {
            Emission::Template(template) => template.contains("$a"),
            _ => false,
        },
        Lookup::Derived { .. } => true,
    }
}

fn clone_then_mutate(inner: &str, parts: &CallParts<'_>) -> String {
    format!(
        "blk: {{ var __c = {}.clone({}) catch @panic(\"OOM\"); {inner}; break :blk __c; }}",
        parts.receiver,
        parts.allocator.unwrap_or("allocator")
    )
}

const BRIDGES: &[Bridge] = &[Bridge {
    requested: Form::Perfect,
    sibling: Form::Imperative,
    binding: "__c",
    wrap: clone_then_mutate,
}];

fn marker(message: &str) -> String {
    format!("{MARKER}({})", quote(message))
}

static REGISTRY: Lazy<Result<MethodRegistry, RegistryError>> = Lazy::new(|| {
    MethodRegistry::build(
        Target::Zig,
        &[
            (StructureKind::Sequence, SEQUENCE),
            (StructureKind::Map, MAP),
            (StructureKind::Set, SET),
            (StructureKind::Scalar, SCALAR),
        ],
        BRIDGES,
        marker,
    )
});

pub(super) fn registry() -> Result<&'static MethodRegistry, RegistryError> {
    REGISTRY.as_ref().map_err(Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(kind: StructureKind, name: &str, allocator: Option<&str>, args: &[&str]) -> String {
        let registry = registry().unwrap();
        let lookup = registry.lookup(kind, name).unwrap();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        registry.render(&lookup, &CallParts::new("xs", &args).with_allocator(allocator))
    }

    #[test]
    fn test_registry_validates() {
        assert!(registry().is_ok());
    }

    #[test]
    fn test_append_takes_current_allocator() {
        assert_eq!(
            render(StructureKind::Sequence, "adde", Some("alloc"), &["3"]),
            "xs.append(alloc, 3) catch @panic(\"OOM\")"
        );
        assert_eq!(
            render(StructureKind::Sequence, "adde", None, &["3"]),
            "xs.append(allocator, 3) catch @panic(\"OOM\")"
        );
    }

    #[test]
    fn test_closure_methods_render_marker() {
        let text = render(StructureKind::Sequence, "mappata", None, &["f"]);
        assert_eq!(text, "@compileError(\"closures are not available in Zig\")");
    }

    #[test]
    fn test_perfect_bridge_clones_with_allocator() {
        assert_eq!(
            render(StructureKind::Sequence, "purgata", Some("alloc"), &[]),
            "blk: { var __c = xs.clone(alloc) catch @panic(\"OOM\"); __c.clearRetainingCapacity(); break :blk __c; }"
        );
    }

    #[test]
    fn test_allocator_detection() {
        let registry = registry().unwrap();
        let append = registry.lookup(StructureKind::Sequence, "adde").unwrap();
        let length = registry.lookup(StructureKind::Sequence, "longitudo").unwrap();
        assert!(uses_allocator(&append));
        assert!(!uses_allocator(&length));
        assert!(returns_void(StructureKind::Sequence, "adde"));
        assert!(!returns_void(StructureKind::Sequence, "remove"));
    }
}
