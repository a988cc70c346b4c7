//! C++ method table
//!
//! Sequences are `std::vector`, maps and sets the unordered containers, text
//! `std::string`. Transformations that produce a new value run in an
//! immediately invoked lambda so they stay expressions. Text helpers the
//! standard library lacks live in the preamble's `faber` namespace.

use crate::backend::utils::quote;
use crate::backend::Target;
use crate::morphology::{Form, MethodFlags};
use crate::registry::{
    Bridge, CallParts, Emission, MethodDescriptor, MethodRegistry, MethodTable, RegistryError,
};
use faber_ast::StructureKind;
use once_cell::sync::Lazy;

pub(super) const MARKER: &str = "static_assert(false";

const MUTATES: MethodFlags = MethodFlags::MUTATES;
const NEW: MethodFlags = MethodFlags::RETURNS_NEW.union(MethodFlags::ALLOCATES);
const QUERY: MethodFlags = MethodFlags::empty();

const fn regular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::regular(flags, emission)
}

const fn irregular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::irregular(flags, emission)
}

fn slice(parts: &CallParts<'_>) -> String {
    let receiver = parts.receiver;
    match parts.args {
        [start] => format!("std::vector({receiver}.begin() + {start}, {receiver}.end())"),
        [start, end, ..] => {
            format!("std::vector({receiver}.begin() + {start}, {receiver}.begin() + {end})")
        }
        [] => receiver.to_string(),
    }
}

const SEQUENCE: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("push_back"))),
    ("praepone", regular(MUTATES, Emission::Template("$r.insert($r.begin(), $0)"))),
    ("remove", regular(MUTATES, Emission::Method("pop_back"))),
    ("decapita", irregular(MUTATES, Emission::Template("$r.erase($r.begin())"))),
    (
        "filtra",
        regular(MUTATES, Emission::Template("std::erase_if($r, [&](const auto& __x) { return !$0(__x); })")),
    ),
    (
        "filtrata",
        regular(
            NEW,
            Emission::Template(
                "[&] { auto __out = $r; std::erase_if(__out, [&](const auto& __x) { return !$0(__x); }); return __out; }()",
            ),
        ),
    ),
    (
        "mappata",
        regular(
            NEW,
            Emission::Template(
                "[&] { std::vector<decltype($0($r.front()))> __out; for (const auto& __x : $r) __out.push_back($0(__x)); return __out; }()",
            ),
        ),
    ),
    ("explanata", regular(NEW, Emission::Unsupported("lista.explanata is not available in C++"))),
    ("ordina", regular(MUTATES, Emission::Template("std::sort($r.begin(), $r.end())"))),
    ("inverte", regular(MUTATES, Emission::Template("std::reverse($r.begin(), $r.end())"))),
    ("inversa", regular(NEW, Emission::Template("std::vector($r.rbegin(), $r.rend())"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("continet", regular(QUERY, Emission::Template("(std::find($r.begin(), $r.end(), $0) != $r.end())"))),
    ("longitudo", regular(QUERY, Emission::Template("static_cast<int64_t>($r.size())"))),
    ("primus", regular(QUERY, Emission::Method("front"))),
    ("ultimus", regular(QUERY, Emission::Method("back"))),
    ("sectio", regular(NEW, Emission::Generate(slice))),
    ("reducta", regular(NEW, Emission::Template("std::accumulate($r.begin(), $r.end(), $1, $0)"))),
    ("omnes", regular(QUERY, Emission::Template("std::all_of($r.begin(), $r.end(), $0)"))),
    ("aliquis", regular(QUERY, Emission::Template("std::any_of($r.begin(), $r.end(), $0)"))),
    ("summa", irregular(QUERY, Emission::Template("std::accumulate($r.begin(), $r.end(), int64_t{0})"))),
    ("maximum", regular(QUERY, Emission::Template("*std::max_element($r.begin(), $r.end())"))),
    ("minimum", regular(QUERY, Emission::Template("*std::min_element($r.begin(), $r.end())"))),
    ("coniunge", irregular(NEW, Emission::Template("faber::join($r, $0)"))),
    ("inveni", irregular(QUERY, Emission::Template("*std::find_if($r.begin(), $r.end(), $0)"))),
    (
        "indiceDe",
        irregular(QUERY, Emission::Template("static_cast<int64_t>(std::find($r.begin(), $r.end(), $0) - $r.begin())")),
    ),
    ("perambula", irregular(QUERY, Emission::Template("std::for_each($r.begin(), $r.end(), $0)"))),
    ("accipe", irregular(QUERY, Emission::Method("at"))),
];

const MAP: MethodTable = &[
    ("pone", regular(MUTATES, Emission::Method("insert_or_assign"))),
    ("accipe", irregular(QUERY, Emission::Method("at"))),
    ("habet", regular(QUERY, Emission::Method("contains"))),
    ("dele", regular(MUTATES, Emission::Method("erase"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    (
        "claves",
        regular(
            NEW,
            Emission::Template(
                "[&] { std::vector<std::decay_t<decltype($r)>::key_type> __out; for (const auto& [__k, __v] : $r) __out.push_back(__k); return __out; }()",
            ),
        ),
    ),
    (
        "valores",
        regular(
            NEW,
            Emission::Template(
                "[&] { std::vector<std::decay_t<decltype($r)>::mapped_type> __out; for (const auto& [__k, __v] : $r) __out.push_back(__v); return __out; }()",
            ),
        ),
    ),
    ("paria", irregular(NEW, Emission::Template("std::vector($r.begin(), $r.end())"))),
    ("longitudo", regular(QUERY, Emission::Template("static_cast<int64_t>($r.size())"))),
];

const SET: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("insert"))),
    ("habet", regular(QUERY, Emission::Method("contains"))),
    ("dele", regular(MUTATES, Emission::Method("erase"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("longitudo", regular(QUERY, Emission::Template("static_cast<int64_t>($r.size())"))),
    (
        "unita",
        regular(NEW, Emission::Template("[&] { auto __out = $r; __out.insert($0.begin(), $0.end()); return __out; }()")),
    ),
    (
        "intersecta",
        regular(
            NEW,
            Emission::Template(
                "[&] { std::decay_t<decltype($r)> __out; for (const auto& __x : $r) if ($0.contains(__x)) __out.insert(__x); return __out; }()",
            ),
        ),
    ),
];

const SCALAR: MethodTable = &[
    ("initium", regular(QUERY, Emission::Method("starts_with"))),
    ("finis", regular(QUERY, Emission::Method("ends_with"))),
    ("maiuscula", irregular(NEW, Emission::Template("faber::upper($r)"))),
    ("minuscula", irregular(NEW, Emission::Template("faber::lower($r)"))),
    ("recide", irregular(NEW, Emission::Template("faber::trim($r)"))),
    ("divide", irregular(NEW, Emission::Template("faber::split($r, $0)"))),
    ("muta", irregular(NEW, Emission::Template("faber::replace_all($r, $0, $1)"))),
    ("continet", regular(QUERY, Emission::Template("($r.find($0) != std::string::npos)"))),
    ("longitudo", regular(QUERY, Emission::Template("static_cast<int64_t>($r.size())"))),
    ("inversa", regular(NEW, Emission::Template("std::string($r.rbegin(), $r.rend())"))),
];

/// Calls rendered through the preamble's `faber` text helpers
const TEXT_HELPERS: &[(StructureKind, &str)] = &[
    (StructureKind::Sequence, "coniunge"),
    (StructureKind::Scalar, "maiuscula"),
    (StructureKind::Scalar, "minuscula"),
    (StructureKind::Scalar, "recide"),
    (StructureKind::Scalar, "divide"),
    (StructureKind::Scalar, "muta"),
];

pub(super) fn uses_text_helpers(kind: StructureKind, name: &str) -> bool {
    TEXT_HELPERS.contains(&(kind, name))
}

fn copy_then_mutate(inner: &str, parts: &CallParts<'_>) -> String {
    format!("[&] {{ auto __c = {}; {inner}; return __c; }}()", parts.receiver)
}

fn resolve_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!(
        "std::async(std::launch::async, [__v = {}]() mutable {{ return {inner}; }})",
        parts.receiver
    )
}

const BRIDGES: &[Bridge] = &[
    Bridge {
        requested: Form::Perfect,
        sibling: Form::Imperative,
        binding: "__c",
        wrap: copy_then_mutate,
    },
    Bridge {
        requested: Form::ProspectiveActive,
        sibling: Form::Perfect,
        binding: "__v",
        wrap: resolve_later,
    },
];

fn marker(message: &str) -> String {
    format!("[] {{ {MARKER}, {}); }}()", quote(message))
}

static REGISTRY: Lazy<Result<MethodRegistry, RegistryError>> = Lazy::new(|| {
    MethodRegistry::build(
        Target::Cpp,
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

    fn render(kind: StructureKind, name: &str, receiver: &str, args: &[&str]) -> String {
        let registry = registry().unwrap();
        let lookup = registry.lookup(kind, name).unwrap();
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        registry.render(&lookup, &CallParts::new(receiver, &args))
    }

    #[test]
    fn test_registry_validates() {
        assert!(registry().is_ok());
    }

    #[test]
    fn test_container_calls() {
        assert_eq!(render(StructureKind::Sequence, "adde", "xs", &["3"]), "xs.push_back(3)");
        assert_eq!(render(StructureKind::Map, "pone", "m", &["k", "v"]), "m.insert_or_assign(k, v)");
        assert_eq!(
            render(StructureKind::Sequence, "longitudo", "xs", &[]),
            "static_cast<int64_t>(xs.size())"
        );
    }

    #[test]
    fn test_unsupported_renders_static_assert() {
        assert_eq!(
            render(StructureKind::Sequence, "explanata", "xs", &["f"]),
            "[] { static_assert(false, \"lista.explanata is not available in C++\"); }()"
        );
    }

    #[test]
    fn test_bridges() {
        assert_eq!(
            render(StructureKind::Sequence, "ordinata", "xs", &[]),
            "[&] { auto __c = xs; std::sort(__c.begin(), __c.end()); return __c; }()"
        );
        assert_eq!(
            render(StructureKind::Sequence, "filtratura", "xs", &["pred"]),
            "std::async(std::launch::async, [__v = xs]() mutable { return [&] { auto __out = __v; \
             std::erase_if(__out, [&](const auto& __x) { return !pred(__x); }); return __out; }(); })"
        );
    }
}
