//! TypeScript method table

use crate::backend::utils::quote;
use crate::backend::Target;
use crate::morphology::{Form, MethodFlags};
use crate::registry::{
    Bridge, CallParts, Emission, MethodDescriptor, MethodRegistry, MethodTable, RegistryError,
};
use faber_ast::StructureKind;
use once_cell::sync::Lazy;

pub(super) const MARKER: &str = "__faberUnsupported";

const MUTATES: MethodFlags = MethodFlags::MUTATES;
const NEW: MethodFlags = MethodFlags::RETURNS_NEW.union(MethodFlags::ALLOCATES);
const QUERY: MethodFlags = MethodFlags::empty();

const fn regular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::regular(flags, emission)
}

const fn irregular(flags: MethodFlags, emission: Emission) -> MethodDescriptor {
    MethodDescriptor::irregular(flags, emission)
}

const SEQUENCE: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("push"))),
    ("praepone", regular(MUTATES, Emission::Method("unshift"))),
    ("remove", regular(MUTATES, Emission::Method("pop"))),
    ("decapita", irregular(MUTATES, Emission::Method("shift"))),
    ("filtra", regular(MUTATES, Emission::Template("$r.splice(0, $r.length, ...$r.filter($0))"))),
    ("filtrata", regular(NEW, Emission::Method("filter"))),
    ("mappata", regular(NEW, Emission::Method("map"))),
    ("explanata", regular(NEW, Emission::Method("flatMap"))),
    ("ordina", regular(MUTATES, Emission::Method("sort"))),
    ("ordinata", regular(NEW, Emission::Template("[...$r].sort($*)"))),
    ("inverte", regular(MUTATES, Emission::Method("reverse"))),
    ("inversa", regular(NEW, Emission::Template("[...$r].reverse()"))),
    ("purga", regular(MUTATES, Emission::Template("$r.length = 0"))),
    ("continet", regular(QUERY, Emission::Method("includes"))),
    ("longitudo", regular(QUERY, Emission::Property("length"))),
    ("primus", regular(QUERY, Emission::Template("$r[0]"))),
    ("ultimus", regular(QUERY, Emission::Template("$r.at(-1)"))),
    ("sectio", regular(NEW, Emission::Method("slice"))),
    ("reducta", regular(NEW, Emission::Method("reduce"))),
    ("omnes", regular(QUERY, Emission::Method("every"))),
    ("aliquis", regular(QUERY, Emission::Method("some"))),
    ("summa", irregular(QUERY, Emission::Template("$r.reduce((a, b) => a + b, 0)"))),
    ("maximum", regular(QUERY, Emission::Template("Math.max(...$r)"))),
    ("minimum", regular(QUERY, Emission::Template("Math.min(...$r)"))),
    ("coniunge", irregular(NEW, Emission::Method("join"))),
    ("inveni", irregular(QUERY, Emission::Method("find"))),
    ("indiceDe", irregular(QUERY, Emission::Method("indexOf"))),
    ("perambula", irregular(QUERY, Emission::Method("forEach"))),
    ("accipe", irregular(QUERY, Emission::Template("$r[$0]"))),
];

const MAP: MethodTable = &[
    ("pone", regular(MUTATES, Emission::Method("set"))),
    ("accipe", irregular(QUERY, Emission::Method("get"))),
    ("habet", regular(QUERY, Emission::Method("has"))),
    ("dele", regular(MUTATES, Emission::Method("delete"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("claves", regular(NEW, Emission::Template("[...$r.keys()]"))),
    ("valores", regular(NEW, Emission::Template("[...$r.values()]"))),
    ("paria", irregular(NEW, Emission::Template("[...$r.entries()]"))),
    ("longitudo", regular(QUERY, Emission::Property("size"))),
];

const SET: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("add"))),
    ("habet", regular(QUERY, Emission::Method("has"))),
    ("dele", regular(MUTATES, Emission::Method("delete"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("longitudo", regular(QUERY, Emission::Property("size"))),
    ("unita", regular(NEW, Emission::Template("new Set([...$r, ...$0])"))),
    ("intersecta", regular(NEW, Emission::Template("new Set([...$r].filter((x) => $0.has(x)))"))),
];

const SCALAR: MethodTable = &[
    ("initium", regular(QUERY, Emission::Method("startsWith"))),
    ("finis", regular(QUERY, Emission::Method("endsWith"))),
    ("maiuscula", irregular(NEW, Emission::Method("toUpperCase"))),
    ("minuscula", irregular(NEW, Emission::Method("toLowerCase"))),
    ("recide", irregular(NEW, Emission::Method("trim"))),
    ("divide", irregular(NEW, Emission::Method("split"))),
    ("muta", irregular(NEW, Emission::Method("replaceAll"))),
    ("continet", regular(QUERY, Emission::Method("includes"))),
    ("longitudo", regular(QUERY, Emission::Property("length"))),
];

fn copy_then_mutate(inner: &str, parts: &CallParts<'_>) -> String {
    format!(
        "((__c) => {{ {inner}; return __c; }})(structuredClone({}))",
        parts.receiver
    )
}

fn resolve_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!("Promise.resolve({}).then((__v) => {inner})", parts.receiver)
}

fn mutate_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!("Promise.resolve({}).then((__v) => {{ {inner}; }})", parts.receiver)
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
    Bridge {
        requested: Form::ProspectiveIndicative,
        sibling: Form::Imperative,
        binding: "__v",
        wrap: mutate_later,
    },
];

fn marker(message: &str) -> String {
    format!("{MARKER}({})", quote(message))
}

static REGISTRY: Lazy<Result<MethodRegistry, RegistryError>> = Lazy::new(|| {
    MethodRegistry::build(
        Target::TypeScript,
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
    use crate::registry::Lookup;

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
    fn test_explicit_entries() {
        assert_eq!(render(StructureKind::Sequence, "adde", "xs", &["1"]), "xs.push(1)");
        assert_eq!(render(StructureKind::Map, "longitudo", "m", &[]), "m.size");
        assert_eq!(render(StructureKind::Scalar, "muta", "s", &["a", "b"]), "s.replaceAll(a, b)");
    }

    #[test]
    fn test_bridged_forms() {
        assert_eq!(
            render(StructureKind::Sequence, "purgata", "xs", &[]),
            "((__c) => { __c.length = 0; return __c; })(structuredClone(xs))"
        );
        assert_eq!(
            render(StructureKind::Sequence, "filtratura", "xs", &["f"]),
            "Promise.resolve(xs).then((__v) => __v.filter(f))"
        );
        assert_eq!(
            render(StructureKind::Sequence, "ordinabit", "xs", &[]),
            "Promise.resolve(xs).then((__v) => { __v.sort(); })"
        );
    }

    #[test]
    fn test_participle_has_no_bridge() {
        let registry = registry().unwrap();
        assert!(registry.lookup(StructureKind::Sequence, "ordinans").is_none());
        assert!(matches!(
            registry.lookup(StructureKind::Sequence, "adde"),
            Some(Lookup::Explicit(_))
        ));
    }
}
