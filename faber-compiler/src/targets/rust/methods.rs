//! Rust method table
//!
//! Lengths are widened to `i64` to match `numerus`. Element-producing
//! queries clone so the receiver stays usable.

use crate::backend::utils::quote;
use crate::backend::Target;
use crate::morphology::{Form, MethodFlags};
use crate::registry::{
    Bridge, CallParts, Emission, MethodDescriptor, MethodRegistry, MethodTable, RegistryError,
};
use faber_ast::StructureKind;
use once_cell::sync::Lazy;

pub(super) const MARKER: &str = "compile_error!";

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
    match parts.args {
        [start] => format!("{}[({}) as usize..].to_vec()", parts.receiver, start),
        [start, end, ..] => format!(
            "{}[({}) as usize..({}) as usize].to_vec()",
            parts.receiver, start, end
        ),
        [] => format!("{}.to_vec()", parts.receiver),
    }
}

const SEQUENCE: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("push"))),
    ("praepone", regular(MUTATES, Emission::Template("$r.insert(0, $0)"))),
    ("remove", regular(MUTATES, Emission::Method("pop"))),
    ("decapita", irregular(MUTATES, Emission::Template("$r.remove(0)"))),
    ("filtra", regular(MUTATES, Emission::Method("retain"))),
    ("filtrata", regular(NEW, Emission::Template("$r.iter().filter($0).cloned().collect::<Vec<_>>()"))),
    ("mappata", regular(NEW, Emission::Template("$r.iter().map($0).collect::<Vec<_>>()"))),
    ("explanata", regular(NEW, Emission::Template("$r.iter().flat_map($0).collect::<Vec<_>>()"))),
    ("ordina", regular(MUTATES, Emission::Method("sort"))),
    ("inverte", regular(MUTATES, Emission::Method("reverse"))),
    ("inversa", regular(NEW, Emission::Template("$r.iter().rev().cloned().collect::<Vec<_>>()"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("continet", regular(QUERY, Emission::Template("$r.contains(&$0)"))),
    ("longitudo", regular(QUERY, Emission::Template("($r.len() as i64)"))),
    ("primus", regular(QUERY, Emission::Template("$r.first().cloned()"))),
    ("ultimus", regular(QUERY, Emission::Template("$r.last().cloned()"))),
    ("sectio", regular(NEW, Emission::Generate(slice))),
    ("reducta", regular(NEW, Emission::Template("$r.iter().fold($1, $0)"))),
    ("omnes", regular(QUERY, Emission::Template("$r.iter().all($0)"))),
    ("aliquis", regular(QUERY, Emission::Template("$r.iter().any($0)"))),
    ("summa", irregular(QUERY, Emission::Template("$r.iter().sum::<i64>()"))),
    ("maximum", regular(QUERY, Emission::Template("$r.iter().max().cloned()"))),
    ("minimum", regular(QUERY, Emission::Template("$r.iter().min().cloned()"))),
    ("coniunge", irregular(NEW, Emission::Template("$r.join($0.as_str())"))),
    ("inveni", irregular(QUERY, Emission::Template("$r.iter().find($0).cloned()"))),
    ("indiceDe", irregular(QUERY, Emission::Template("$r.iter().position(|__x| *__x == $0)"))),
    ("perambula", irregular(QUERY, Emission::Template("$r.iter().for_each($0)"))),
    ("accipe", irregular(QUERY, Emission::Template("$r[($0) as usize].clone()"))),
];

const MAP: MethodTable = &[
    ("pone", regular(MUTATES, Emission::Method("insert"))),
    ("accipe", irregular(QUERY, Emission::Template("$r.get(&$0).cloned()"))),
    ("habet", regular(QUERY, Emission::Template("$r.contains_key(&$0)"))),
    ("dele", regular(MUTATES, Emission::Template("$r.remove(&$0)"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("claves", regular(NEW, Emission::Template("$r.keys().cloned().collect::<Vec<_>>()"))),
    ("valores", regular(NEW, Emission::Template("$r.values().cloned().collect::<Vec<_>>()"))),
    (
        "paria",
        irregular(
            NEW,
            Emission::Template("$r.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>()"),
        ),
    ),
    ("longitudo", regular(QUERY, Emission::Template("($r.len() as i64)"))),
];

const SET: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("insert"))),
    ("habet", regular(QUERY, Emission::Template("$r.contains(&$0)"))),
    ("dele", regular(MUTATES, Emission::Template("$r.remove(&$0)"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("longitudo", regular(QUERY, Emission::Template("($r.len() as i64)"))),
    (
        "unita",
        regular(NEW, Emission::Template("$r.union(&$0).cloned().collect::<std::collections::HashSet<_>>()")),
    ),
    (
        "intersecta",
        regular(
            NEW,
            Emission::Template("$r.intersection(&$0).cloned().collect::<std::collections::HashSet<_>>()"),
        ),
    ),
];

const SCALAR: MethodTable = &[
    ("initium", regular(QUERY, Emission::Template("$r.starts_with(&$0)"))),
    ("finis", regular(QUERY, Emission::Template("$r.ends_with(&$0)"))),
    ("maiuscula", irregular(NEW, Emission::Method("to_uppercase"))),
    ("minuscula", irregular(NEW, Emission::Method("to_lowercase"))),
    ("recide", irregular(NEW, Emission::Template("$r.trim().to_string()"))),
    (
        "divide",
        irregular(NEW, Emission::Template("$r.split(&$0).map(String::from).collect::<Vec<_>>()")),
    ),
    ("muta", irregular(NEW, Emission::Template("$r.replace(&$0, &$1)"))),
    ("continet", regular(QUERY, Emission::Template("$r.contains(&$0)"))),
    ("longitudo", regular(QUERY, Emission::Template("($r.chars().count() as i64)"))),
    ("inversa", regular(NEW, Emission::Template("$r.chars().rev().collect::<String>()"))),
];

fn clone_then_mutate(inner: &str, parts: &CallParts<'_>) -> String {
    format!("{{ let mut __c = {}.clone(); {inner}; __c }}", parts.receiver)
}

fn resolve_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!("{{ let __v = {}.clone(); async move {{ {inner} }} }}", parts.receiver)
}

const BRIDGES: &[Bridge] = &[
    Bridge {
        requested: Form::Perfect,
        sibling: Form::Imperative,
        binding: "__c",
        wrap: clone_then_mutate,
    },
    Bridge {
        requested: Form::ProspectiveActive,
        sibling: Form::Perfect,
        binding: "__v",
        wrap: resolve_later,
    },
];

fn marker(message: &str) -> String {
    format!("{MARKER}({})", quote(message))
}

static REGISTRY: Lazy<Result<MethodRegistry, RegistryError>> = Lazy::new(|| {
    MethodRegistry::build(
        Target::Rust,
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
    fn test_lengths_are_numerus() {
        assert_eq!(render(StructureKind::Sequence, "longitudo", "xs", &[]), "(xs.len() as i64)");
        assert_eq!(render(StructureKind::Map, "habet", "m", &["k"]), "m.contains_key(&k)");
    }

    #[test]
    fn test_slice_with_one_bound() {
        assert_eq!(
            render(StructureKind::Sequence, "sectio", "xs", &["1"]),
            "xs[(1) as usize..].to_vec()"
        );
        assert_eq!(
            render(StructureKind::Sequence, "sectio", "xs", &["1", "n"]),
            "xs[(1) as usize..(n) as usize].to_vec()"
        );
    }

    #[test]
    fn test_bridges() {
        assert_eq!(
            render(StructureKind::Sequence, "ordinata", "xs", &[]),
            "{ let mut __c = xs.clone(); __c.sort(); __c }"
        );
        assert_eq!(
            render(StructureKind::Sequence, "mappatura", "xs", &["f"]),
            "{ let __v = xs.clone(); async move { __v.iter().map(f).collect::<Vec<_>>() } }"
        );
    }

    #[test]
    fn test_bridge_needs_a_direct_sibling() {
        let registry = registry().unwrap();
        assert!(registry.lookup(StructureKind::Sequence, "ordinatura").is_none());
        assert!(registry.lookup(StructureKind::Map, "ponet").is_none());
    }
}
