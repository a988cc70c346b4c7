//! Python method table

use crate::backend::utils::quote;
use crate::backend::Target;
use crate::morphology::{Form, MethodFlags};
use crate::registry::{
    Bridge, CallParts, Emission, MethodDescriptor, MethodRegistry, MethodTable, RegistryError,
};
use faber_ast::StructureKind;
use once_cell::sync::Lazy;

pub(super) const MARKER: &str = "__faber_unsupported";

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
    ("adde", regular(MUTATES, Emission::Method("append"))),
    ("praepone", regular(MUTATES, Emission::Template("$r.insert(0, $0)"))),
    ("remove", regular(MUTATES, Emission::Method("pop"))),
    ("decapita", irregular(MUTATES, Emission::Template("$r.pop(0)"))),
    ("filtra", regular(MUTATES, Emission::Template("$r[:] = [_x for _x in $r if $0(_x)]"))),
    ("filtrata", regular(NEW, Emission::Template("[_x for _x in $r if $0(_x)]"))),
    ("mappata", regular(NEW, Emission::Template("[$0(_x) for _x in $r]"))),
    ("explanata", regular(NEW, Emission::Template("[_y for _x in $r for _y in $0(_x)]"))),
    ("ordina", regular(MUTATES, Emission::Method("sort"))),
    ("ordinata", regular(NEW, Emission::Template("sorted($r)"))),
    ("inverte", regular(MUTATES, Emission::Method("reverse"))),
    ("inversa", regular(NEW, Emission::Template("$r[::-1]"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("continet", regular(QUERY, Emission::Template("($0 in $r)"))),
    ("longitudo", regular(QUERY, Emission::Template("len($r)"))),
    ("primus", regular(QUERY, Emission::Template("$r[0]"))),
    ("ultimus", regular(QUERY, Emission::Template("$r[-1]"))),
    ("sectio", regular(NEW, Emission::Template("$r[$0:$1]"))),
    ("reducta", regular(NEW, Emission::Template("functools.reduce($0, $r, $1)"))),
    ("omnes", regular(QUERY, Emission::Template("all($0(_x) for _x in $r)"))),
    ("aliquis", regular(QUERY, Emission::Template("any($0(_x) for _x in $r)"))),
    ("summa", irregular(QUERY, Emission::Template("sum($r)"))),
    ("maximum", regular(QUERY, Emission::Template("max($r)"))),
    ("minimum", regular(QUERY, Emission::Template("min($r)"))),
    ("coniunge", irregular(NEW, Emission::Template("$0.join($r)"))),
    ("inveni", irregular(QUERY, Emission::Template("next((_x for _x in $r if $0(_x)), None)"))),
    ("indiceDe", irregular(QUERY, Emission::Method("index"))),
    ("perambula", irregular(QUERY, Emission::Template("list(map($0, $r))"))),
    ("accipe", irregular(QUERY, Emission::Template("$r[$0]"))),
];

const MAP: MethodTable = &[
    ("pone", regular(MUTATES, Emission::Template("$r[$0] = $1"))),
    ("accipe", irregular(QUERY, Emission::Method("get"))),
    ("habet", regular(QUERY, Emission::Template("($0 in $r)"))),
    ("dele", regular(MUTATES, Emission::Template("$r.pop($0, None)"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("claves", regular(NEW, Emission::Template("list($r.keys())"))),
    ("valores", regular(NEW, Emission::Template("list($r.values())"))),
    ("paria", irregular(NEW, Emission::Template("list($r.items())"))),
    ("longitudo", regular(QUERY, Emission::Template("len($r)"))),
];

const SET: MethodTable = &[
    ("adde", regular(MUTATES, Emission::Method("add"))),
    ("habet", regular(QUERY, Emission::Template("($0 in $r)"))),
    ("dele", regular(MUTATES, Emission::Method("discard"))),
    ("purga", regular(MUTATES, Emission::Method("clear"))),
    ("longitudo", regular(QUERY, Emission::Template("len($r)"))),
    ("unita", regular(NEW, Emission::Template("($r | $0)"))),
    ("intersecta", regular(NEW, Emission::Template("($r & $0)"))),
];

const SCALAR: MethodTable = &[
    ("initium", regular(QUERY, Emission::Method("startswith"))),
    ("finis", regular(QUERY, Emission::Method("endswith"))),
    ("maiuscula", irregular(NEW, Emission::Method("upper"))),
    ("minuscula", irregular(NEW, Emission::Method("lower"))),
    ("recide", irregular(NEW, Emission::Method("strip"))),
    ("divide", irregular(NEW, Emission::Method("split"))),
    ("muta", irregular(NEW, Emission::Method("replace"))),
    ("continet", regular(QUERY, Emission::Template("($0 in $r)"))),
    ("longitudo", regular(QUERY, Emission::Template("len($r)"))),
];

fn copy_then_mutate(inner: &str, parts: &CallParts<'_>) -> String {
    format!("(lambda __c: ({inner}, __c)[1])({}.copy())", parts.receiver)
}

fn resolve_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!(
        "asyncio.sleep(0, result=(lambda __v: {inner})({}))",
        parts.receiver
    )
}

fn mutate_later(inner: &str, parts: &CallParts<'_>) -> String {
    format!(
        "asyncio.sleep(0, result=(lambda __v: ({inner}, None)[1])({}))",
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
        Target::Python,
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
    fn test_builtins_prefer_python_idioms() {
        assert_eq!(render(StructureKind::Sequence, "longitudo", "xs", &[]), "len(xs)");
        assert_eq!(render(StructureKind::Sequence, "coniunge", "xs", &["\", \""]), "\", \".join(xs)");
        assert_eq!(render(StructureKind::Map, "habet", "m", &["k"]), "(k in m)");
        assert_eq!(render(StructureKind::Sequence, "sectio", "xs", &["1"]), "xs[1:]");
    }

    #[test]
    fn test_perfect_bridge_copies_receiver() {
        assert_eq!(
            render(StructureKind::Sequence, "inversa", "xs", &[]),
            "xs[::-1]"
        );
        assert_eq!(
            render(StructureKind::Sequence, "purgata", "xs", &[]),
            "(lambda __c: (__c.clear(), __c)[1])(xs.copy())"
        );
    }
}
