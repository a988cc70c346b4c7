//! Properties that hold for every backend

use faber_ast::{AstBuilder, BinaryOp, ConversionKind, Stmt, Unit};
use faber_compiler::morphology::{self, Form, MethodFlags};
use faber_compiler::{generate, BackendFactory, CompilerConfig, Pipeline, Target};

/// A unit using only constructs every backend shares
fn neutral_unit() -> Unit {
    let b = AstBuilder::new();
    let sum = b.function(
        "summa",
        vec![b.param("a", "numerus"), b.param("b", "numerus")],
        Some(b.ty("numerus")),
        vec![b.redde(Some(b.binary(BinaryOp::Add, b.ident("a"), b.ident("b"))))],
    );
    Unit::new(
        "neutra",
        vec![
            Stmt::Function(sum),
            b.entry(vec![
                b.varia("i", Some(b.ty("numerus")), b.int(0)),
                b.while_loop(
                    b.binary(BinaryOp::Lt, b.ident("i"), b.int(3)),
                    vec![
                        b.scribe(vec![b.format("§0: §1", vec![b.ident("i"), b.text("x")])]),
                        b.expr_stmt(b.assign(
                            b.ident("i"),
                            b.binary(BinaryOp::Add, b.ident("i"), b.int(1)),
                        )),
                    ],
                ),
                b.fixum(
                    "n",
                    None,
                    b.conversion(b.text("7"), ConversionKind::Integer, None, Some(b.int(0))),
                ),
                b.scribe(vec![b.call(b.ident("summa"), vec![b.ident("n"), b.int(1)])]),
            ]),
        ],
    )
}

const NEUTRAL_CANONICAL: &str = "\
functio summa(numerus a, numerus b) -> numerus {
    redde a + b
}

incipit {
    varia i: numerus = 0
    dum i < 3 {
        scribe scriptum(\"§0: §1\", i, \"x\")
        i = i + 1
    }
    fixum n = \"7\" numeratum vel 0
    scribe summa(n, 1)
}
";

#[test]
fn canonical_output_is_a_fixed_point() {
    let unit = neutral_unit();
    let first = generate(&unit, Target::Faber).unwrap();
    assert_eq!(first, NEUTRAL_CANONICAL);

    let reparsed = Unit::from_json(&unit.to_json().unwrap()).unwrap();
    let second = generate(&reparsed, Target::Faber).unwrap();
    assert_eq!(first, second);
}

#[test]
fn canonical_match_spells_every_arm_with_casu() {
    let b = AstBuilder::new();
    let unit = Unit::new(
        "formae",
        vec![b.entry(vec![b.discerne(
            b.ident("forma"),
            None,
            vec![
                b.arm("Quadratum", &["latus"], vec![b.scribe(vec![b.ident("latus")])]),
                b.arm("Vacuum", &[], vec![]),
                b.wildcard_arm(vec![b.scribe(vec![b.text("alia")])]),
            ],
        )])],
    );
    assert_eq!(
        generate(&unit, Target::Faber).unwrap(),
        "incipit {\n    \
         discerne forma {\n        \
         casu Quadratum(latus) {\n            \
         scribe latus\n        \
         }\n        \
         casu Vacuum {}\n        \
         casu _ {\n            \
         scribe \"alia\"\n        \
         }\n    \
         }\n\
         }\n"
    );
}

#[test]
fn neutral_unit_generates_everywhere() {
    let unit = neutral_unit();
    let report = Pipeline::new(CompilerConfig::default()).generate_configured(&unit);
    for outcome in &report.outcomes {
        assert!(outcome.is_success(), "{}: {:?}", outcome.target, outcome.output);
    }
}

#[test]
fn suffix_and_flag_tables_agree() {
    for form in Form::ALL {
        assert_eq!(morphology::form_from_flags(form.flags()), Some(form));
        for suffix in form.suffixes() {
            let name = format!("verb{suffix}");
            let resolved = morphology::resolve(&name).unwrap();
            let flags = morphology::derived_flags(&name).unwrap();
            assert_eq!(morphology::form_from_flags(flags), Some(resolved.form), "{name}");
        }
    }
    assert_eq!(morphology::form_from_flags(MethodFlags::ALLOCATES), None);
}

#[test]
fn every_registry_validates() {
    for name in BackendFactory::available_backends() {
        assert!(BackendFactory::create_backend(name).is_ok(), "{name}");
    }
}

#[test]
fn positional_sentinels_appear_once_in_order() {
    let b = AstBuilder::new();
    let sentinels = ["alphaq", "betaq", "gammaq"];
    let unit = Unit::new(
        "signa",
        vec![b.fixum(
            "v",
            None,
            b.format("§ then § then §", sentinels.iter().map(|s| b.text(s)).collect()),
        )],
    );

    for target in Target::ALL {
        let code = generate(&unit, target).unwrap();
        let mut last = 0;
        for sentinel in sentinels {
            assert_eq!(code.matches(sentinel).count(), 1, "{target}: {code}");
            let at = code.find(sentinel).unwrap();
            assert!(at >= last, "{target}: {sentinel} out of order in {code}");
            last = at;
        }
    }
}

#[test]
fn indexed_sentinels_appear_once() {
    let b = AstBuilder::new();
    let unit = Unit::new(
        "signa",
        vec![b.fixum(
            "v",
            None,
            b.format("§2 §0 §1", vec![b.text("alphaq"), b.text("betaq"), b.text("gammaq")]),
        )],
    );
    for target in Target::ALL {
        let code = generate(&unit, target).unwrap();
        for sentinel in ["alphaq", "betaq", "gammaq"] {
            assert_eq!(code.matches(sentinel).count(), 1, "{target}: {code}");
        }
    }
}

#[test]
fn nested_blocks_restore_indentation() {
    let b = AstBuilder::new();
    let nested = b.if_else(
        b.ident("a"),
        vec![b.while_loop(
            b.ident("b"),
            vec![b.if_else(b.ident("c"), vec![b.scribe(vec![b.int(0)])], Some(vec![]))],
        )],
        Some(vec![b.scribe(vec![b.int(9)])]),
    );
    let unit = Unit::new(
        "gradus",
        vec![b.entry(vec![
            b.scribe(vec![b.text("antea_signum")]),
            nested,
            b.scribe(vec![b.text("postea_signum")]),
        ])],
    );

    for target in Target::ALL {
        let code = generate(&unit, target).unwrap();
        let indent_of = |needle: &str| {
            let line = code
                .lines()
                .find(|line| line.contains(needle))
                .unwrap_or_else(|| panic!("{target}: no {needle} in {code}"));
            line.len() - line.trim_start().len()
        };
        assert_eq!(indent_of("antea_signum"), indent_of("postea_signum"), "{target}: {code}");
    }
}
