//! End-to-end generation of small units across every backend

use faber_ast::{AllocatorKind, AstBuilder, BinaryOp, ConversionKind, Expr, Radix, Unit};
use faber_compiler::{generate, Target};

fn bind(name: &str, value: Expr) -> Unit {
    let b = AstBuilder::new();
    Unit::new(name, vec![b.fixum("v", None, value)])
}

/// Brace depth after the whole text, skipping string literals
fn brace_balance(code: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in code.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

#[test]
fn decimal_conversion_without_fallback() {
    let b = AstBuilder::new();
    let unit = bind("numerus", b.convert(b.text("42"), ConversionKind::Integer));

    let faber = generate(&unit, Target::Faber).unwrap();
    assert!(faber.contains("fixum v = \"42\" numeratum"), "{faber}");

    let rust = generate(&unit, Target::Rust).unwrap();
    assert!(
        rust.contains("String::from(\"42\").parse::<i64>().unwrap()"),
        "{rust}"
    );
}

#[test]
fn hex_conversion_everywhere() {
    let b = AstBuilder::new();
    let unit = bind(
        "hex",
        b.conversion(b.text("ff"), ConversionKind::Integer, Some(Radix::Hex), None),
    );

    let expected = [
        (Target::Faber, "\"ff\" numeratum<Hex>"),
        (Target::TypeScript, "parseInt(\"ff\", 16)"),
        (Target::Python, "int(\"ff\", 16)"),
        (Target::Rust, "i64::from_str_radix(&String::from(\"ff\"), 16)"),
        (Target::Zig, "std.fmt.parseInt(i64, \"ff\", 16)"),
        (Target::Cpp, ", nullptr, 16)"),
    ];
    for (target, needle) in expected {
        let code = generate(&unit, target).unwrap();
        assert!(code.contains(needle), "{target}: {code}");
    }
}

#[test]
fn guarded_conversion_checks_input_everywhere() {
    let b = AstBuilder::new();
    let decimal = bind(
        "numerus",
        b.conversion(b.ident("s"), ConversionKind::Integer, None, Some(b.int(0))),
    );
    let expected = [
        (Target::TypeScript, "/^\\d+$/.test(s)"),
        (Target::Rust, "s.chars().all(|c| c.is_ascii_digit())"),
        (Target::Zig, "std.mem.indexOfNone(u8, s, \"0123456789\") == null"),
        (Target::Cpp, "faber::digits_only(s)"),
    ];
    for (target, needle) in expected {
        let code = generate(&decimal, target).unwrap();
        assert!(code.contains(needle), "{target}: {code}");
    }

    let float = bind(
        "fractus",
        b.conversion(b.ident("s"), ConversionKind::Float, None, Some(b.float(1.5))),
    );
    let expected = [
        (Target::TypeScript, "/^[\\d.]+$/.test(s)"),
        (Target::Rust, "c.is_ascii_digit() || c == '.'"),
        (Target::Zig, "\"0123456789.\""),
        (Target::Cpp, "faber::digits_or_point(s)"),
    ];
    for (target, needle) in expected {
        let code = generate(&float, target).unwrap();
        assert!(code.contains(needle), "{target}: {code}");
    }

    let octal = bind(
        "octo",
        b.conversion(b.ident("s"), ConversionKind::Integer, Some(Radix::Oct), Some(b.int(0))),
    );
    let expected = [
        (Target::TypeScript, "s.length > 0"),
        (Target::Rust, "if !s.is_empty() {"),
        (Target::Zig, "if (s.len > 0)"),
        (Target::Cpp, "(!s.empty() ?"),
    ];
    for (target, needle) in expected {
        let code = generate(&octal, target).unwrap();
        assert!(code.contains(needle), "{target}: {code}");
    }
}

#[test]
fn indexed_format_reorders_arguments() {
    let b = AstBuilder::new();
    let unit = bind(
        "ordo",
        b.format("§1 before §0", vec![b.ident("a"), b.ident("b")]),
    );

    let ts = generate(&unit, Target::TypeScript).unwrap();
    assert!(ts.contains("`${b} before ${a}`"), "{ts}");

    let zig = generate(&unit, Target::Zig).unwrap();
    assert!(zig.contains("\"{any} before {any}\", .{ b, a }"), "{zig}");
}

#[test]
fn empty_allocator_scope_is_valid_everywhere() {
    let b = AstBuilder::new();
    for kind in [AllocatorKind::Arena, AllocatorKind::Page] {
        let unit = Unit::new(
            "vacuum",
            vec![b.entry(vec![b.allocator_scope(kind, Some("alloc"), vec![])])],
        );
        for target in Target::ALL {
            let code = generate(&unit, target).unwrap();
            assert_eq!(brace_balance(&code), 0, "{target}: {code}");
        }
    }

    let unit = Unit::new(
        "vacuum",
        vec![b.entry(vec![b.allocator_scope(AllocatorKind::Arena, None, vec![])])],
    );
    let python = generate(&unit, Target::Python).unwrap();
    assert!(python.contains("pass"), "{python}");
}

#[test]
fn match_arms_keep_source_order() {
    let b = AstBuilder::new();
    let unit = Unit::new(
        "formae",
        vec![
            b.union(
                "Forma",
                vec![
                    (
                        "Rectangulum",
                        vec![("latitudo", b.ty("fractus")), ("altitudo", b.ty("fractus"))],
                    ),
                    ("Vacuum", vec![]),
                ],
            ),
            b.entry(vec![b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm(
                        "Rectangulum",
                        &["latitudo", "altitudo"],
                        vec![b.scribe(vec![b.binary(
                            BinaryOp::Mul,
                            b.ident("latitudo"),
                            b.ident("altitudo"),
                        )])],
                    ),
                    b.arm("Vacuum", &[], vec![]),
                ],
            )]),
        ],
    );

    let rust = generate(&unit, Target::Rust).unwrap();
    let first = rust
        .find("Forma::Rectangulum { latitudo, altitudo } =>")
        .unwrap_or_else(|| panic!("{rust}"));
    let second = rust.find("Forma::Vacuum =>").unwrap_or_else(|| panic!("{rust}"));
    assert!(first < second);
    assert!(!rust.contains("_ => {}"), "{rust}");

    // The least capable target still lists every case
    let cpp = generate(&unit, Target::Cpp).unwrap();
    assert!(cpp.contains("const Rectangulum&"), "{cpp}");
    assert!(cpp.contains("const Vacuum&"), "{cpp}");
}

fn point_match(bindings: &[&str]) -> Unit {
    let b = AstBuilder::new();
    Unit::new(
        "puncta",
        vec![
            b.union(
                "Punctum",
                vec![("Planum", vec![("x", b.ty("numerus")), ("y", b.ty("numerus"))])],
            ),
            b.entry(vec![b.discerne(
                b.ident("p"),
                Some("Punctum"),
                vec![b.arm(
                    "Planum",
                    bindings,
                    vec![b.scribe(bindings.iter().map(|name| b.ident(name)).collect())],
                )],
            )]),
        ],
    )
}

#[test]
fn match_bindings_follow_field_names() {
    let unit = point_match(&["y", "x"]);
    let expected = [
        (Target::Rust, "Punctum::Planum { y, x } =>"),
        (Target::Zig, "const y = __v.y;"),
        (Target::Cpp, "const auto& y = __v.y;"),
        (Target::TypeScript, "const y = p.y;"),
    ];
    for (target, needle) in expected {
        let code = generate(&unit, target).unwrap();
        assert!(code.contains(needle), "{target}: {code}");
    }
}

#[test]
fn match_binding_without_field_fails() {
    let unit = point_match(&["x", "z"]);
    for target in [Target::Rust, Target::Zig, Target::Cpp] {
        let err = generate(&unit, target).unwrap_err();
        assert!(err.is_translation_failure(), "{target}: {err}");
        assert!(err.to_string().contains("`z`"), "{target}: {err}");
    }
}

#[test]
fn unsupported_construct_reports_position() {
    let b = AstBuilder::new();
    let unit = bind("objectum", b.object(vec![("a", b.int(1))]));
    let err = generate(&unit, Target::Rust).unwrap_err();
    assert!(err.span().is_some());
    assert!(err.is_translation_failure());
    assert!(err.to_string().contains("rust"), "{err}");
}
