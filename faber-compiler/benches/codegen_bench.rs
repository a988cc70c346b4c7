use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use faber_ast::{AstBuilder, BinaryOp, Stmt, StructureKind, Unit};
use faber_compiler::{generate, BackendFactory, CompilerConfig, Pipeline, Target};

fn sample_unit() -> Unit {
    let b = AstBuilder::new();
    let area = b.function(
        "area",
        vec![b.param("forma", "Forma")],
        Some(b.ty("fractus")),
        vec![
            b.varia("mensura", Some(b.ty("fractus")), b.float(0.0)),
            b.discerne(
                b.ident("forma"),
                Some("Forma"),
                vec![
                    b.arm(
                        "Rectangulum",
                        &["latitudo", "altitudo"],
                        vec![b.expr_stmt(b.assign(
                            b.ident("mensura"),
                            b.binary(BinaryOp::Mul, b.ident("latitudo"), b.ident("altitudo")),
                        ))],
                    ),
                    b.wildcard_arm(vec![]),
                ],
            ),
            b.redde(Some(b.ident("mensura"))),
        ],
    );

    Unit::new(
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
            Stmt::Function(area),
            b.entry(vec![
                b.varia("numeri", Some(b.list_of(b.ty("numerus"))), b.array(vec![])),
                b.for_each(
                    "i",
                    b.range(b.int(0), b.int(10), false),
                    vec![b.expr_stmt(b.method(
                        b.ident("numeri"),
                        "adde",
                        vec![b.ident("i")],
                        StructureKind::Sequence,
                    ))],
                ),
                b.scribe(vec![b.format(
                    "§1 of §0",
                    vec![b.ident("numeri"), b.text("summa")],
                )]),
            ]),
        ],
    )
}

fn benchmark_each_target(c: &mut Criterion) {
    let unit = sample_unit();
    let mut group = c.benchmark_group("generate");
    for target in Target::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(target), &target, |b, &target| {
            b.iter(|| generate(black_box(&unit), target))
        });
    }
    group.finish();
}

fn benchmark_registry_construction(c: &mut Criterion) {
    c.bench_function("registries", |b| {
        b.iter(|| {
            for target in Target::ALL {
                black_box(BackendFactory::for_target(target).ok());
            }
        })
    });
}

fn benchmark_pipeline(c: &mut Criterion) {
    let unit = sample_unit();
    let pipeline = Pipeline::new(CompilerConfig::default());
    c.bench_function("pipeline_all_targets", |b| {
        b.iter(|| pipeline.generate_configured(black_box(&unit)))
    });
}

criterion_group!(
    benches,
    benchmark_each_target,
    benchmark_registry_construction,
    benchmark_pipeline
);
criterion_main!(benches);
