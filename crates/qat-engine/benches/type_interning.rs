use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qat_engine::ast::*;
use qat_engine::{compile, CompileOptions, FileId, FileRange, Identifier, TypeContext};

fn bench_interning(c: &mut Criterion) {
    c.bench_function("intern_nested", |b| {
        b.iter(|| {
            let mut types = TypeContext::new();
            for bits in [8, 16, 32, 64] {
                let int = types.integer(black_box(bits));
                let mark = types.mark_to(int, true);
                let array = types.array(mark, 16);
                let maybe = types.maybe(array);
                types.tuple(vec![int, maybe], false);
            }
            types.len()
        });
    });

    c.bench_function("intern_repeated", |b| {
        let mut types = TypeContext::new();
        b.iter(|| {
            let int = types.unsigned(black_box(32));
            types.reference(int, false)
        });
    });
}

fn function(index: usize) -> Decl {
    let range = FileRange::new(FileId(0), index as u32, index as u32 + 1);
    let body = vec![Sentence::new(
        SentenceKind::Give(Some(Expression::new(
            ExprKind::IntegerLiteral {
                value: index as u128,
                suffix: None,
            },
            range,
        ))),
        range,
    )];
    Decl::new(
        DeclKind::Function(FunctionDecl {
            name: Identifier::new(format!("f{}", index), range),
            visibility: VisibilitySpec::Public,
            args: Vec::new(),
            return_type: Some(TypeExpr::new(TypeExprKind::Integer(32), range)),
            is_variadic: false,
            body: Some(body),
        }),
        range,
    )
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let options = CompileOptions::default();

    for count in [10, 100, 1000] {
        let program = Program::new(vec![SourceModule::file(
            "main",
            FileId(0),
            (0..count).map(function).collect(),
        )]);
        group.bench_with_input(BenchmarkId::new("functions", count), &program, |b, program| {
            b.iter(|| compile(black_box(program), &options).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_interning, bench_compile);
criterion_main!(benches);
