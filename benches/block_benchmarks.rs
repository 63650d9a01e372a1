//! Benchmarks for block repository and autoformat operations.
//!
//! Run with: cargo bench

use blockwise_core::{Config, CursorIntent, Editor, Intent, IntentRequest};
use blockwise_markup::{split_at, Autoformatter};
use blockwise_model::{BlockId, BlockRepository, BlockType, Placement};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Builds a flat document with `blocks` paragraphs.
fn generate_document(blocks: usize) -> (BlockRepository, Vec<BlockId>) {
    let mut repo = BlockRepository::new("Bench");
    let mut ids = vec![repo.root()[0]];
    for i in 1..blocks {
        let last = ids[ids.len() - 1];
        let id = repo
            .insert_block(
                last,
                BlockType::Paragraph,
                format!("Block {i}: some **bold** and *italic* text"),
                Placement::After,
            )
            .unwrap();
        ids.push(id);
    }
    (repo, ids)
}

/// Generates inline content with a mix of delimiters.
fn generate_content(spans: usize) -> String {
    (0..spans)
        .map(|i| match i % 4 {
            0 => format!("**bold {i}** "),
            1 => format!("*italic {i}* "),
            2 => format!("~~gone {i}~~ "),
            _ => format!("`code {i}` plain "),
        })
        .collect()
}

/// Benchmarks the autoformat pass.
fn bench_autoformat(c: &mut Criterion) {
    let mut group = c.benchmark_group("autoformat");
    let formatter = Autoformatter::new();

    for spans in [1, 10, 100].iter() {
        let content = generate_content(*spans);
        group.bench_with_input(BenchmarkId::new("format", spans), &content, |b, content| {
            b.iter(|| black_box(formatter.format(black_box(content))))
        });
    }

    let formatted = formatter.format(&generate_content(100)).converted;
    group.bench_function("format_already_formatted", |b| {
        b.iter(|| black_box(formatter.format(black_box(&formatted))))
    });

    group.bench_function("split_at_middle", |b| {
        b.iter(|| black_box(split_at(black_box(&formatted), 200)))
    });

    group.finish();
}

/// Benchmarks repository mutations on documents of various sizes.
fn bench_repository(c: &mut Criterion) {
    let mut group = c.benchmark_group("repository");

    for size in [100, 1000, 10000].iter() {
        let (repo, ids) = generate_document(*size);
        let middle = ids[ids.len() / 2];

        group.bench_with_input(BenchmarkId::new("insert_middle", size), &repo, |b, repo| {
            b.iter_with_setup(
                || repo.clone(),
                |mut repo| {
                    repo.insert_block(middle, BlockType::Paragraph, "new", Placement::After)
                        .unwrap();
                    black_box(repo)
                },
            )
        });

        group.bench_with_input(BenchmarkId::new("move_to_end", size), &repo, |b, repo| {
            b.iter_with_setup(
                || repo.clone(),
                |mut repo| {
                    repo.move_block(ids[0], None, usize::MAX).unwrap();
                    black_box(repo)
                },
            )
        });

        group.bench_with_input(BenchmarkId::new("validate", size), &repo, |b, repo| {
            b.iter(|| black_box(repo.validate()))
        });

        group.bench_with_input(BenchmarkId::new("to_record", size), &repo, |b, repo| {
            b.iter(|| black_box(repo.to_record()))
        });
    }

    group.finish();
}

/// Benchmarks a split through the full editor path.
fn bench_editor_split(c: &mut Criterion) {
    let (repo, ids) = generate_document(1000);
    let target = ids[500];

    c.bench_function("editor_split", |b| {
        b.iter_with_setup(
            || {
                let mut config = Config::default();
                config.autosave.enabled = false;
                let mut editor = Editor::with_config(config);
                editor.open_repository(repo.clone()).unwrap();
                editor.focus_block(target, CursorIntent::Start).unwrap();
                editor
            },
            |mut editor| {
                editor
                    .apply_intent(IntentRequest::new(target, Intent::Split).at(5))
                    .unwrap();
                black_box(editor)
            },
        )
    });
}

criterion_group!(
    benches,
    bench_autoformat,
    bench_repository,
    bench_editor_split
);
criterion_main!(benches);
