use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use deidrev::{
    compute_agreement_matrix, compute_dataset_agreement, compute_tag_wise_metrics, group_spans,
    AnnotatedDocument, AnnotatedSpan, FileAnnotations, PropertyFilter, Token,
};
use pprof::criterion::{Output, PProfProfiler};
use std::hint::black_box;

const LABELS: [&str; 6] = ["PATIENT", "DOCTOR", "DATE", "HOSP", "AGE", "PHONE"];

/// Deterministic annotations: every annotator tags roughly the same entities, with jittered
/// boundaries and the occasional miss, so the matcher sees partial overlaps.
fn synthetic_document(annotator: usize, n_spans: usize) -> AnnotatedDocument {
    let spans = (0..n_spans)
        .filter(|i| (i + annotator) % 7 != 0)
        .map(|i| {
            let start = i * 20 + (i * 3 + annotator) % 4;
            let end = start + 5 + (i + annotator * 5) % 6;
            AnnotatedSpan::new(LABELS[i % LABELS.len()], "", start, end)
                .with_property("TYPE", LABELS[(i + annotator / 2) % LABELS.len()])
        })
        .collect();
    AnnotatedDocument::new(format!("grader_{}.xml", annotator), "", spans)
}

fn synthetic_tokens(n_words: usize) -> (String, Vec<Token>) {
    let tags = ["O", "B-PATIENT", "L-PATIENT", "O", "U-DATE", "O", "U-AGE"];
    let mut text = String::new();
    let mut tokens = Vec::with_capacity(n_words);
    for i in 0..n_words {
        if i > 0 {
            text.push(' ');
        }
        let word = format!("w{}", i);
        text.push_str(&word);
        tokens.push(Token::unaligned(tags[i % tags.len()], format!("Ġ{}", word), 0.9));
    }
    (text, tokens)
}

fn benchmark_agreement_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("agreement_matrix");
    for n_annotators in [2, 5, 10] {
        let docs: Vec<AnnotatedDocument> = (0..n_annotators)
            .map(|a| synthetic_document(a, 500))
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(n_annotators),
            &docs,
            |b, docs| {
                b.iter(|| compute_agreement_matrix(black_box(docs), 0.5, &PropertyFilter::Ignore))
            },
        );
    }
    group.finish();
}

fn benchmark_tag_wise_metrics(c: &mut Criterion) {
    let docs: Vec<AnnotatedDocument> = (0..5).map(|a| synthetic_document(a, 500)).collect();
    let filter = PropertyFilter::only(["TYPE"]);
    c.bench_function("tag_wise_metrics", |b| {
        b.iter(|| compute_tag_wise_metrics(black_box(&docs), 0.5, &filter))
    });
}

fn benchmark_dataset_agreement(c: &mut Criterion) {
    let files: Vec<FileAnnotations> = (0..100)
        .map(|f| {
            let docs = (0..3).map(|a| synthetic_document(a + f % 2, 50)).collect();
            FileAnnotations::new(format!("note-{}", f), docs)
        })
        .collect();
    c.bench_function("dataset_agreement", |b| {
        b.iter(|| compute_dataset_agreement(black_box(&files), 0.5, &PropertyFilter::All))
    });
}

fn benchmark_group_spans(c: &mut Criterion) {
    let (text, tokens) = synthetic_tokens(2000);
    c.bench_function("group_spans_unaligned", |b| {
        b.iter(|| group_spans(black_box(&tokens), black_box(&text)).unwrap())
    });
}

criterion_group!(
    name=agreement_benches;
    config = Criterion::default().sample_size(100).with_profiler(PProfProfiler::new(3000, Output::Flamegraph(None)));
    targets = benchmark_agreement_matrix,
    benchmark_tag_wise_metrics,
    benchmark_dataset_agreement,
    benchmark_group_spans
);
criterion_main!(agreement_benches);
