use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motionflow_core::dataset::{parse_document, Document, Sample, SequenceDataset};
use motionflow_core::{DATASET_FORMAT, FEATURE_WIDTH};

fn synthetic_document(samples: usize, frames: usize) -> String {
    let labels = ["swipe_left", "swipe_right", "circle", "pinch"];
    let samples: Vec<Sample> = (0..samples)
        .map(|i| {
            let sequence = (0..frames)
                .map(|t| {
                    (0..FEATURE_WIDTH)
                        .map(|f| ((i + t + f) % 97) as f32 / 97.0)
                        .collect()
                })
                .collect();
            Sample::new(labels[i % labels.len()], sequence)
        })
        .collect();
    serde_json::json!({ "format": DATASET_FORMAT, "samples": samples }).to_string()
}

fn bench_loader(c: &mut Criterion) {
    let doc = synthetic_document(64, 30);

    c.bench_function("parse_document_64x30", |b| {
        b.iter(|| parse_document(black_box(&doc)).unwrap());
    });

    let Document::Accepted(samples) = parse_document(&doc).unwrap() else {
        panic!("synthetic document rejected");
    };
    c.bench_function("stack_samples_64x30", |b| {
        b.iter(|| SequenceDataset::from_samples(black_box(samples.clone())).unwrap());
    });
}

criterion_group!(benches, bench_loader);
criterion_main!(benches);
