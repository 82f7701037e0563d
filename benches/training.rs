use churnboost::training::{
    CatBoostClassifier, CatBoostConfig, Classifier, LightGBMClassifier, LightGBMConfig,
    XGBoostClassifier, XGBoostConfig,
};
use churnboost::feature_engineering::{SvdConfig, TfidfVectorizer, TruncatedSvd};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    // Label from a sum of the first features plus noise
    let y = Array1::from_shape_fn(n_rows, |i| {
        let s: f64 = (0..n_features.min(3)).map(|j| x[[i, j]]).sum();
        if s + rng.gen::<f64>() * 2.0 > 16.0 { 1.0 } else { 0.0 }
    });
    (x, y)
}

fn models() -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(XGBoostClassifier::new(XGBoostConfig {
            n_estimators: 50,
            ..Default::default()
        })),
        Box::new(LightGBMClassifier::new(LightGBMConfig {
            n_estimators: 50,
            ..Default::default()
        })),
        Box::new(CatBoostClassifier::new(CatBoostConfig {
            iterations: 50,
            ..Default::default()
        })),
    ]
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let data = create_classification_data(*n_rows, 25);
        for idx in 0..models().len() {
            let name = models()[idx].name().to_string();
            group.bench_with_input(BenchmarkId::new(name, n_rows), &data, |b, (x, y)| {
                b.iter(|| {
                    let mut model = models().swap_remove(idx);
                    model.fit(black_box(x), black_box(y)).unwrap()
                })
            });
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (train_x, train_y) = create_classification_data(5000, 25);
    let mut fitted = models();
    for model in fitted.iter_mut() {
        model.fit(&train_x, &train_y).unwrap();
    }

    for n_rows in [100, 10000].iter() {
        let (x, _) = create_classification_data(*n_rows, 25);
        for model in &fitted {
            group.bench_with_input(BenchmarkId::new(model.name(), n_rows), &x, |b, x| {
                b.iter(|| model.predict_proba(black_box(x)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_text_embedding(c: &mut Criterion) {
    let surnames = ["Okwudili", "Chen", "Hsia", "Lucchese", "Kao", "Manna", "Smith", "Ch'ang"];
    let docs: Vec<String> = (0..20_000)
        .map(|i| format!("{}{} {}", 15_600_000 + i, surnames[i % surnames.len()], i % 97))
        .collect();

    c.bench_function("tfidf_svd_20k", |b| {
        b.iter(|| {
            let mut tfidf = TfidfVectorizer::new();
            let sparse = tfidf.fit_transform(black_box(&docs)).unwrap();
            TruncatedSvd::new(SvdConfig::default()).fit_transform(&sparse).unwrap()
        })
    });
}

criterion_group!(benches, bench_training, bench_prediction, bench_text_embedding);
criterion_main!(benches);
