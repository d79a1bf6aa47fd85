use criterion::{criterion_group, criterion_main, Criterion};

use histeft::callbacks::SinkCallback;
use histeft::processor::process_chunks;
use histeft::*;

use rand::Rng;
use rand_pcg::Pcg64;

/// A chunk of events: the value of the observable and the pre-weighted EFT coefficients.
struct Chunk {
    ht: Vec<f64>,
    coefficients: CoefficientMatrix<f64>,
}

fn template() -> EftHistogram<f64> {
    EftHistogram::new(
        "Events",
        WcBasis::parse("ctW, ctZ, ctp, cpQM, ctG, cbW, cpQ3, cptb").unwrap(),
        vec![
            Axis::categorical("sample", "sample"),
            Axis::regular("ht", "H_T (GeV)", 50, 0.0, 1000.0).unwrap(),
        ],
    )
    .unwrap()
}

fn chunks(n_chunks: usize, events: usize, ncoeff: usize) -> Vec<Chunk> {
    // initialize the random number generator
    let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);

    (0..n_chunks)
        .map(|_| Chunk {
            ht: (0..events).map(|_| 1100.0 * rng.gen::<f64>()).collect(),
            coefficients: CoefficientMatrix::new(
                ncoeff,
                (0..events * ncoeff).map(|_| rng.gen::<f64>() - 0.5).collect(),
            )
            .unwrap(),
        })
        .collect()
}

fn fill_chunk(chunk: &Chunk, hist: &mut EftHistogram<f64>) -> Result<()> {
    hist.fill(
        FillRequest::new()
            .category("sample", "ttH")
            .values("ht", chunk.ht.clone())
            .eft_coefficients(chunk.coefficients.clone()),
    )
}

fn criterion_fill_benchmark(c: &mut Criterion) {
    let template = template();
    let data = chunks(8, 1_000, template.num_coefficients());

    c.bench_function("fill_8_wcs", |b| {
        b.iter(|| {
            let mut h = template.identity();
            for chunk in &data {
                fill_chunk(chunk, &mut h).unwrap();
            }
            h
        })
    });

    c.bench_function("process_8_wcs_4_workers", |b| {
        b.iter(|| process_chunks(&template, &data, 4, &SinkCallback {}, fill_chunk).unwrap())
    });

    let mut filled = template.identity();
    for chunk in &data {
        fill_chunk(chunk, &mut filled).unwrap();
    }
    let point = WcPoint::sm().with("ctW", 1.0).with("ctZ", -0.5);

    c.bench_function("eval_8_wcs", |b| {
        b.iter(|| {
            filled.eval(&point).unwrap();
            filled.integral()
        })
    });
}

criterion_group!(benches, criterion_fill_benchmark);
criterion_main!(benches);
