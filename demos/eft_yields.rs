//! Fills a histogram with synthetic events on several workers and prints the signal-region yield
//! at a few points in Wilson-coefficient space.
//!
//! Run with `RUST_LOG=info cargo run --example eft_yields` to see the progress of the workers.
use histeft::callbacks::SimpleCumulativeCallback;
use histeft::processor::process_chunks;
use histeft::regions::{integrate_signal_regions, SIGNAL_REGION_MARKER};
use histeft::*;

use rand::Rng;
use rand_pcg::Pcg64;

const SPECIFICATION: &str = r#"{
    "label": "Events",
    "wc_names": "ctW, ctZ",
    "axes": [
        {"categorical": {"name": "sample", "label": "sample"}},
        {"categorical": {"name": "appl", "label": "AR/SR"}},
        {"regular": {"name": "njets", "label": "Jet multiplicity", "bins": 10, "low": 0, "high": 10}}
    ]
}"#;

struct Chunk {
    region: &'static str,
    njets: Vec<f64>,
    weights: Vec<f64>,
    /// Coefficients per unit weight.
    coefficients: Vec<Vec<f64>>,
}

fn generate(rng: &mut Pcg64, n_chunks: usize, events: usize) -> Vec<Chunk> {
    (0..n_chunks)
        .map(|c| {
            let mut chunk = Chunk {
                region: if c % 4 == 0 { "isAR_2lSS" } else { "isSR_2lSS" },
                njets: Vec::with_capacity(events),
                weights: Vec::with_capacity(events),
                coefficients: Vec::with_capacity(events),
            };

            for _ in 0..events {
                let njets = (rng.gen::<f64>() * 8.0).floor() + 2.0;
                let hardness = njets / 10.0;
                chunk.njets.push(njets);
                chunk.weights.push(0.01 + 0.01 * rng.gen::<f64>());
                // 1, ctW, ctW^2, ctZ, ctW*ctZ, ctZ^2
                chunk.coefficients.push(vec![
                    1.0,
                    0.2 * hardness,
                    0.05 * hardness * hardness,
                    -0.1,
                    0.01 * hardness,
                    0.02,
                ]);
            }

            chunk
        })
        .collect()
}

fn fill(chunk: &Chunk, hist: &mut EftHistogram<f64>) -> Result<()> {
    let coefficients =
        CoefficientMatrix::from_unweighted(chunk.coefficients.clone(), &chunk.weights)?;

    hist.fill(
        FillRequest::new()
            .category("sample", "ttHJet")
            .category("appl", chunk.region)
            .values("njets", chunk.njets.clone())
            .weights(chunk.weights.clone())
            .eft_coefficients(coefficients),
    )
}

fn main() -> Result<()> {
    env_logger::init();

    let template = HistogramSpecification::<f64>::from_json(SPECIFICATION)?.build()?;

    // create a random number generator
    let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);
    let chunks = generate(&mut rng, 16, 5_000);

    let hist = process_chunks(&template, &chunks, 4, &SimpleCumulativeCallback {}, fill)?;
    let mut sr = integrate_signal_regions(&hist, "appl", SIGNAL_REGION_MARKER)?;
    let key = vec!["ttHJet".to_string()];

    for &(ctw, ctz) in &[(0.0, 0.0), (1.0, 0.0), (0.0, 2.0), (-2.0, 1.5)] {
        sr.eval(&WcPoint::sm().with("ctW", ctw).with("ctZ", ctz))?;
        let total = sr.sum(&["njets"], Overflow::None)?;

        if let Some(contents) = total.contents(&key) {
            let y = Yield::new(contents.sumw()[0], contents.sumw2()[0]);
            println!(
                "ctW = {:5.2}, ctZ = {:5.2}: N = {:.4} \u{b1} {:.4}",
                ctw,
                ctz,
                y.value(),
                y.std()?
            );
        }
    }

    sr.set_wc_fit(Some(&key))?;
    sr.dump_fits(Some(&key));

    Ok(())
}
