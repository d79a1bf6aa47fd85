use histeft::coefficients::remap;
use histeft::*;

use assert_approx_eq::assert_approx_eq;
use rand::Rng;
use rand_pcg::Pcg64;

// TOLERANCE to use in floating point comparisons.
const TOLERANCE: f64 = 1e-9;

fn rng() -> Pcg64 {
    Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96)
}

fn empty() -> EftHistogram<f64> {
    EftHistogram::new(
        "Events",
        WcBasis::parse("c1, c2").unwrap(),
        vec![
            Axis::categorical("sample", "sample"),
            Axis::categorical("channel", "channel"),
            Axis::regular("met", "MET (GeV)", 2, 0.0, 100.0).unwrap(),
        ],
    )
    .unwrap()
}

fn key(sample: &str, channel: &str) -> BinKey {
    vec![sample.to_string(), channel.to_string()]
}

/// A batch of `n` random events with MET values partly beyond the last bin.
fn batch(rng: &mut Pcg64, sample: &str, channel: &str, n: usize) -> FillRequest<f64> {
    let mut met = Vec::with_capacity(n);
    let mut rows = Vec::with_capacity(n);

    for _ in 0..n {
        met.push(120.0 * rng.gen::<f64>());
        let r: f64 = rng.gen();
        rows.push(vec![1.0 + r, r - 0.5, 0.1 * r, 0.3 - r, 0.05, 0.2 * r]);
    }

    let weights = rows.iter().map(|row| row[0]).collect();

    FillRequest::new()
        .category("sample", sample)
        .category("channel", channel)
        .values("met", met)
        .weights(weights)
        .eft_coefficients(CoefficientMatrix::from_rows(rows).unwrap())
}

fn assert_contents_approx_eq(lhs: &BinContents<f64>, rhs: &BinContents<f64>) {
    let pairs = std::iter::once((lhs.sumw(), rhs.sumw()))
        .chain(std::iter::once((lhs.sumw2(), rhs.sumw2())))
        .chain(lhs.coeffs().iter().zip(rhs.coeffs()).map(|(a, b)| (a.as_slice(), b.as_slice())))
        .chain(
            lhs.errcoeffs()
                .iter()
                .zip(rhs.errcoeffs())
                .map(|(a, b)| (a.as_slice(), b.as_slice())),
        );

    assert_eq!(lhs.coeffs().len(), rhs.coeffs().len());
    assert_eq!(lhs.errcoeffs().len(), rhs.errcoeffs().len());

    for (a, b) in pairs {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert_approx_eq!(*x, *y, TOLERANCE);
        }
    }
}

#[test]
fn single_event_yields() {
    let mut h = empty();
    h.fill(
        FillRequest::new()
            .category("sample", "sampleA")
            .category("channel", "chan1")
            .value("met", 25.0)
            .eft_coefficients(
                CoefficientMatrix::from_rows(vec![vec![10.0, 1.0, 1.0, 0.1, 0.1, 0.05]]).unwrap(),
            ),
    )
    .unwrap();

    // underflow, two bins, overflow, nan
    let slot = 1;

    h.set_sm().unwrap();
    let c = h.contents(&key("sampleA", "chan1")).unwrap();
    assert_approx_eq!(c.sumw()[slot], 10.0, TOLERANCE);
    assert_approx_eq!(c.sumw2()[slot], 100.0, TOLERANCE);

    h.eval(&WcPoint::sm().with("c1", 1.0).with("c2", 1.0)).unwrap();
    let c = h.contents(&key("sampleA", "chan1")).unwrap();
    assert_approx_eq!(c.sumw()[slot], 12.25, TOLERANCE);
    assert_approx_eq!(c.sumw2()[slot], 12.25 * 12.25, TOLERANCE);
    assert_eq!(c.sumw()[slot + 1], 0.0);

    h.eval(&WcPoint::sm().with("c1", 2.0)).unwrap();
    let c = h.contents(&key("sampleA", "chan1")).unwrap();
    assert_approx_eq!(c.sumw()[slot], 16.0, TOLERANCE);

    h.set_wc_fit(None).unwrap();
    let fit = &h.fits(&key("sampleA", "chan1")).unwrap()[slot];
    let y = fit.eval(&WcPoint::sm().with("c2", 2.0)).unwrap();
    assert_approx_eq!(y.value(), 10.4, TOLERANCE);
    assert_approx_eq!(y.std().unwrap(), 10.4, TOLERANCE);
}

#[test]
fn addition_is_linear() {
    let mut rng = rng();
    let first = batch(&mut rng, "ttH", "2lss", 50);
    let second = batch(&mut rng, "ttH", "2lss", 70);
    let third = batch(&mut rng, "ttW", "3l", 30);

    let mut a = empty();
    a.fill(first.clone()).unwrap();
    let mut b = empty();
    b.fill(second.clone()).unwrap();
    b.fill(third.clone()).unwrap();

    let mut all = empty();
    all.fill(first).unwrap();
    all.fill(second).unwrap();
    all.fill(third).unwrap();

    let sum = a.clone().merged(&b).unwrap();
    assert_eq!(sum.keys().count(), 2);
    for k in all.keys() {
        assert_contents_approx_eq(sum.contents(k).unwrap(), all.contents(k).unwrap());
    }

    // evaluating the sum is the same as summing the evaluations
    let point = WcPoint::sm().with("c1", 0.7).with("c2", -1.3);
    let mut sum = sum;
    sum.eval(&point).unwrap();
    a.eval(&point).unwrap();
    b.eval(&point).unwrap();

    let k = key("ttH", "2lss");
    let (s, x, y) = (
        sum.contents(&k).unwrap(),
        a.contents(&k).unwrap(),
        b.contents(&k).unwrap(),
    );
    for slot in 0..s.sumw().len() {
        assert_approx_eq!(s.sumw()[slot], x.sumw()[slot] + y.sumw()[slot], TOLERANCE);
        assert_approx_eq!(s.sumw2()[slot], x.sumw2()[slot] + y.sumw2()[slot], TOLERANCE);
    }
}

#[test]
fn addition_is_commutative_and_has_identity() {
    let mut rng = rng();
    let mut a = empty();
    a.fill(batch(&mut rng, "ttH", "2lss", 20)).unwrap();
    let mut b = empty();
    b.fill(batch(&mut rng, "ttW", "2lss", 20)).unwrap();
    b.fill(batch(&mut rng, "ttH", "2lss", 20)).unwrap();

    let ab = a.clone().merged(&b).unwrap();
    let ba = b.clone().merged(&a).unwrap();

    assert_eq!(ab.identifiers("sample").unwrap(), &["ttH", "ttW"]);
    assert_eq!(ba.identifiers("sample").unwrap(), &["ttW", "ttH"]);
    for k in ab.keys() {
        assert_eq!(ab.contents(k), ba.contents(k));
    }

    let same = a.identity().merged(&a).unwrap();
    for k in a.keys() {
        assert_eq!(same.contents(k), a.contents(k));
    }
}

#[test]
fn adding_evaluated_histograms_uses_accumulated_sums() {
    let mut rng = rng();
    let mut a = empty();
    a.fill(batch(&mut rng, "ttH", "2lss", 10)).unwrap();
    let reference = a.clone();

    a.eval(&WcPoint::sm().with("c1", 3.0)).unwrap();
    let mut b = empty();
    b.add(&a).unwrap();

    assert!(!b.is_evaluated());
    let k = key("ttH", "2lss");
    assert_eq!(b.contents(&k), reference.contents(&k));

    // filling an evaluated histogram restores it first
    a.fill(batch(&mut rng, "ttH", "2lss", 10)).unwrap();
    assert!(!a.is_evaluated());
}

#[test]
fn eval_is_idempotent() {
    let mut rng = rng();
    let mut h = empty();
    h.fill(batch(&mut rng, "ttH", "2lss", 40)).unwrap();
    h.fill(
        FillRequest::new()
            .category("sample", "data")
            .category("channel", "2lss")
            .values("met", vec![10.0, 60.0, 70.0]),
    )
    .unwrap();

    let p1 = WcPoint::sm().with("c1", 1.5);
    let p2 = WcPoint::sm().with("c1", -2.0).with("c2", 0.25);

    h.eval(&p1).unwrap();
    let first = h.values(Overflow::AllNan);
    h.eval(&p2).unwrap();
    assert_ne!(h.values(Overflow::AllNan), first);
    h.eval(&p1).unwrap();
    assert_eq!(h.values(Overflow::AllNan), first);

    // samples without EFT information keep their sums
    let values = h.values(Overflow::None);
    assert_eq!(values[&key("data", "2lss")], vec![1.0, 2.0]);

    assert!(h.eval(&WcPoint::sm().with("c3", 1.0)).is_err());
}

#[test]
fn slice_and_complement_add_up() {
    let mut rng = rng();
    let mut h = empty();
    h.fill(batch(&mut rng, "ttH", "2lss", 30)).unwrap();
    h.fill(batch(&mut rng, "ttW", "2lss", 30)).unwrap();
    h.fill(batch(&mut rng, "tZq", "3l", 30)).unwrap();

    let ttw = h
        .select(&Selection::new().identifiers("sample", &["ttW"]))
        .unwrap();
    let rest = h.remove(&["ttW"], "sample").unwrap();
    let total = rest.merged(&ttw).unwrap();
    for k in h.keys() {
        assert_eq!(total.contents(k), h.contents(k));
    }

    // splitting the numeric axis
    let low = h.integrate("met", Some(Select::Bins(0..1))).unwrap();
    let high = h.integrate("met", Some(Select::Bins(1..2))).unwrap();
    let both = h.integrate("met", None).unwrap();
    let sum = low.merged(&high).unwrap();
    for k in both.keys() {
        assert_contents_approx_eq(sum.contents(k).unwrap(), both.contents(k).unwrap());
    }

    let met = match h.axis("met").unwrap() {
        Axis::Numeric(axis) => axis.clone(),
        Axis::Categorical(_) => unreachable!(),
    };
    assert_eq!(met.bin_range(0.0, 50.0), 0..1);
}

#[test]
fn fits_of_sums_are_sums_of_fits() {
    let mut rng = rng();
    let mut h = empty();
    h.fill(batch(&mut rng, "ttH", "2lss", 25)).unwrap();
    let k = key("ttH", "2lss");
    h.set_wc_fit(Some(&k)).unwrap();

    let mut summed = h.sum(&["met"], Overflow::AllNan).unwrap();
    summed.set_wc_fit(Some(&k)).unwrap();
    let total = &summed.fits(&k).unwrap()[0];

    for &point in &[[0.0, 0.0], [1.0, -1.0], [-3.0, 0.5]] {
        let parts: f64 = h
            .fits(&k)
            .unwrap()
            .iter()
            .map(|f| f.eval_point(&point).unwrap())
            .sum();
        let errors: f64 = h
            .fits(&k)
            .unwrap()
            .iter()
            .map(|f| f.eval_point_error(&point).unwrap())
            .sum();

        assert_approx_eq!(total.eval_point(&point).unwrap(), parts, TOLERANCE);
        assert_approx_eq!(total.eval_point_error(&point).unwrap(), errors, TOLERANCE);
    }
}

#[test]
fn remapped_coefficients_match() {
    let src = WcBasis::parse("c2,c1").unwrap();
    let dst = WcBasis::parse("c1,c2").unwrap();
    // 1, c2, c2^2, c1, c1*c2, c1^2
    let computed = CoefficientMatrix::from_rows(vec![vec![10.0, 0.1, 0.05, 1.0, 0.1, 1.0]]).unwrap();
    let remapped = remap(&src, &dst, &computed).unwrap();
    assert_eq!(remapped.row(0), &[10.0, 1.0, 1.0, 0.1, 0.1, 0.05]);

    let mut h = empty();
    h.fill(
        FillRequest::new()
            .category("sample", "sampleA")
            .category("channel", "chan1")
            .value("met", 75.0)
            .eft_coefficients(remapped),
    )
    .unwrap();
    h.eval(&WcPoint::sm().with("c1", 1.0).with("c2", 1.0)).unwrap();
    assert_approx_eq!(
        h.contents(&key("sampleA", "chan1")).unwrap().sumw()[2],
        12.25,
        TOLERANCE
    );
}

#[test]
fn serialized_histograms_can_be_merged() {
    let mut rng = rng();
    let mut a = empty();
    a.fill(batch(&mut rng, "ttH", "2lss", 15)).unwrap();
    let mut b = empty();
    b.fill(batch(&mut rng, "ttH", "2lss", 15)).unwrap();

    let blob = b.to_json().unwrap();
    let restored = EftHistogram::<f64>::from_json(&blob).unwrap();
    assert!(restored.compatible(&a));

    let via_json = a.clone().merged(&restored).unwrap();
    let direct = a.merged(&b).unwrap();
    let k = key("ttH", "2lss");
    assert_contents_approx_eq(via_json.contents(&k).unwrap(), direct.contents(&k).unwrap());
}

#[test]
fn histograms_from_specifications() {
    let spec = HistogramSpecification::<f64>::from_json(
        r#"{
            "label": "Events",
            "wc_names": "c1, c2",
            "axes": [
                {"categorical": {"name": "sample", "label": "sample"}},
                {"categorical": {"name": "channel", "label": "channel"}},
                {"regular": {"name": "met", "label": "MET (GeV)", "bins": 2, "low": 0, "high": 100}}
            ]
        }"#,
    )
    .unwrap();

    let h = spec.build().unwrap();
    assert!(h.compatible(&empty()));
}

fn data_and_signal() -> EftHistogram<f64> {
    let mut h = empty();
    h.fill(
        FillRequest::new()
            .category("sample", "data")
            .category("channel", "2lss")
            .values("met", vec![10.0; 5]),
    )
    .unwrap();
    h.fill(
        FillRequest::new()
            .category("sample", "ttH")
            .category("channel", "2lss")
            .value("met", 10.0)
            .eft_coefficients(
                CoefficientMatrix::from_rows(vec![vec![2.0, 1.0, 0.5, 0.0, 0.0, 0.0]]).unwrap(),
            ),
    )
    .unwrap();
    h
}

#[test]
fn summing_commutes_with_evaluation() {
    let point = WcPoint::sm().with("c1", 1.0);
    let k = vec!["2lss".to_string()];

    let mut evaluated = data_and_signal();
    evaluated.eval(&point).unwrap();
    let eval_then_sum = evaluated.sum(&["sample"], Overflow::None).unwrap();

    let mut sum_then_eval = data_and_signal().sum(&["sample"], Overflow::None).unwrap();
    sum_then_eval.eval(&point).unwrap();

    let (a, b) = (
        eval_then_sum.contents(&k).unwrap(),
        sum_then_eval.contents(&k).unwrap(),
    );
    // five data events and 2 + 1 + 0.5 at c1 = 1
    assert_approx_eq!(a.sumw()[1], 8.5, TOLERANCE);
    assert_approx_eq!(b.sumw()[1], 8.5, TOLERANCE);
    assert_approx_eq!(a.sumw2()[1], 5.0 + 3.5 * 3.5, TOLERANCE);
    assert_approx_eq!(b.sumw2()[1], 5.0 + 3.5 * 3.5, TOLERANCE);

    let mut sm = data_and_signal().sum(&["sample"], Overflow::None).unwrap();
    sm.set_sm().unwrap();
    assert_approx_eq!(sm.contents(&k).unwrap().sumw()[1], 7.0, TOLERANCE);
}

#[test]
fn mixed_fills_into_one_key_keep_every_weight() {
    let k = key("ttH", "2lss");
    let plain = || {
        FillRequest::new()
            .category("sample", "ttH")
            .category("channel", "2lss")
            .value("met", 10.0)
            .weights(vec![3.0])
    };
    let eft = || {
        FillRequest::new()
            .category("sample", "ttH")
            .category("channel", "2lss")
            .value("met", 10.0)
            .weights(vec![2.0])
            .eft_coefficients(
                CoefficientMatrix::from_rows(vec![vec![2.0, 0.0, 0.0, 0.0, 0.0, 0.0]]).unwrap(),
            )
    };

    for order in &[[true, false], [false, true]] {
        let mut h = empty();
        for &with_coefficients in order {
            h.fill(if with_coefficients { eft() } else { plain() }).unwrap();
        }

        h.set_sm().unwrap();
        let c = h.contents(&k).unwrap();
        assert_approx_eq!(c.accumulated_sumw()[1], 5.0, TOLERANCE);
        assert_approx_eq!(c.sumw()[1], 5.0, TOLERANCE);
        assert_approx_eq!(c.sumw2()[1], 13.0, TOLERANCE);
    }

    // the same through addition of separately filled histograms
    let mut a = empty();
    a.fill(plain()).unwrap();
    let mut b = empty();
    b.fill(eft()).unwrap();
    let mut sum = a.merged(&b).unwrap();
    sum.set_sm().unwrap();
    assert_approx_eq!(sum.contents(&k).unwrap().sumw()[1], 5.0, TOLERANCE);
}
