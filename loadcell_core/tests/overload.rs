use loadcell_core::overload::{OverloadDetector, OverloadSignal};
use rstest::rstest;

fn run(weights: &[f64], target: f64) -> Vec<OverloadSignal> {
    let mut d = OverloadDetector::new();
    weights.iter().filter_map(|&w| d.check(w, target)).collect()
}

#[test]
fn edges_only_on_transitions() {
    let signals = run(&[5.0, 15.0, 20.0, 8.0, 25.0], 10.0);
    assert_eq!(
        signals,
        vec![
            OverloadSignal::Overload {
                weight: 15.0,
                target: 10.0
            },
            OverloadSignal::Clear,
            OverloadSignal::Overload {
                weight: 25.0,
                target: 10.0
            },
        ]
    );
}

#[rstest]
#[case::equal_is_not_over(&[10.0, 10.0], 10.0, 0)]
#[case::stays_armed(&[11.0, 12.0, 13.0], 10.0, 1)]
#[case::zero_target(&[100.0], 0.0, 0)]
#[case::negative_target(&[100.0], -5.0, 0)]
#[case::flapping(&[11.0, 9.0, 11.0, 9.0], 10.0, 4)]
fn signal_counts(#[case] weights: &[f64], #[case] target: f64, #[case] expected: usize) {
    assert_eq!(run(weights, target).len(), expected);
}

#[test]
fn invalid_target_leaves_armed_detector_alone() {
    let mut d = OverloadDetector::new();
    assert!(d.check(12.0, 10.0).is_some());
    assert_eq!(d.check(12.0, 0.0), None);
    assert_eq!(d.check(12.0, f64::NAN), None);
    assert!(d.is_armed());

    assert_eq!(d.check(9.0, 10.0), Some(OverloadSignal::Clear));
    assert!(d.check(12.0, 10.0).is_some());
    d.reset();
    assert!(!d.is_armed());
}
