use super::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn sample_scores() -> (Vec<Vec<f64>>, Vec<usize>) {
    (
        vec![
            vec![0.1, 0.5, 0.4],
            vec![0.7, 0.2, 0.1],
            vec![0.3, 0.3, 0.4],
        ],
        vec![2, 0, 1],
    )
}

#[test]
fn test_top_k_accuracy_per_k() {
    let (scores, labels) = sample_scores();
    let acc = top_k_accuracy(&scores, &labels, &[1, 2]).unwrap();
    assert!(close(acc[0], 1.0 / 3.0));
    assert!(close(acc[1], 1.0));
}

#[test]
fn test_top_k_accuracy_full_k_is_one() {
    let scores = vec![
        vec![0.0, 0.0, 0.0, 0.0],
        vec![-3.0, 1.0, 2.0, 0.5],
        vec![0.25, 0.25, 0.25, 0.9],
        vec![1.0, 2.0, 3.0, 4.0],
    ];
    let labels = vec![3, 0, 1, 0];
    let acc = top_k_accuracy(&scores, &labels, &[4, 10]).unwrap();
    assert_eq!(acc, vec![1.0, 1.0]);
}

#[test]
fn test_top_k_accuracy_rejects_mismatched_lengths() {
    let (scores, _) = sample_scores();
    let err = top_k_accuracy(&scores, &[0, 1], &[1]).unwrap_err();
    assert!(matches!(err, EvalError::ShapeMismatch(_)));
}

#[test]
fn test_top_k_accuracy_rejects_out_of_range_label() {
    let (scores, _) = sample_scores();
    let err = top_k_accuracy(&scores, &[0, 1, 3], &[1]).unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

#[test]
fn test_top_k_accuracy_rejects_zero_k() {
    let (scores, labels) = sample_scores();
    assert!(top_k_accuracy(&scores, &labels, &[0]).is_err());
}

#[test]
fn test_non_finite_scores_are_rejected() {
    let (mut scores, labels) = sample_scores();
    scores[1][2] = f64::NAN;
    let err = top_k_accuracy(&scores, &labels, &[1]).unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
    assert!(matches!(
        ranking_mean_average_precision(&scores, &labels).unwrap_err(),
        EvalError::InvalidInput(_)
    ));
    assert!(invalid_pred_info(&scores, &labels, 1).is_err());

    let multi = vec![vec![1.0, 0.0, 0.0]; 3];
    assert!(matches!(
        mean_average_precision(&scores, &multi).unwrap_err(),
        EvalError::InvalidInput(_)
    ));
}

#[test]
fn test_mean_top_k_accuracy_averages_classes() {
    // class 0: two samples, one hit; class 1: one sample, hit.
    let scores = vec![vec![0.9, 0.1], vec![0.2, 0.8], vec![0.3, 0.7]];
    let labels = vec![0, 0, 1];
    let acc = mean_top_k_accuracy(&scores, &labels, 1).unwrap();
    assert!(close(acc, 0.75));
}

#[test]
fn test_confusion_matrix_counts_and_normalizes() {
    let cf = confusion_matrix(&[0, 1, 1], &[0, 1, 0], None).unwrap();
    assert_eq!(cf.labels, vec![0, 1]);
    assert_eq!(cf.matrix, vec![vec![1.0, 1.0], vec![0.0, 1.0]]);

    let cf = confusion_matrix(&[0, 1, 1], &[0, 1, 0], Some(Normalize::True)).unwrap();
    assert_eq!(cf.matrix, vec![vec![0.5, 0.5], vec![0.0, 1.0]]);

    let cf = confusion_matrix(&[0, 1, 1], &[0, 1, 0], Some(Normalize::Pred)).unwrap();
    assert_eq!(cf.matrix, vec![vec![1.0, 0.5], vec![0.0, 0.5]]);
}

#[test]
fn test_normalize_from_str() {
    assert_eq!("all".parse::<Normalize>().unwrap(), Normalize::All);
    assert!("rows".parse::<Normalize>().is_err());
}

#[test]
fn test_mean_class_accuracy_skips_absent_classes() {
    let scores = vec![
        vec![0.9, 0.05, 0.05],
        vec![0.1, 0.8, 0.1],
        vec![0.1, 0.1, 0.8],
    ];
    let labels = vec![0, 0, 1];
    let acc = mean_class_accuracy(&scores, &labels).unwrap();
    assert!(close(acc, 0.25));
}

#[test]
fn test_get_weighted_score() {
    let fused = get_weighted_score(&[vec![vec![1.0, 2.0]], vec![vec![3.0, 4.0]]], &[1.0, 0.5])
        .unwrap();
    assert_eq!(fused, vec![vec![2.5, 4.0]]);
}

#[test]
fn test_get_weighted_score_shape_mismatch() {
    let err = get_weighted_score(&[vec![vec![1.0, 2.0]], vec![vec![3.0]]], &[1.0, 1.0])
        .unwrap_err();
    assert!(matches!(err, EvalError::ShapeMismatch(_)));
    assert!(get_weighted_score(&[vec![vec![1.0]]], &[1.0, 2.0]).is_err());
}

#[test]
fn test_mean_average_precision_multilabel() {
    let scores = vec![vec![0.9, 0.1], vec![0.8, 0.7], vec![0.3, 0.6]];
    let labels = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
    let map = mean_average_precision(&scores, &labels).unwrap().unwrap();
    assert!(close(map, (5.0 / 6.0 + 1.0) / 2.0));
}

#[test]
fn test_mean_average_precision_without_positives() {
    let scores = vec![vec![0.9], vec![0.1]];
    let labels = vec![vec![0.0], vec![0.0]];
    assert_eq!(mean_average_precision(&scores, &labels).unwrap(), None);
}

#[test]
fn test_ranking_mean_average_precision() {
    let scores = vec![vec![0.2, 0.8], vec![0.9, 0.1], vec![0.3, 0.7]];
    let labels = vec![0, 0, 1];
    let map = ranking_mean_average_precision(&scores, &labels).unwrap();
    assert!(close(map, ((1.0 + 2.0 / 3.0) / 2.0 + 0.5) / 2.0));
}

#[test]
fn test_invalid_pred_info_lists_misses() {
    let (scores, labels) = sample_scores();
    let invalid = invalid_pred_info(&scores, &labels, 1).unwrap();
    assert_eq!(invalid.len(), 2);
    assert_eq!(invalid[0].sample, 0);
    assert_eq!(invalid[0].top_k, vec![1]);
    assert_eq!(invalid[0].top_k_scores, vec![0.5]);
    assert_eq!(invalid[1].sample, 2);
    assert_eq!(invalid[1].label, 1);
}

#[test]
fn test_softmax_rows_sum_to_one() {
    let probs = softmax(&[vec![1.0, 1.0], vec![1000.0, 0.0, -5.0]]);
    assert!(close(probs[0][0], 0.5));
    assert!(close(probs[1].iter().sum::<f64>(), 1.0));
    assert!(probs[1][0] > 0.999);
}
