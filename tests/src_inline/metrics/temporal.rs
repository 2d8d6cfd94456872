use super::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn gt(entries: &[(&str, &[(f64, f64, &str)])]) -> GroundTruth {
    entries
        .iter()
        .map(|(video, segs)| {
            let segs = segs
                .iter()
                .map(|&(start, end, label)| GroundTruthSegment {
                    start,
                    end,
                    label: label.to_string(),
                })
                .collect();
            (video.to_string(), segs)
        })
        .collect()
}

fn props(entries: &[(&str, &[(f64, f64, f64)])]) -> (Proposals, usize) {
    let mut total = 0;
    let map = entries
        .iter()
        .map(|(video, list)| {
            total += list.len();
            let list = list
                .iter()
                .map(|&(start, end, score)| Proposal { start, end, score })
                .collect();
            (video.to_string(), list)
        })
        .collect();
    (map, total)
}

fn det(video: &str, start: f64, end: f64, label: &str, score: f64) -> Detection {
    Detection {
        video_id: video.to_string(),
        start,
        end,
        label: label.to_string(),
        score,
    }
}

#[test]
fn test_pairwise_temporal_iou_values() {
    let iou = pairwise_temporal_iou(&[[0.0, 10.0]], &[[5.0, 15.0], [20.0, 30.0], [0.0, 10.0]]);
    assert_eq!(iou.len(), 1);
    assert!(close(iou[0][0], 5.0 / 15.0));
    assert_eq!(iou[0][1], 0.0);
    assert!(close(iou[0][2], 1.0));
}

#[test]
fn test_pairwise_temporal_iou_identity_diagonal() {
    let segs = [[0.0, 4.0], [2.5, 7.0], [10.0, 11.0]];
    let iou = pairwise_temporal_iou(&segs, &segs);
    for (i, row) in iou.iter().enumerate() {
        assert_eq!(row.len(), segs.len());
        assert!(close(row[i], 1.0));
    }
    assert_eq!(iou[0][2], 0.0);
}

#[test]
fn test_pairwise_temporal_iou_degenerate_segment() {
    let iou = pairwise_temporal_iou(&[[1.0, 1.0]], &[[1.0, 1.0]]);
    assert_eq!(iou[0][0], 0.0);
}

#[test]
fn test_pairwise_temporal_overlap_uses_candidate_length() {
    let overlap = pairwise_temporal_overlap(&[[0.0, 10.0]], &[[5.0, 15.0]]);
    assert!(close(overlap[0][0], 0.5));
}

#[test]
fn test_single_matching_proposal_recall_at_one() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "run")])]);
    let (proposals, total) = props(&[("v1", &[(1.0, 9.0, 0.9)])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(100.0), &[0.5])
        .unwrap();
    assert_eq!(ar.recall.len(), 1);
    assert_eq!(ar.recall[0].len(), 100);
    assert!(close(ar.recall[0][0], 1.0));
    assert!(close(ar.proposals_per_video[0], 1.0));
    assert!(close(ar.proposals_per_video[99], 100.0));
    assert!(close(ar.auc, 99.0));
}

#[test]
fn test_missing_video_contributes_zero() {
    let ground_truth = gt(&[
        ("v1", &[(0.0, 10.0, "run")]),
        ("v2", &[(0.0, 5.0, "jump")]),
    ]);
    let (proposals, total) = props(&[("v1", &[(0.0, 10.0, 0.9)])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(10.0), &[0.5])
        .unwrap();
    assert!(close(ar.recall[0][99], 0.5));
}

#[test]
fn test_empty_ground_truth_video_adds_no_positives() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "run")]), ("v2", &[])]);
    let (proposals, total) = props(&[
        ("v1", &[(0.0, 10.0, 0.9)]),
        ("v2", &[(3.0, 4.0, 0.2)]),
    ]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(10.0), &[0.5])
        .unwrap();
    assert!(close(ar.recall[0][99], 1.0));
}

#[test]
fn test_greedy_assignment_is_one_to_one() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "a"), (1.0, 10.0, "a")])]);
    let (proposals, total) = props(&[("v1", &[(0.0, 10.0, 0.9)])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(1.0), &[0.5])
        .unwrap();
    assert!(close(ar.recall[0][99], 0.5));
}

#[test]
fn test_greedy_assignment_prefers_highest_iou() {
    // The top proposal overlaps both segments; only the second one reaches
    // [0, 10] alone, so the top proposal must take [2, 12].
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "a"), (2.0, 12.0, "a")])]);
    let (proposals, total) = props(&[("v1", &[(2.0, 12.0, 0.9), (0.0, 6.0, 0.8)])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(2.0), &[0.5])
        .unwrap();
    assert!(close(ar.recall[0][99], 1.0));
    assert!(close(ar.recall[0][49], 0.5));
}

#[test]
fn test_average_recall_rejects_nan_scores() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "run")])]);
    let list = (0..40)
        .map(|i| {
            let score = if i % 3 == 0 { f64::NAN } else { 1.0 / (i + 1) as f64 };
            (i as f64, i as f64 + 5.0, score)
        })
        .collect::<Vec<_>>();
    let (proposals, total) = props(&[("v1", &list)]);
    let err = average_recall_at_avg_proposals(&ground_truth, &proposals, total, Some(40.0), &[0.5])
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

#[test]
fn test_average_recall_monotone_in_max_avg_proposals() {
    let ground_truth = gt(&[
        (
            "v1",
            &[(0.0, 10.0, "a"), (20.0, 30.0, "a"), (40.0, 50.0, "b")],
        ),
        ("v2", &[(0.0, 5.0, "a")]),
    ]);
    let (proposals, total) = props(&[
        (
            "v1",
            &[
                (0.0, 10.0, 0.9),
                (19.0, 31.0, 0.8),
                (100.0, 110.0, 0.7),
                (40.0, 50.0, 0.6),
                (60.0, 70.0, 0.5),
            ],
        ),
        ("v2", &[(0.0, 5.0, 0.4), (10.0, 20.0, 0.95)]),
    ]);

    let mut previous = -1.0;
    for max_avg in [1.0, 2.0, 3.0, 5.0] {
        let ar = average_recall_at_avg_proposals(
            &ground_truth,
            &proposals,
            total,
            Some(max_avg),
            &[0.5, 0.7],
        )
        .unwrap();
        let full = ar.avg_recall[99];
        assert!(full >= previous, "recall dropped at max_avg={max_avg}");
        previous = full;
    }
    assert!(close(previous, 1.0));
}

#[test]
fn test_average_recall_defaults_max_avg_from_counts() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "run")])]);
    let (proposals, total) = props(&[("v1", &[(0.0, 10.0, 0.5), (50.0, 60.0, 0.9)])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &proposals, total, None, &[0.5])
        .unwrap();
    assert!(close(ar.proposals_per_video[99], 2.0));
    // Best-scored proposal misses; the second one hits.
    assert!(close(ar.recall[0][49], 0.0));
    assert!(close(ar.recall[0][99], 1.0));
}

#[test]
fn test_average_recall_without_proposals_is_zero() {
    let ground_truth = gt(&[("v1", &[(0.0, 10.0, "run")])]);
    let ar = average_recall_at_avg_proposals(&ground_truth, &Proposals::new(), 0, Some(100.0), &[0.5])
        .unwrap();
    assert_eq!(ar.auc, 0.0);
    assert!(ar.avg_recall.iter().all(|v| *v == 0.0));
}

#[test]
fn test_average_recall_rejects_empty_ground_truth() {
    let err = average_recall_at_avg_proposals(&GroundTruth::new(), &Proposals::new(), 0, None, &[0.5])
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

#[test]
fn test_interpolated_precision_recall() {
    let ap = interpolated_precision_recall(&[1.0, 0.5, 2.0 / 3.0, 0.5], &[0.5, 0.5, 1.0, 1.0])
        .unwrap();
    assert!(close(ap, 0.5 + 0.5 * 2.0 / 3.0));
    assert!(interpolated_precision_recall(&[1.0], &[]).is_err());
}

#[test]
fn test_average_precision_at_temporal_iou() {
    let mut ground_truth = BTreeMap::new();
    ground_truth.insert("v1".to_string(), vec![[0.0, 10.0]]);
    ground_truth.insert("v2".to_string(), vec![[0.0, 5.0]]);
    let predictions = vec![
        det("v1", 0.0, 10.0, "a", 0.9),
        det("v1", 1.0, 9.0, "a", 0.8),
        det("v2", 0.0, 5.0, "a", 0.7),
        det("v3", 0.0, 1.0, "a", 0.6),
    ];
    let ap = average_precision_at_temporal_iou(&ground_truth, &predictions, &[0.5]).unwrap();
    assert!(close(ap[0], 0.5 + 0.5 * 2.0 / 3.0));
}

#[test]
fn test_average_precision_claims_highest_iou() {
    let mut ground_truth = BTreeMap::new();
    ground_truth.insert("v1".to_string(), vec![[0.0, 10.0], [2.0, 12.0]]);
    let predictions = vec![
        det("v1", 2.0, 12.0, "a", 0.9),
        det("v1", 0.0, 6.0, "a", 0.8),
    ];
    let ap = average_precision_at_temporal_iou(&ground_truth, &predictions, &[0.5]).unwrap();
    assert!(close(ap[0], 1.0));
}

#[test]
fn test_average_precision_rejects_nan_scores() {
    let mut ground_truth = BTreeMap::new();
    ground_truth.insert("v1".to_string(), vec![[0.0, 10.0]]);
    let predictions = vec![
        det("v1", 0.0, 10.0, "a", f64::NAN),
        det("v1", 1.0, 9.0, "a", 0.8),
    ];
    let err = average_precision_at_temporal_iou(&ground_truth, &predictions, &[0.5]).unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

#[test]
fn test_average_precision_without_predictions() {
    let mut ground_truth = BTreeMap::new();
    ground_truth.insert("v1".to_string(), vec![[0.0, 10.0]]);
    let ap = average_precision_at_temporal_iou(&ground_truth, &[], &[0.5, 0.75]).unwrap();
    assert_eq!(ap, vec![0.0, 0.0]);
}

#[test]
fn test_detection_map_averages_classes() {
    let ground_truth = gt(&[
        ("v1", &[(0.0, 10.0, "run")]),
        ("v2", &[(0.0, 5.0, "jump")]),
    ]);
    let detections = vec![
        det("v1", 0.0, 10.0, "run", 0.9),
        det("v2", 20.0, 30.0, "jump", 0.8),
        det("v2", 0.0, 5.0, "swim", 0.7),
    ];
    let map = mean_average_precision_at_temporal_iou(&ground_truth, &detections, &[0.5]).unwrap();
    assert!(close(map.per_class["run"][0], 1.0));
    assert!(close(map.per_class["jump"][0], 0.0));
    assert!(close(map.per_threshold[0], 0.5));
    assert!(close(map.mean, 0.5));
}
