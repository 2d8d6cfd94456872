use super::*;

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

fn aligner(channels: usize, spatial: (usize, usize)) -> VideoAligner {
    let config = AlignerConfig {
        in_channels: channels,
        spatial_size: spatial,
        temporal_size: 1,
        hidden_size: channels,
        embedding_size: channels,
    };
    VideoAligner::new(
        config,
        ConvBn::new(identity(channels), vec![0.0; channels]).unwrap(),
        ConvBn::new(identity(channels), vec![0.0; channels]).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_hswish_values() {
    assert_eq!(hswish(-4.0), 0.0);
    assert_eq!(hswish(3.0), 3.0);
    assert_eq!(hswish(5.0), 5.0);
    assert!((hswish(1.0) - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_batch_norm_folding_matches_unfolded() {
    let bn = BatchNorm {
        gamma: vec![2.0],
        beta: vec![1.0],
        running_mean: vec![0.5],
        running_var: vec![3.0],
        eps: 1.0,
    };
    let layer = ConvBn::from_batch_norm(vec![vec![2.0]], &bn).unwrap();
    assert_eq!(layer.weight, vec![vec![2.0]]);
    assert_eq!(layer.bias, vec![0.5]);

    let x = 1.5;
    let unfolded = 2.0 * (2.0 * x - 0.5) / (3.0f64 + 1.0).sqrt() + 1.0;
    assert!((layer.apply(&[x])[0] - unfolded).abs() < 1e-12);

    let short = BatchNorm {
        gamma: vec![],
        ..bn
    };
    assert!(matches!(
        ConvBn::from_batch_norm(vec![vec![2.0]], &short),
        Err(EvalError::ShapeMismatch(_))
    ));
}

#[test]
fn test_training_mode_returns_no_embedding() {
    let a = aligner(2, (1, 1));
    let x = FeatureMap::zeros(2, 1, 1, 1);
    let out = a.forward(&x, true).unwrap();
    assert!(out.temporal_embedding.is_none());
    assert!(std::ptr::eq(out.features, &x));
}

#[test]
fn test_forward_pools_maps_and_normalizes() {
    let a = aligner(2, (2, 2));
    // channel 0 is constant 3, channel 1 averages to 1
    let x = FeatureMap::new(2, 1, 2, 2, vec![3.0, 3.0, 3.0, 3.0, 0.0, 0.0, 0.0, 4.0]).unwrap();
    let out = a.forward(&x, false).unwrap();
    assert_eq!(out.features, &x);
    let y = out.temporal_embedding.unwrap();
    assert_eq!(y.shape(), (2, 1, 1, 1));

    let v = y.channel_vector(0, 0, 0);
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-12);
    assert!((v[0] / v[1] - 4.5).abs() < 1e-9);
}

#[test]
fn test_forward_sliding_window_shape() {
    let a = aligner(1, (2, 2));
    let x = FeatureMap::new(1, 2, 3, 3, (1..=18).map(f64::from).collect()).unwrap();
    let y = a.forward(&x, false).unwrap().temporal_embedding.unwrap();
    assert_eq!(y.shape(), (1, 2, 2, 2));
    assert!(y.data().iter().all(|v| (v - 1.0).abs() < 1e-12));
}

#[test]
fn test_zero_embedding_stays_finite() {
    let config = AlignerConfig {
        in_channels: 2,
        spatial_size: (1, 1),
        temporal_size: 1,
        hidden_size: 2,
        embedding_size: 2,
    };
    let zero = ConvBn::new(vec![vec![0.0; 2]; 2], vec![0.0; 2]).unwrap();
    let a = VideoAligner::new(config, zero.clone(), zero).unwrap();
    let x = FeatureMap::new(2, 1, 1, 1, vec![1.0, -1.0]).unwrap();
    let y = a.forward(&x, false).unwrap().temporal_embedding.unwrap();
    assert_eq!(y.data(), &[0.0, 0.0]);
}

#[test]
fn test_shape_errors() {
    assert!(matches!(
        FeatureMap::new(2, 1, 1, 1, vec![1.0]),
        Err(EvalError::ShapeMismatch(_))
    ));

    let a = aligner(2, (2, 2));
    assert!(matches!(
        a.forward(&FeatureMap::zeros(3, 1, 2, 2), false),
        Err(EvalError::ShapeMismatch(_))
    ));
    assert!(matches!(
        a.forward(&FeatureMap::zeros(2, 1, 1, 2), false),
        Err(EvalError::ShapeMismatch(_))
    ));

    let mut config = AlignerConfig::new(2);
    config.hidden_size = 3;
    config.embedding_size = 2;
    let err = VideoAligner::new(
        config,
        ConvBn::new(identity(2), vec![0.0; 2]).unwrap(),
        ConvBn::new(identity(2), vec![0.0; 2]).unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, EvalError::ShapeMismatch(_)));
}

#[test]
fn test_default_config_and_validation() {
    let config = AlignerConfig::new(1024);
    assert_eq!(config.spatial_size, (7, 7));
    assert_eq!(config.hidden_size, 512);
    assert_eq!(config.embedding_size, 256);

    let bad = AlignerConfig {
        hidden_size: 0,
        ..AlignerConfig::new(1)
    };
    assert!(matches!(bad.validate(), Err(EvalError::InvalidConfig(_))));
}
