use super::*;

#[test]
fn test_annotation_error_names_video() {
    let err = EvalError::annotation("v_abc", "segment end precedes start");
    let msg = err.to_string();
    assert!(msg.contains("v_abc"));
    assert!(msg.contains("segment end precedes start"));
}

#[test]
fn test_unsupported_metric_message() {
    let err = EvalError::UnsupportedMetric("F1".to_string());
    assert_eq!(err.to_string(), "metric F1 is not supported");
}

#[test]
fn test_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: EvalError = io_err.into();
    assert!(matches!(err, EvalError::Io(_)));
}

#[test]
fn test_from_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: EvalError = json_err.into();
    assert!(matches!(err, EvalError::Json(_)));
}
