//! Tests for the generation algorithm through its public surface

use seriesgen_pool::core::generation::{
    estimated_bytes, generate, seed_for, Curve, GenerationOutput, NumericBuffer, NumericWidth,
    SeriesPayload, Xorshift32, MAX_OUTPUT_BYTES, MAX_POINTS,
};
use seriesgen_pool::core::{AbortSignal, GenerationError, GenerationRequest, ResponseHeader};

fn run(points: usize, lines: usize, curve: &str, width: NumericWidth) -> GenerationOutput {
    let request = GenerationRequest::new(1, points, lines, curve, width);
    generate(&request, seed_for(1, 1_700_000_000_000), &AbortSignal::new()).unwrap()
}

#[test]
fn test_xorshift_sequence_is_stable() {
    let mut a = Xorshift32::new(12_345);
    let mut b = Xorshift32::new(12_345);
    for _ in 0..1_000 {
        assert_eq!(a.next_u32(), b.next_u32());
    }
    let f = Xorshift32::new(99).next_f64();
    assert!((0.0..1.0).contains(&f));
}

#[test]
fn test_zero_seed_is_usable() {
    let mut rng = Xorshift32::new(0);
    assert_ne!(rng.next_u32(), 0);
}

#[test]
fn test_every_curve_produces_finite_bounds() {
    for curve in Curve::ALL {
        let out = run(200, 3, curve.as_str(), NumericWidth::Float64);
        assert_eq!(out.curve, curve);
        assert!(out.bounds.y_min.is_finite(), "{curve:?}");
        assert!(out.bounds.y_max.is_finite(), "{curve:?}");
        assert!(out.bounds.y_min <= out.bounds.y_max);
    }
}

#[test]
fn test_buffer_lengths_match_width() {
    for (width, bytes) in [(NumericWidth::Float32, 4), (NumericWidth::Float64, 8)] {
        let out = run(123, 4, "tanh", width);
        let SeriesPayload::Binary(transfer) = out.payload else {
            panic!("float widths transfer binary buffers");
        };
        let series = transfer.into_inner();
        assert_eq!(series.lines.len(), 4);
        for buffer in std::iter::once(&series.x).chain(series.lines.iter()) {
            assert_eq!(buffer.len(), 123);
            assert_eq!(buffer.byte_len(), 123 * bytes);
        }
    }
}

#[test]
fn test_counts_are_clamped() {
    let out = run(3, 0, "step", NumericWidth::Float32);
    assert_eq!(out.length, 10);
    assert_eq!(out.line_count, 1);
}

#[test]
fn test_estimate_uses_clamped_points() {
    assert_eq!(
        estimated_bytes(MAX_POINTS, 1, NumericWidth::Float32),
        2 * MAX_POINTS as u64 * 4
    );
    let request = GenerationRequest::new(1, 10_000_001, 100, "sin", NumericWidth::Records);
    let err = generate(&request, 1, &AbortSignal::new()).unwrap_err();
    assert!(matches!(err, GenerationError::SizeLimit { limit, .. } if limit == MAX_OUTPUT_BYTES));
}

#[test]
fn test_records_decode_into_columns() {
    let out = run(15, 2, "gaussian", NumericWidth::Records);
    assert!(matches!(out.payload, SeriesPayload::Records(_)));
    let data = out.into_series_data().unwrap();
    assert_eq!(data.data.len(), 3);
    assert_eq!(data.x().and_then(|x| x.get(14)), Some(14.0));
    assert!(data.lines().iter().all(|l| matches!(l, NumericBuffer::F64(v) if v.len() == 15)));
}

#[test]
fn test_raised_abort_stops_generation() {
    let abort = AbortSignal::new();
    abort.raise();
    let request = GenerationRequest::new(1, 100, 1, "sin", NumericWidth::Float32);
    assert_eq!(
        generate(&request, 1, &abort).unwrap_err(),
        GenerationError::Aborted
    );
}

#[test]
fn test_success_header_shape() {
    let out = run(10, 1, "linear", NumericWidth::Float32);
    let json = serde_json::to_value(ResponseHeader::success(&out)).unwrap();
    assert_eq!(json["requestId"], 1);
    assert_eq!(json["success"], true);
    assert_eq!(json["length"], 10);
    assert_eq!(json["lineCount"], 1);
    assert_eq!(json["curveSelector"], "linear");
    assert_eq!(json["numericWidth"], "float32");
    assert_eq!(json["xMin"], 0.0);
    assert_eq!(json["xMax"], 9.0);
    assert!(json.get("error").is_none());
}
