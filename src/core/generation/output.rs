//! Result buffers, the ownership-transfer wrapper, and caller-facing series.

use serde::{Deserialize, Serialize};

use super::curve::Curve;
use crate::core::error::GenerationError;
use crate::core::message::RequestId;

/// Element encoding of the generated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumericWidth {
    /// Contiguous `f32` buffers.
    #[default]
    Float32,
    /// Contiguous `f64` buffers.
    Float64,
    /// Serialized per-point records (a copy, not a transfer).
    #[serde(alias = "array")]
    Records,
}

impl NumericWidth {
    /// Bytes per element used for buffer sizing and the size guard.
    #[must_use]
    pub const fn bytes_per_element(self) -> u64 {
        match self {
            Self::Float32 => 4,
            Self::Float64 | Self::Records => 8,
        }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Records => "records",
        }
    }
}

/// One contiguous numeric column.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericBuffer {
    /// 32-bit floats.
    F32(Vec<f32>),
    /// 64-bit floats.
    F64(Vec<f64>),
}

impl NumericBuffer {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Whether the buffer has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of one element in bytes.
    #[must_use]
    pub const fn element_bytes(&self) -> usize {
        match self {
            Self::F32(_) => std::mem::size_of::<f32>(),
            Self::F64(_) => std::mem::size_of::<f64>(),
        }
    }

    /// Payload size in bytes (`len * element_bytes`).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.len() * self.element_bytes()
    }

    /// Element `i` widened to `f64`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<f64> {
        match self {
            Self::F32(v) => v.get(i).copied().map(f64::from),
            Self::F64(v) => v.get(i).copied(),
        }
    }

    /// All elements widened to `f64`.
    #[must_use]
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::F32(v) => v.iter().copied().map(f64::from).collect(),
            Self::F64(v) => v.clone(),
        }
    }
}

/// Move-only handoff of a payload from a unit to the coordinator.
///
/// There is no `Clone`; sending a `Transfer` through a channel moves it, so
/// the producing side holds no handle afterwards. The consumer unwraps it
/// exactly once with [`Transfer::into_inner`].
#[derive(Debug)]
#[must_use = "a transfer carries the only handle to its payload"]
pub struct Transfer<T>(T);

impl<T> Transfer<T> {
    /// Wrap a payload for handoff.
    pub const fn new(payload: T) -> Self {
        Self(payload)
    }

    /// Borrow the payload without taking it.
    pub const fn get(&self) -> &T {
        &self.0
    }

    /// Take ownership of the payload.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// The `x` column plus one column per line.
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySeries {
    /// Point indices.
    pub x: NumericBuffer,
    /// One column per line.
    pub lines: Vec<NumericBuffer>,
}

/// Generated data as produced by a unit.
#[derive(Debug)]
pub enum SeriesPayload {
    /// Fixed-width buffers handed over by move.
    Binary(Transfer<BinarySeries>),
    /// JSON array of [`PointRecord`]s.
    Records(Vec<u8>),
}

/// One structured record: the point index and each line's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    /// Point index.
    pub x: f64,
    /// One value per line.
    pub y: Vec<f64>,
}

/// Scalar bounds of a generated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Smallest `x` (always 0).
    pub x_min: f64,
    /// Largest `x` (`point_count - 1`).
    pub x_max: f64,
    /// Smallest generated value.
    pub y_min: f64,
    /// Largest generated value.
    pub y_max: f64,
}

/// Successful generation as reported by a unit.
#[derive(Debug)]
pub struct GenerationOutput {
    /// Request this output answers.
    pub request_id: RequestId,
    /// Points per series after clamping.
    pub length: usize,
    /// Lines after clamping.
    pub line_count: usize,
    /// Resolved curve.
    pub curve: Curve,
    /// Element encoding.
    pub numeric_width: NumericWidth,
    /// Generated data.
    pub payload: SeriesPayload,
    /// Scalar bounds.
    pub bounds: Bounds,
}

impl GenerationOutput {
    /// Unwrap into the caller-facing `[x, y0, y1, ...]` layout. Binary
    /// payloads are moved; records are decoded into `F64` columns.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Encode`] if records are malformed.
    pub fn into_series_data(self) -> Result<SeriesData, GenerationError> {
        let data = match self.payload {
            SeriesPayload::Binary(transfer) => {
                let BinarySeries { x, lines } = transfer.into_inner();
                let mut data = Vec::with_capacity(lines.len() + 1);
                data.push(x);
                data.extend(lines);
                data
            }
            SeriesPayload::Records(bytes) => decode_records(&bytes, self.line_count)?,
        };
        Ok(SeriesData {
            request_id: self.request_id,
            curve: self.curve,
            numeric_width: self.numeric_width,
            data,
            bounds: self.bounds,
        })
    }
}

/// Resolved value of a `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesData {
    /// Request id assigned by the scheduler.
    pub request_id: RequestId,
    /// Curve actually generated (after fallback).
    pub curve: Curve,
    /// Element encoding that was requested.
    pub numeric_width: NumericWidth,
    /// `[x, y0, y1, ...]`.
    pub data: Vec<NumericBuffer>,
    /// Scalar bounds.
    pub bounds: Bounds,
}

impl SeriesData {
    /// The `x` column.
    #[must_use]
    pub fn x(&self) -> Option<&NumericBuffer> {
        self.data.first()
    }

    /// The `y` columns.
    #[must_use]
    pub fn lines(&self) -> &[NumericBuffer] {
        self.data.get(1..).unwrap_or_default()
    }
}

#[derive(Serialize)]
struct RecordRef<'a> {
    x: f64,
    y: &'a [f64],
}

/// Streams points into a JSON array of [`PointRecord`]s without keeping
/// the columns around. The encoded length never exceeds `limit`, and the
/// buffer's capacity never grows past it.
#[derive(Debug)]
pub(crate) struct RecordWriter {
    out: Vec<u8>,
    row: Vec<u8>,
    limit: usize,
}

impl RecordWriter {
    /// Writer with room for `capacity_hint` bytes, bounded by `limit`.
    pub(crate) fn new(capacity_hint: u64, limit: u64) -> Self {
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let hint = usize::try_from(capacity_hint).unwrap_or(usize::MAX).min(limit);
        let mut out = Vec::with_capacity(hint.max(1));
        out.push(b'[');
        Self {
            out,
            row: Vec::new(),
            limit,
        }
    }

    /// Append one record.
    pub(crate) fn push(&mut self, x: f64, y: &[f64]) -> Result<(), GenerationError> {
        self.row.clear();
        if self.out.len() > 1 {
            self.row.push(b',');
        }
        serde_json::to_writer(&mut self.row, &RecordRef { x, y })
            .map_err(|e| GenerationError::Encode(e.to_string()))?;
        self.append_row()
    }

    /// Close the array and hand over the bytes.
    pub(crate) fn finish(mut self) -> Result<Vec<u8>, GenerationError> {
        self.row.clear();
        self.row.push(b']');
        self.append_row()?;
        Ok(self.out)
    }

    fn append_row(&mut self) -> Result<(), GenerationError> {
        let needed = self.out.len().saturating_add(self.row.len());
        if needed > self.limit {
            return Err(GenerationError::SizeLimit {
                estimated: u64::try_from(needed).unwrap_or(u64::MAX),
                limit: u64::try_from(self.limit).unwrap_or(u64::MAX),
            });
        }
        if needed > self.out.capacity() {
            let target = needed
                .max(self.out.capacity().saturating_mul(2))
                .min(self.limit);
            self.out.reserve_exact(target - self.out.len());
        }
        self.out.extend_from_slice(&self.row);
        Ok(())
    }
}

fn decode_records(bytes: &[u8], line_count: usize) -> Result<Vec<NumericBuffer>, GenerationError> {
    let records: Vec<PointRecord> =
        serde_json::from_slice(bytes).map_err(|e| GenerationError::Encode(e.to_string()))?;
    let mut x = Vec::with_capacity(records.len());
    let mut lines: Vec<Vec<f64>> = (0..line_count)
        .map(|_| Vec::with_capacity(records.len()))
        .collect();
    for record in records {
        if record.y.len() != line_count {
            return Err(GenerationError::Encode(format!(
                "record at x={} has {} values, expected {line_count}",
                record.x,
                record.y.len()
            )));
        }
        x.push(record.x);
        for (line, value) in lines.iter_mut().zip(record.y) {
            line.push(value);
        }
    }
    let mut data = Vec::with_capacity(line_count + 1);
    data.push(NumericBuffer::F64(x));
    data.extend(lines.into_iter().map(NumericBuffer::F64));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds {
            x_min: 0.0,
            x_max: 1.0,
            y_min: -1.0,
            y_max: 2.0,
        }
    }

    #[test]
    fn width_wire_names() {
        assert_eq!(serde_json::to_string(&NumericWidth::Float32).unwrap(), "\"float32\"");
        assert_eq!(serde_json::to_string(&NumericWidth::Records).unwrap(), "\"records\"");
        let alias: NumericWidth = serde_json::from_str("\"array\"").unwrap();
        assert_eq!(alias, NumericWidth::Records);
    }

    #[test]
    fn buffer_byte_lengths() {
        let a = NumericBuffer::F32(vec![0.0; 10]);
        let b = NumericBuffer::F64(vec![0.0; 10]);
        assert_eq!(a.byte_len(), 40);
        assert_eq!(b.byte_len(), 80);
        assert_eq!(a.get(3), Some(0.0));
        assert_eq!(b.get(10), None);
    }

    #[test]
    fn binary_payload_moves_into_series_data() {
        let output = GenerationOutput {
            request_id: 9,
            length: 2,
            line_count: 1,
            curve: Curve::Linear,
            numeric_width: NumericWidth::Float32,
            payload: SeriesPayload::Binary(Transfer::new(BinarySeries {
                x: NumericBuffer::F32(vec![0.0, 1.0]),
                lines: vec![NumericBuffer::F32(vec![-1.0, 2.0])],
            })),
            bounds: bounds(),
        };
        let data = output.into_series_data().unwrap();
        assert_eq!(data.request_id, 9);
        assert_eq!(data.x(), Some(&NumericBuffer::F32(vec![0.0, 1.0])));
        assert_eq!(data.lines(), &[NumericBuffer::F32(vec![-1.0, 2.0])]);
    }

    fn encode(x: &[f64], lines: &[&[f64]], limit: u64) -> Result<Vec<u8>, GenerationError> {
        let mut writer = RecordWriter::new(0, limit);
        for (i, &xi) in x.iter().enumerate() {
            let row: Vec<f64> = lines.iter().map(|line| line[i]).collect();
            writer.push(xi, &row)?;
        }
        writer.finish()
    }

    #[test]
    fn records_decode_into_columns() {
        let bytes = encode(&[0.0, 1.0], &[&[1.5, 2.5][..], &[-1.0, -2.0][..]], 1024).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text, r#"[{"x":0.0,"y":[1.5,-1.0]},{"x":1.0,"y":[2.5,-2.0]}]"#);

        let output = GenerationOutput {
            request_id: 1,
            length: 2,
            line_count: 2,
            curve: Curve::Sin,
            numeric_width: NumericWidth::Records,
            payload: SeriesPayload::Records(bytes),
            bounds: bounds(),
        };
        let data = output.into_series_data().unwrap();
        assert_eq!(data.data.len(), 3);
        assert_eq!(data.lines()[1], NumericBuffer::F64(vec![-1.0, -2.0]));
    }

    #[test]
    fn empty_record_array() {
        assert_eq!(encode(&[], &[], 2).unwrap(), b"[]");
    }

    #[test]
    fn record_writer_enforces_encoded_limit() {
        let x: Vec<f64> = (0..100).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 0.123_456_789).collect();
        let full = encode(&x, &[y.as_slice()], u64::MAX).unwrap();
        let len = u64::try_from(full.len()).unwrap();

        // exactly at the limit is accepted
        assert_eq!(encode(&x, &[y.as_slice()], len).unwrap(), full);
        let err = encode(&x, &[y.as_slice()], len - 1).unwrap_err();
        assert_eq!(
            err,
            GenerationError::SizeLimit {
                estimated: len,
                limit: len - 1
            }
        );
        assert!(matches!(
            encode(&x, &[y.as_slice()], 64),
            Err(GenerationError::SizeLimit { limit: 64, .. })
        ));
    }

    #[test]
    fn record_writer_capacity_stays_within_limit() {
        let mut writer = RecordWriter::new(8, 4096);
        for i in 0..200 {
            match writer.push(f64::from(i), &[1.0, 2.0]) {
                Ok(()) => assert!(writer.out.capacity() <= 4096),
                Err(GenerationError::SizeLimit { .. }) => return,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        panic!("limit was never reached");
    }

    #[test]
    fn malformed_records_are_rejected() {
        let err = decode_records(br#"[{"x":0.0,"y":[1.0]}]"#, 2).unwrap_err();
        assert!(matches!(err, GenerationError::Encode(_)));
    }
}
