//! Deterministic numeric series generation.
//!
//! [`generate`] runs inside an execution unit: it clamps the request,
//! enforces the output size cap before allocating anything, resolves the
//! curve once, precomputes per-line parameters, and fills one buffer per
//! series while tracking bounds. The only source of variation is the
//! [`Xorshift32`] seed, so identical seeds produce identical output.

pub mod curve;
pub mod output;
pub mod rng;

pub use curve::{Curve, LineParams};
pub use output::{
    BinarySeries, Bounds, GenerationOutput, NumericBuffer, NumericWidth, PointRecord,
    SeriesData, SeriesPayload, Transfer,
};
pub use rng::{seed_for, Xorshift32};

use output::RecordWriter;

use crate::core::error::GenerationError;
use crate::core::executor::AbortSignal;
use crate::core::message::GenerationRequest;

/// Smallest point count after clamping.
pub const MIN_POINTS: usize = 10;
/// Largest point count after clamping.
pub const MAX_POINTS: usize = 10_000_000;
/// Smallest line count after clamping.
pub const MIN_LINES: usize = 1;
/// Largest line count after clamping.
pub const MAX_LINES: usize = 1000;
/// Hard cap on the estimated output size.
pub const MAX_OUTPUT_BYTES: u64 = 512 * 1024 * 1024;

/// Points generated between abort checks.
const ABORT_CHECK_INTERVAL: usize = 4096;

/// Request parameters after clamping and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    /// Clamped point count.
    pub point_count: usize,
    /// Clamped line count.
    pub line_count: usize,
    /// Resolved curve.
    pub curve: Curve,
    /// Element encoding.
    pub numeric_width: NumericWidth,
    /// `(1 + lines) * points * bytes_per_element`.
    pub estimated_bytes: u64,
}

impl GenerationParams {
    /// Clamp counts, resolve the curve and apply the size guard.
    ///
    /// # Errors
    ///
    /// [`GenerationError::SizeLimit`] when the estimate exceeds
    /// [`MAX_OUTPUT_BYTES`].
    pub fn resolve(request: &GenerationRequest) -> Result<Self, GenerationError> {
        let point_count = request.point_count.clamp(MIN_POINTS, MAX_POINTS);
        let line_count = request.line_count.clamp(MIN_LINES, MAX_LINES);
        let estimated_bytes = estimated_bytes(point_count, line_count, request.numeric_width);
        if estimated_bytes > MAX_OUTPUT_BYTES {
            return Err(GenerationError::SizeLimit {
                estimated: estimated_bytes,
                limit: MAX_OUTPUT_BYTES,
            });
        }
        Ok(Self {
            point_count,
            line_count,
            curve: Curve::from_selector(&request.curve_selector),
            numeric_width: request.numeric_width,
            estimated_bytes,
        })
    }

    /// Per-line shaping for every line.
    #[must_use]
    pub fn line_params(&self) -> Vec<LineParams> {
        let separation = self.curve.separation();
        (0..self.line_count)
            .map(|li| LineParams::for_line(li, self.line_count, separation))
            .collect()
    }
}

/// Estimated output size: one `x` buffer plus one buffer per line.
#[must_use]
pub fn estimated_bytes(point_count: usize, line_count: usize, width: NumericWidth) -> u64 {
    let points = u64::try_from(point_count).unwrap_or(u64::MAX);
    let lines = u64::try_from(line_count).unwrap_or(u64::MAX);
    lines
        .saturating_add(1)
        .saturating_mul(points)
        .saturating_mul(width.bytes_per_element())
}

/// Generate the series for `request` from `seed`.
///
/// # Errors
///
/// * [`GenerationError::SizeLimit`] before any allocation if the output
///   would exceed the cap;
/// * [`GenerationError::Aborted`] if `abort` is raised mid-run;
/// * [`GenerationError::Encode`] if records cannot be serialized.
pub fn generate(
    request: &GenerationRequest,
    seed: u32,
    abort: &AbortSignal,
) -> Result<GenerationOutput, GenerationError> {
    let params = GenerationParams::resolve(request)?;
    let lines = params.line_params();
    let mut rng = Xorshift32::new(seed);

    let (payload, bounds) = match params.numeric_width {
        NumericWidth::Float32 => {
            let mut columns = Columns::<f32>::with_capacity(params.point_count, lines.len());
            let bounds = fill(&params, &lines, &mut rng, abort, &mut columns)?;
            (SeriesPayload::Binary(Transfer::new(columns.into_series())), bounds)
        }
        NumericWidth::Float64 => {
            let mut columns = Columns::<f64>::with_capacity(params.point_count, lines.len());
            let bounds = fill(&params, &lines, &mut rng, abort, &mut columns)?;
            (SeriesPayload::Binary(Transfer::new(columns.into_series())), bounds)
        }
        NumericWidth::Records => {
            let mut writer = RecordWriter::new(params.estimated_bytes, MAX_OUTPUT_BYTES);
            let bounds = fill(&params, &lines, &mut rng, abort, &mut writer)?;
            (SeriesPayload::Records(writer.finish()?), bounds)
        }
    };

    Ok(GenerationOutput {
        request_id: request.request_id,
        length: params.point_count,
        line_count: params.line_count,
        curve: params.curve,
        numeric_width: params.numeric_width,
        payload,
        bounds,
    })
}

trait Element: Copy {
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl Element for f32 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(v: f64) -> Self {
        v as Self
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl Element for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }

    fn to_f64(self) -> f64 {
        self
    }
}

/// Destination for generated points.
trait RowSink {
    /// Store one point. `ys` holds the line values as computed and is
    /// overwritten with the values actually stored.
    fn push_row(&mut self, x: f64, ys: &mut [f64]) -> Result<(), GenerationError>;
}

struct Columns<T> {
    x: Vec<T>,
    lines: Vec<Vec<T>>,
}

impl<T: Element> Columns<T> {
    fn with_capacity(points: usize, lines: usize) -> Self {
        Self {
            x: Vec::with_capacity(points),
            lines: (0..lines).map(|_| Vec::with_capacity(points)).collect(),
        }
    }
}

impl Columns<f32> {
    fn into_series(self) -> BinarySeries {
        BinarySeries {
            x: NumericBuffer::F32(self.x),
            lines: self.lines.into_iter().map(NumericBuffer::F32).collect(),
        }
    }
}

impl Columns<f64> {
    fn into_series(self) -> BinarySeries {
        BinarySeries {
            x: NumericBuffer::F64(self.x),
            lines: self.lines.into_iter().map(NumericBuffer::F64).collect(),
        }
    }
}

impl<T: Element> RowSink for Columns<T> {
    fn push_row(&mut self, x: f64, ys: &mut [f64]) -> Result<(), GenerationError> {
        self.x.push(T::from_f64(x));
        for (column, v) in self.lines.iter_mut().zip(ys.iter_mut()) {
            let stored = T::from_f64(*v);
            column.push(stored);
            *v = stored.to_f64();
        }
        Ok(())
    }
}

impl RowSink for RecordWriter {
    fn push_row(&mut self, x: f64, ys: &mut [f64]) -> Result<(), GenerationError> {
        self.push(x, ys)
    }
}

#[allow(clippy::cast_precision_loss)]
fn fill<S: RowSink>(
    params: &GenerationParams,
    lines: &[LineParams],
    rng: &mut Xorshift32,
    abort: &AbortSignal,
    sink: &mut S,
) -> Result<Bounds, GenerationError> {
    let n = params.point_count;
    let last = (n - 1) as f64;
    let mut walks = vec![0.0_f64; lines.len()];
    let mut row = vec![0.0_f64; lines.len()];
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for i in 0..n {
        if i % ABORT_CHECK_INTERVAL == 0 && abort.is_raised() {
            return Err(GenerationError::Aborted);
        }
        let xi = i as f64;
        let t = xi / last;
        for ((line, value), walk) in lines.iter().zip(row.iter_mut()).zip(walks.iter_mut()) {
            let noise = rng.centered();
            *value = line.apply(params.curve.sample(line.position(t), noise, walk));
        }
        // bounds follow the stored values, which may be narrower than f64
        sink.push_row(xi, &mut row)?;
        for &v in &row {
            y_min = y_min.min(v);
            y_max = y_max.max(v);
        }
    }

    Ok(Bounds {
        x_min: 0.0,
        x_max: last,
        y_min,
        y_max,
    })
}
