//! Messages exchanged between the coordinator and execution units.

use serde::{Deserialize, Serialize};

use crate::core::error::GenerationError;
use crate::core::generation::{Bounds, Curve, GenerationOutput, NumericWidth};

/// Monotonic request identifier, unique per scheduler.
pub type RequestId = u64;

/// Execution unit identifier, unique per scheduler.
pub type UnitId = u64;

/// A generation request. Immutable once created; it is also the message a
/// unit receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Scheduler-assigned id.
    pub request_id: RequestId,
    /// Requested points per series (clamped by the generator).
    pub point_count: usize,
    /// Requested number of lines (clamped by the generator).
    pub line_count: usize,
    /// Curve name; unknown names fall back to `sin`.
    pub curve_selector: String,
    /// Element encoding.
    pub numeric_width: NumericWidth,
}

impl GenerationRequest {
    /// Build a request.
    pub fn new(
        request_id: RequestId,
        point_count: usize,
        line_count: usize,
        curve_selector: impl Into<String>,
        numeric_width: NumericWidth,
    ) -> Self {
        Self {
            request_id,
            point_count,
            line_count,
            curve_selector: curve_selector.into(),
            numeric_width,
        }
    }
}

/// Outbound event from a unit to the coordinator.
#[derive(Debug)]
pub enum UnitEvent {
    /// Generation succeeded; buffers move with the event.
    Completed {
        /// Reporting unit.
        unit_id: UnitId,
        /// Generated output.
        output: GenerationOutput,
    },
    /// Generation failed; the unit remains usable.
    Failed {
        /// Reporting unit.
        unit_id: UnitId,
        /// Request that failed.
        request_id: RequestId,
        /// Failure reason.
        error: GenerationError,
    },
    /// The unit died and will not accept further work.
    Crashed {
        /// Unit that died.
        unit_id: UnitId,
        /// Request it was running, if any.
        request_id: Option<RequestId>,
        /// Panic message or failure description.
        reason: String,
    },
}

impl UnitEvent {
    /// Unit that emitted the event.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        match self {
            Self::Completed { unit_id, .. }
            | Self::Failed { unit_id, .. }
            | Self::Crashed { unit_id, .. } => *unit_id,
        }
    }

    /// Serializable response summary, if the event answers a request.
    #[must_use]
    pub fn header(&self) -> Option<ResponseHeader> {
        match self {
            Self::Completed { output, .. } => Some(ResponseHeader::success(output)),
            Self::Failed {
                request_id, error, ..
            } => Some(ResponseHeader::failure(*request_id, error.to_string())),
            Self::Crashed {
                request_id, reason, ..
            } => request_id.map(|id| ResponseHeader::failure(id, reason.clone())),
        }
    }
}

/// Response metadata without the buffers themselves.
///
/// Success:
/// `{requestId, success: true, length, lineCount, curveSelector, numericWidth, xMin, xMax, yMin, yMax}`;
/// failure: `{requestId, success: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    /// Request answered.
    pub request_id: RequestId,
    /// Whether generation succeeded.
    pub success: bool,
    /// Points per series.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// Lines generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_count: Option<usize>,
    /// Curve generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve_selector: Option<Curve>,
    /// Element encoding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_width: Option<NumericWidth>,
    /// Scalar bounds, flattened into the header.
    #[serde(flatten)]
    pub bounds: Option<Bounds>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseHeader {
    /// Header for a successful output.
    #[must_use]
    pub fn success(output: &GenerationOutput) -> Self {
        Self {
            request_id: output.request_id,
            success: true,
            length: Some(output.length),
            line_count: Some(output.line_count),
            curve_selector: Some(output.curve),
            numeric_width: Some(output.numeric_width),
            bounds: Some(output.bounds),
            error: None,
        }
    }

    /// Header for a failure.
    #[must_use]
    pub fn failure(request_id: RequestId, error: String) -> Self {
        Self {
            request_id,
            success: false,
            length: None,
            line_count: None,
            curve_selector: None,
            numeric_width: None,
            bounds: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_on_the_wire() {
        let request = GenerationRequest::new(3, 100, 2, "linear", NumericWidth::Float64);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requestId": 3,
                "pointCount": 100,
                "lineCount": 2,
                "curveSelector": "linear",
                "numericWidth": "float64"
            })
        );
        let back: GenerationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn failure_header_shape() {
        let event = UnitEvent::Failed {
            unit_id: 1,
            request_id: 4,
            error: GenerationError::Aborted,
        };
        let json = serde_json::to_value(event.header().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"requestId": 4, "success": false, "error": "generation aborted"})
        );
    }

    #[test]
    fn crash_without_request_has_no_header() {
        let event = UnitEvent::Crashed {
            unit_id: 2,
            request_id: None,
            reason: "runtime".into(),
        };
        assert_eq!(event.unit_id(), 2);
        assert!(event.header().is_none());
    }
}
