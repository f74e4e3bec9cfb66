//! Envelope decoding and routing
//!
//! Every classified envelope maps to exactly one handler.

use beamplot_shared::{MessageEnvelope, MsgType, PlotMessage, PlotResult};
use std::fmt;

/// Handler an envelope is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Status,
    LineData,
    ImageData,
    ScatterData,
    SurfaceData,
    TableData,
    SelectionNew,
    SelectionAppend,
    SelectionClear,
    ClearPlot,
    Baton,
}

impl Route {
    pub fn for_kind(kind: MsgType) -> Route {
        match kind {
            MsgType::Status => Route::Status,
            MsgType::NewMultilineData | MsgType::AppendLineData => Route::LineData,
            MsgType::NewImageData => Route::ImageData,
            MsgType::NewScatterData => Route::ScatterData,
            MsgType::NewSurfaceData => Route::SurfaceData,
            MsgType::NewTableData => Route::TableData,
            MsgType::NewSelectionData => Route::SelectionNew,
            MsgType::AppendSelectionData | MsgType::ClientNewSelection => Route::SelectionAppend,
            MsgType::ClearSelectionData => Route::SelectionClear,
            MsgType::ClearData => Route::ClearPlot,
            MsgType::Baton | MsgType::BatonRequest => Route::Baton,
        }
    }

    /// Whether an accepted message on this route is acknowledged with a
    /// ready status
    pub fn acknowledges(&self) -> bool {
        !matches!(self, Route::Status | Route::Baton)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Route::Status => "status",
            Route::LineData => "line-data",
            Route::ImageData => "image-data",
            Route::ScatterData => "scatter-data",
            Route::SurfaceData => "surface-data",
            Route::TableData => "table-data",
            Route::SelectionNew => "selection-new",
            Route::SelectionAppend => "selection-append",
            Route::SelectionClear => "selection-clear",
            Route::ClearPlot => "clear-plot",
            Route::Baton => "baton",
        };
        f.write_str(name)
    }
}

/// Parse and classify one JSON envelope
pub fn decode_envelope(bytes: &[u8]) -> PlotResult<MessageEnvelope> {
    PlotMessage::from_json(bytes)?.classify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamplot_shared::PlotError;

    #[test]
    fn test_every_handler_is_reachable() {
        let routes: std::collections::HashSet<Route> =
            MsgType::ALL.iter().map(|k| Route::for_kind(*k)).collect();
        assert_eq!(routes.len(), 11);
        assert_eq!(Route::for_kind(MsgType::AppendLineData), Route::LineData);
        assert!(!Route::Status.acknowledges());
        assert!(Route::ClearPlot.acknowledges());
    }

    #[test]
    fn test_decode_envelope_errors() {
        let err = decode_envelope(br#"{"plot_id": "p0", "type": "wobble", "params": {}}"#).unwrap_err();
        assert_eq!(
            err,
            PlotError::UnrecognizedMessageKind {
                kind: "wobble".to_string()
            }
        );

        let err = decode_envelope(b"not json").unwrap_err();
        assert!(matches!(err, PlotError::Codec { .. }));
    }

    #[test]
    fn test_decode_envelope() {
        let envelope = decode_envelope(br#"{"plot_id": "p3", "type": "clear_data"}"#).unwrap();
        assert_eq!(envelope.plot_id, "p3");
        assert_eq!(Route::for_kind(envelope.kind()), Route::ClearPlot);
    }
}
