//! Shared types for beamplot
//!
//! This crate holds the wire data model exchanged between the plot server and
//! the browser client: array payloads, plot messages, axes and table
//! parameters, selection descriptors and their geometry, and the error types
//! used by the decoding and session crates.

pub mod errors;
pub mod geometry;
pub mod messages;
pub mod ndarray;
pub mod parameters;
pub mod selections;

pub use errors::{DecodeError, ErrorResponse, PlotError, PlotResult};
pub use messages::{
    BatonApprovalMessage, BatonMessage, BatonRequestMessage, ClientMessage, LineParameters,
    MessageEnvelope, MessagePayload, MsgType, PlotMessage, StatusType,
};
pub use ndarray::{ByteOrder, DType, ElementType, NativeElement, RawArrayPayload};
pub use parameters::{
    Aspect, AspectKind, AxesParameters, Domain, ScaleType, TableDisplayParams, TableDisplayType,
};
pub use selections::{
    Axis, Point2, SelectionDescriptor, SelectionKind, SelectionShape, SelectionStyle, StyleUpdate,
};
