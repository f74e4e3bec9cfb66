//! Plot messages exchanged with the plot server
//!
//! Inbound messages arrive as a [`PlotMessage`] envelope
//! `{ plot_id, type, params, plot_config }` and are classified into a
//! [`MessageEnvelope`] whose payload is a closed sum type. Outbound traffic
//! is a [`ClientMessage`].

use crate::errors::{PlotError, PlotResult};
use crate::ndarray::RawArrayPayload;
use crate::parameters::{Aspect, AxesParameters, Domain, ScaleType, TableDisplayParams};
use crate::selections::SelectionDescriptor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of inbound message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgType {
    Status,
    NewMultilineData,
    AppendLineData,
    NewImageData,
    NewScatterData,
    NewSurfaceData,
    NewTableData,
    NewSelectionData,
    AppendSelectionData,
    ClearSelectionData,
    ClearData,
    ClientNewSelection,
    Baton,
    BatonRequest,
}

impl MsgType {
    pub const ALL: [MsgType; 14] = [
        MsgType::Status,
        MsgType::NewMultilineData,
        MsgType::AppendLineData,
        MsgType::NewImageData,
        MsgType::NewScatterData,
        MsgType::NewSurfaceData,
        MsgType::NewTableData,
        MsgType::NewSelectionData,
        MsgType::AppendSelectionData,
        MsgType::ClearSelectionData,
        MsgType::ClearData,
        MsgType::ClientNewSelection,
        MsgType::Baton,
        MsgType::BatonRequest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MsgType::Status => "status",
            MsgType::NewMultilineData => "new_multiline_data",
            MsgType::AppendLineData => "append_line_data",
            MsgType::NewImageData => "new_image_data",
            MsgType::NewScatterData => "new_scatter_data",
            MsgType::NewSurfaceData => "new_surface_data",
            MsgType::NewTableData => "new_table_data",
            MsgType::NewSelectionData => "new_selection_data",
            MsgType::AppendSelectionData => "append_selection_data",
            MsgType::ClearSelectionData => "clear_selection_data",
            MsgType::ClearData => "clear_data",
            MsgType::ClientNewSelection => "client_new_selection",
            MsgType::Baton => "baton",
            MsgType::BatonRequest => "baton_request",
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MsgType {
    type Err = PlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MsgType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PlotError::UnrecognizedMessageKind {
                kind: s.to_string(),
            })
    }
}

/// Plot server readiness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    #[default]
    Ready,
    Busy,
    Closing,
}

impl StatusType {
    /// Whether new local selections may be committed
    pub fn accepts_selections(&self) -> bool {
        matches!(self, StatusType::Ready)
    }
}

/// Status params may be a bare value or `{ "status": value }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StatusParams {
    Bare(StatusType),
    Object { status: StatusType },
}

impl From<StatusParams> for StatusType {
    fn from(params: StatusParams) -> Self {
        match params {
            StatusParams::Bare(status) | StatusParams::Object { status } => status,
        }
    }
}

fn default_line_on() -> bool {
    true
}

/// One line of a multi-line plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    pub key: String,
    /// Missing or empty x means default indices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<RawArrayPayload>,
    pub y: RawArrayPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(default = "default_line_on")]
    pub line_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_indices: Option<bool>,
}

/// Image data; heatmap fields are present together or not at all
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageData {
    pub key: String,
    pub values: RawArrayPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<Aspect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heatmap_scale: Option<ScaleType>,
    #[serde(default, rename = "colourMap", skip_serializing_if = "Option::is_none")]
    pub colour_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterData {
    pub key: String,
    #[serde(rename = "xData")]
    pub x_data: RawArrayPayload,
    #[serde(rename = "yData")]
    pub y_data: RawArrayPayload,
    #[serde(rename = "dataArray")]
    pub data_array: RawArrayPayload,
    pub domain: Domain,
    #[serde(default, rename = "colourMap", skip_serializing_if = "Option::is_none")]
    pub colour_map: Option<String>,
    #[serde(default, rename = "pointSize", skip_serializing_if = "Option::is_none")]
    pub point_size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceData {
    pub key: String,
    pub values: RawArrayPayload,
    pub domain: Domain,
    #[serde(default)]
    pub surface_scale: ScaleType,
    #[serde(default, rename = "colourMap", skip_serializing_if = "Option::is_none")]
    pub colour_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub key: String,
    #[serde(rename = "dataArray")]
    pub data_array: RawArrayPayload,
    #[serde(rename = "cellWidth")]
    pub cell_width: f64,
    #[serde(default, rename = "displayParams", skip_serializing_if = "Option::is_none")]
    pub display_params: Option<TableDisplayParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLineDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub ml_data: Vec<LineData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendLineDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub al_data: Vec<LineData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub im_data: ImageData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub sc_data: ScatterData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub su_data: SurfaceData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDataMessage {
    #[serde(default)]
    pub axes_parameters: AxesParameters,
    pub ta_data: TableData,
}

/// Replace the plot's selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionsMessage {
    pub set_selections: Vec<SelectionDescriptor>,
}

/// Add or update selections by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendSelectionsMessage {
    pub append_selections: Vec<SelectionDescriptor>,
}

/// Remove selections by id; an empty list removes all
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearSelectionsMessage {
    #[serde(default)]
    pub selection_ids: Vec<String>,
}

/// A selection made by another client, relayed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSelectionMessage {
    pub selection: SelectionDescriptor,
}

/// Current baton holder and all connected clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatonMessage {
    pub baton: Option<String>,
    pub uuids: Vec<String>,
    /// Transfer generation; bumped by the arbiter on every hand-over
    #[serde(default)]
    pub epoch: u64,
}

/// Request for the baton, tagged with the generation it was made in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatonRequestMessage {
    pub requester: String,
    #[serde(default)]
    pub epoch: u64,
}

/// Holder's hand-over of the baton to `receiver`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatonApprovalMessage {
    pub receiver: String,
    pub epoch: u64,
}

/// Line presentation that clients may change and broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    pub line_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_size: Option<u32>,
}

/// Envelope as received from the connection; kind not yet validated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotMessage {
    pub plot_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_config: Option<AxesParameters>,
}

impl PlotMessage {
    pub fn new(plot_id: impl Into<String>, kind: MsgType, params: impl Serialize) -> PlotResult<Self> {
        Ok(Self {
            plot_id: plot_id.into(),
            kind: kind.as_str().to_string(),
            params: serde_json::to_value(params)?,
            plot_config: None,
        })
    }

    pub fn from_json(bytes: &[u8]) -> PlotResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> PlotResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate the kind and parse the kind-specific params
    ///
    /// A `plot_config` on a data message replaces the message's own axes
    /// parameters.
    pub fn classify(self) -> PlotResult<MessageEnvelope> {
        let kind: MsgType = self.kind.parse()?;
        let params = self.params;

        fn parse<T: DeserializeOwned>(kind: MsgType, params: serde_json::Value) -> PlotResult<T> {
            serde_json::from_value(params)
                .map_err(|e| PlotError::invalid_payload(kind.as_str(), e.to_string()))
        }

        let mut payload = match kind {
            MsgType::Status => {
                MessagePayload::Status(parse::<StatusParams>(kind, params)?.into())
            }
            MsgType::NewMultilineData => MessagePayload::MultiLine(parse(kind, params)?),
            MsgType::AppendLineData => MessagePayload::AppendLine(parse(kind, params)?),
            MsgType::NewImageData => MessagePayload::Image(parse(kind, params)?),
            MsgType::NewScatterData => MessagePayload::Scatter(parse(kind, params)?),
            MsgType::NewSurfaceData => MessagePayload::Surface(parse(kind, params)?),
            MsgType::NewTableData => MessagePayload::Table(parse(kind, params)?),
            MsgType::NewSelectionData => MessagePayload::SetSelections(parse(kind, params)?),
            MsgType::AppendSelectionData => {
                MessagePayload::AppendSelections(parse(kind, params)?)
            }
            MsgType::ClearSelectionData => {
                if params.is_null() {
                    MessagePayload::ClearSelections(ClearSelectionsMessage::default())
                } else {
                    MessagePayload::ClearSelections(parse(kind, params)?)
                }
            }
            MsgType::ClearData => MessagePayload::ClearData,
            MsgType::ClientNewSelection => MessagePayload::ClientSelection(parse(kind, params)?),
            MsgType::Baton => MessagePayload::Baton(parse(kind, params)?),
            MsgType::BatonRequest => MessagePayload::BatonRequest(parse(kind, params)?),
        };

        if let Some(config) = self.plot_config {
            if let Some(axes) = payload.axes_parameters_mut() {
                *axes = config;
            }
        }

        Ok(MessageEnvelope {
            plot_id: self.plot_id,
            payload,
        })
    }
}

/// Kind-specific payload of a classified message
#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Status(StatusType),
    MultiLine(MultiLineDataMessage),
    AppendLine(AppendLineDataMessage),
    Image(ImageDataMessage),
    Scatter(ScatterDataMessage),
    Surface(SurfaceDataMessage),
    Table(TableDataMessage),
    SetSelections(SelectionsMessage),
    AppendSelections(AppendSelectionsMessage),
    ClearSelections(ClearSelectionsMessage),
    ClearData,
    ClientSelection(ClientSelectionMessage),
    Baton(BatonMessage),
    BatonRequest(BatonRequestMessage),
}

impl MessagePayload {
    pub fn kind(&self) -> MsgType {
        match self {
            MessagePayload::Status(_) => MsgType::Status,
            MessagePayload::MultiLine(_) => MsgType::NewMultilineData,
            MessagePayload::AppendLine(_) => MsgType::AppendLineData,
            MessagePayload::Image(_) => MsgType::NewImageData,
            MessagePayload::Scatter(_) => MsgType::NewScatterData,
            MessagePayload::Surface(_) => MsgType::NewSurfaceData,
            MessagePayload::Table(_) => MsgType::NewTableData,
            MessagePayload::SetSelections(_) => MsgType::NewSelectionData,
            MessagePayload::AppendSelections(_) => MsgType::AppendSelectionData,
            MessagePayload::ClearSelections(_) => MsgType::ClearSelectionData,
            MessagePayload::ClearData => MsgType::ClearData,
            MessagePayload::ClientSelection(_) => MsgType::ClientNewSelection,
            MessagePayload::Baton(_) => MsgType::Baton,
            MessagePayload::BatonRequest(_) => MsgType::BatonRequest,
        }
    }

    fn axes_parameters_mut(&mut self) -> Option<&mut AxesParameters> {
        match self {
            MessagePayload::MultiLine(m) => Some(&mut m.axes_parameters),
            MessagePayload::AppendLine(m) => Some(&mut m.axes_parameters),
            MessagePayload::Image(m) => Some(&mut m.axes_parameters),
            MessagePayload::Scatter(m) => Some(&mut m.axes_parameters),
            MessagePayload::Surface(m) => Some(&mut m.axes_parameters),
            MessagePayload::Table(m) => Some(&mut m.axes_parameters),
            _ => None,
        }
    }

    fn params(&self) -> PlotResult<serde_json::Value> {
        let value = match self {
            MessagePayload::Status(status) => serde_json::json!({ "status": status }),
            MessagePayload::MultiLine(m) => serde_json::to_value(m)?,
            MessagePayload::AppendLine(m) => serde_json::to_value(m)?,
            MessagePayload::Image(m) => serde_json::to_value(m)?,
            MessagePayload::Scatter(m) => serde_json::to_value(m)?,
            MessagePayload::Surface(m) => serde_json::to_value(m)?,
            MessagePayload::Table(m) => serde_json::to_value(m)?,
            MessagePayload::SetSelections(m) => serde_json::to_value(m)?,
            MessagePayload::AppendSelections(m) => serde_json::to_value(m)?,
            MessagePayload::ClearSelections(m) => serde_json::to_value(m)?,
            MessagePayload::ClearData => serde_json::Value::Null,
            MessagePayload::ClientSelection(m) => serde_json::to_value(m)?,
            MessagePayload::Baton(m) => serde_json::to_value(m)?,
            MessagePayload::BatonRequest(m) => serde_json::to_value(m)?,
        };
        Ok(value)
    }
}

/// Classified inbound unit of work, routed by its payload kind
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope {
    pub plot_id: String,
    pub payload: MessagePayload,
}

impl MessageEnvelope {
    pub fn new(plot_id: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            plot_id: plot_id.into(),
            payload,
        }
    }

    pub fn kind(&self) -> MsgType {
        self.payload.kind()
    }

    /// Back to wire form
    pub fn to_plot_message(&self) -> PlotResult<PlotMessage> {
        Ok(PlotMessage {
            plot_id: self.plot_id.clone(),
            kind: self.kind().as_str().to_string(),
            params: self.payload.params()?,
            plot_config: None,
        })
    }
}

/// Client to server traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Status {
        plot_id: String,
        status: StatusType,
    },
    Selection {
        plot_id: String,
        selection: SelectionDescriptor,
    },
    ClearSelections {
        plot_id: String,
        selection_ids: Vec<String>,
    },
    LineParameters {
        plot_id: String,
        key: String,
        line_params: LineParameters,
    },
    ScatterParameters {
        plot_id: String,
        point_size: f64,
    },
    BatonRequest(BatonRequestMessage),
    BatonApproval(BatonApprovalMessage),
}

impl ClientMessage {
    pub fn to_json(&self) -> PlotResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
