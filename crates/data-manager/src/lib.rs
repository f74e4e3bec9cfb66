//! Data manager crate for beamplot
//! Decodes wire array payloads and keeps the committed state of each plot

pub mod array;
pub mod payloads;
pub mod plot_state;
pub mod selection_set;

pub use array::{DecodeLimits, DecodedArray};
pub use payloads::{
    decode_lines, lines_domain, AxesConfig, HeatmapPayload, ImagePayload, LinePayload,
    PlotPayload, ScatterPayload, SurfacePayload, TablePayload,
};
pub use plot_state::{PlotState, PlotSummary};
pub use selection_set::{ProposedSelection, SelectionSet};
