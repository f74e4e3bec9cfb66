//! Committed state of a single plot

use crate::payloads::{lines_domain, AxesConfig, LinePayload, PlotPayload};
use crate::selection_set::SelectionSet;
use beamplot_shared::{Domain, LineParameters, PlotError, PlotResult};
use serde::Serialize;

/// Data, axes and selections of one plot id
///
/// Every mutation either applies completely or leaves the state untouched.
#[derive(Debug, Clone)]
pub struct PlotState {
    plot_id: String,
    axes: AxesConfig,
    payload: Option<PlotPayload>,
    selections: SelectionSet,
    revision: u64,
}

impl PlotState {
    pub fn new(plot_id: impl Into<String>) -> Self {
        let plot_id = plot_id.into();
        Self {
            selections: SelectionSet::new(plot_id.clone()),
            plot_id,
            axes: AxesConfig::default(),
            payload: None,
            revision: 0,
        }
    }

    pub fn plot_id(&self) -> &str {
        &self.plot_id
    }

    pub fn axes(&self) -> &AxesConfig {
        &self.axes
    }

    pub fn payload(&self) -> Option<&PlotPayload> {
        self.payload.as_ref()
    }

    pub fn selections(&self) -> &SelectionSet {
        &self.selections
    }

    pub fn selections_mut(&mut self) -> &mut SelectionSet {
        &mut self.selections
    }

    /// Incremented on every accepted data change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn lines(&self) -> Option<&[LinePayload]> {
        match &self.payload {
            Some(PlotPayload::MultiLine(lines)) => Some(lines),
            _ => None,
        }
    }

    /// Replace data and axes
    pub fn replace(&mut self, axes: AxesConfig, payload: PlotPayload) {
        log::debug!("Plot {}: new {} data", self.plot_id, payload.kind());
        self.axes = axes;
        self.payload = Some(payload);
        self.revision += 1;
    }

    /// Append onto existing lines position by position
    ///
    /// Without current line data this behaves like a new multi-line message.
    /// `axes`, when given, replaces the current axes.
    pub fn append_lines(&mut self, axes: Option<AxesConfig>, lines: Vec<LinePayload>) -> PlotResult<()> {
        let combined = match self.lines() {
            Some(current) if !current.is_empty() => {
                let mut combined = Vec::with_capacity(current.len().max(lines.len()));
                for (i, line) in current.iter().enumerate() {
                    match lines.get(i) {
                        Some(more) => combined.push(line.append(more)?),
                        None => combined.push(line.clone()),
                    }
                }
                combined.extend(lines.iter().skip(current.len()).cloned());
                combined
            }
            _ => lines,
        };

        if let Some(axes) = axes {
            self.axes = axes;
        }
        log::debug!("Plot {}: {} lines after append", self.plot_id, combined.len());
        self.payload = Some(PlotPayload::MultiLine(combined));
        self.revision += 1;
        Ok(())
    }

    /// Drop data and selections
    pub fn clear(&mut self) {
        let removed = self.selections.clear();
        log::debug!(
            "Plot {}: cleared data and {} selections",
            self.plot_id,
            removed
        );
        self.axes = AxesConfig::default();
        self.payload = None;
        self.revision += 1;
    }

    /// Union of x and y domains over all lines
    pub fn line_domains(&self) -> (Option<Domain>, Option<Domain>) {
        self.lines().map(lines_domain).unwrap_or((None, None))
    }

    pub fn set_line_params(&mut self, key: &str, params: &LineParameters) -> PlotResult<()> {
        let line = match &mut self.payload {
            Some(PlotPayload::MultiLine(lines)) => lines.iter_mut().find(|l| l.key == key),
            _ => None,
        };
        let line = line.ok_or_else(|| {
            PlotError::invalid_payload("line", format!("plot {} has no line {key}", self.plot_id))
        })?;
        line.set_params(params);
        Ok(())
    }

    pub fn set_scatter_point_size(&mut self, point_size: f64) -> PlotResult<()> {
        match &mut self.payload {
            Some(PlotPayload::Scatter(scatter)) => {
                scatter.point_size = Some(point_size);
                Ok(())
            }
            _ => Err(PlotError::invalid_payload(
                "scatter",
                format!("plot {} has no scatter data", self.plot_id),
            )),
        }
    }

    pub fn summary(&self) -> PlotSummary {
        let (kind, key, shapes) = match &self.payload {
            None => (None, None, Vec::new()),
            Some(PlotPayload::MultiLine(lines)) => (
                Some("line"),
                None,
                lines.iter().map(|l| l.y.shape().to_vec()).collect(),
            ),
            Some(PlotPayload::Image(p)) => (Some("image"), Some(&p.key), vec![p.values.shape().to_vec()]),
            Some(PlotPayload::Heatmap(p)) => (
                Some("heatmap"),
                Some(&p.image.key),
                vec![p.image.values.shape().to_vec()],
            ),
            Some(PlotPayload::Scatter(p)) => (Some("scatter"), Some(&p.key), vec![p.data_array.shape().to_vec()]),
            Some(PlotPayload::Surface(p)) => (Some("surface"), Some(&p.key), vec![p.values.shape().to_vec()]),
            Some(PlotPayload::Table(p)) => (Some("table"), Some(&p.key), vec![p.data_array.shape().to_vec()]),
        };
        let (x_domain, y_domain) = self.line_domains();

        PlotSummary {
            plot_id: self.plot_id.clone(),
            kind,
            key: key.cloned(),
            title: self.axes.title.clone(),
            shapes,
            x_domain,
            y_domain,
            selections: self.selections.ids(),
            revision: self.revision,
        }
    }
}

/// Serializable overview of a plot's state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSummary {
    pub plot_id: String,
    pub kind: Option<&'static str>,
    pub key: Option<String>,
    pub title: Option<String>,
    pub shapes: Vec<Vec<usize>>,
    pub x_domain: Option<Domain>,
    pub y_domain: Option<Domain>,
    pub selections: Vec<String>,
    pub revision: u64,
}
