//! Render-ready payloads decoded from plot data messages

use crate::array::{DecodeLimits, DecodedArray};
use beamplot_shared::messages::{ImageData, LineData, ScatterData, SurfaceData, TableData};
use beamplot_shared::{
    Aspect, AxesParameters, DecodeError, Domain, LineParameters, PlotError, PlotResult,
    RawArrayPayload, ScaleType, TableDisplayParams,
};

fn decode(payload: &RawArrayPayload, limits: &DecodeLimits) -> PlotResult<DecodedArray> {
    Ok(DecodedArray::decode_with(payload, limits)?)
}

fn require_rank(array: &DecodedArray, ranks: &[usize], expected: &str) -> PlotResult<()> {
    if ranks.contains(&array.rank()) {
        Ok(())
    } else {
        Err(DecodeError::RankMismatch {
            expected: expected.to_string(),
            shape: array.shape().to_vec(),
        }
        .into())
    }
}

/// Decoded axes; replaces the previous axes wholesale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxesConfig {
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub x_scale: ScaleType,
    pub y_scale: ScaleType,
    pub x_values: Option<DecodedArray>,
    pub y_values: Option<DecodedArray>,
    pub title: Option<String>,
}

impl AxesConfig {
    pub fn decode(params: &AxesParameters, limits: &DecodeLimits) -> PlotResult<Self> {
        let x_values = params.x_values.as_ref().map(|p| decode(p, limits)).transpose()?;
        let y_values = params.y_values.as_ref().map(|p| decode(p, limits)).transpose()?;
        Ok(Self {
            x_label: params.x_label.clone(),
            y_label: params.y_label.clone(),
            x_scale: params.x_scale.unwrap_or_default(),
            y_scale: params.y_scale.unwrap_or_default(),
            x_values,
            y_values,
            title: params.title.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinePayload {
    pub key: String,
    pub colour: Option<String>,
    pub line_on: bool,
    pub point_size: Option<u32>,
    pub x: DecodedArray,
    pub y: DecodedArray,
    pub x_domain: Option<Domain>,
    pub y_domain: Option<Domain>,
    /// `x` was generated as `0..len(y)`
    pub default_indices: bool,
}

impl LinePayload {
    /// Decode one line; a line without y values decodes to `None`
    pub fn decode(line: &LineData, limits: &DecodeLimits) -> PlotResult<Option<Self>> {
        let y = decode(&line.y, limits)?;
        if y.is_empty() {
            log::debug!("Dropping line {} with no y values", line.key);
            return Ok(None);
        }
        require_rank(&y, &[1], "1")?;

        let x = match &line.x {
            Some(x) => Some(decode(x, limits)?).filter(|x| !x.is_empty()),
            None => None,
        };
        let (x, default_indices) = match x {
            Some(x) => {
                require_rank(&x, &[1], "1")?;
                if x.len() != y.len() && x.len() != y.len() + 1 {
                    return Err(PlotError::invalid_payload(
                        "line",
                        format!(
                            "line {}: x ({}) and y ({}) must be the same length",
                            line.key,
                            x.len(),
                            y.len()
                        ),
                    ));
                }
                (x, false)
            }
            None => (DecodedArray::indices(0, y.len()), true),
        };

        Ok(Some(Self {
            key: line.key.clone(),
            colour: line.colour.clone(),
            line_on: line.line_on,
            point_size: line.point_size,
            x_domain: x.min_max(),
            y_domain: y.min_max(),
            x,
            y,
            default_indices,
        }))
    }

    pub fn params(&self) -> LineParameters {
        LineParameters {
            colour: self.colour.clone(),
            line_on: self.line_on,
            point_size: self.point_size,
        }
    }

    pub fn set_params(&mut self, params: &LineParameters) {
        self.colour = params.colour.clone();
        self.line_on = params.line_on;
        self.point_size = params.point_size;
    }

    /// Extend this line with `more`, keeping this line's key and params
    ///
    /// A line with default indices continues its index run instead of
    /// taking the new line's x values. When `more` carries bin edges its
    /// leading edge is dropped, so x stays at most one longer than y.
    pub fn append(&self, more: &LinePayload) -> PlotResult<LinePayload> {
        let x_more = if self.default_indices {
            DecodedArray::indices(self.y.len(), self.y.len() + more.y.len())
        } else if more.x.len() == more.y.len() + 1 {
            more.x.skip_rows(1)
        } else {
            more.x.clone()
        };
        let x = self.x.concat(&x_more)?;
        let y = self.y.concat(&more.y)?;
        let y_domain = match (self.y_domain, more.y_domain) {
            (Some(a), Some(b)) => Some(a.union(&b)),
            (a, b) => a.or(b),
        };

        Ok(LinePayload {
            key: self.key.clone(),
            colour: self.colour.clone(),
            line_on: self.line_on,
            point_size: self.point_size,
            x_domain: x.min_max(),
            y_domain,
            x,
            y,
            default_indices: self.default_indices,
        })
    }
}

/// Decode every line of a message; all lines must agree on default indices
pub fn decode_lines(lines: &[LineData], limits: &DecodeLimits) -> PlotResult<Vec<LinePayload>> {
    let mut decoded = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(line) = LinePayload::decode(line, limits)? {
            decoded.push(line);
        }
    }
    if let Some(first) = decoded.first() {
        if decoded.iter().any(|l| l.default_indices != first.default_indices) {
            return Err(PlotError::invalid_payload(
                "line",
                "lines disagree on default indices",
            ));
        }
    }
    Ok(decoded)
}

/// Union of the domains of all lines
pub fn lines_domain(lines: &[LinePayload]) -> (Option<Domain>, Option<Domain>) {
    fn union(domains: impl Iterator<Item = Option<Domain>>) -> Option<Domain> {
        domains.flatten().reduce(|a, b| a.union(&b))
    }
    (
        union(lines.iter().map(|l| l.x_domain)),
        union(lines.iter().map(|l| l.y_domain)),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub key: String,
    /// Rank 2, or rank 3 with a trailing channel dimension
    pub values: DecodedArray,
    pub aspect: Option<Aspect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeatmapPayload {
    pub image: ImagePayload,
    pub domain: Domain,
    pub scale: ScaleType,
    pub colour_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPayload {
    pub key: String,
    pub x_data: DecodedArray,
    pub y_data: DecodedArray,
    pub data_array: DecodedArray,
    pub domain: Domain,
    pub colour_map: Option<String>,
    pub point_size: Option<f64>,
}

impl ScatterPayload {
    pub fn decode(data: &ScatterData, limits: &DecodeLimits) -> PlotResult<Self> {
        let x_data = decode(&data.x_data, limits)?;
        let y_data = decode(&data.y_data, limits)?;
        let data_array = decode(&data.data_array, limits)?;
        if x_data.len() != y_data.len() || x_data.len() != data_array.len() {
            return Err(PlotError::invalid_payload(
                "scatter",
                format!(
                    "xData ({}), yData ({}) and dataArray ({}) must be the same length",
                    x_data.len(),
                    y_data.len(),
                    data_array.len()
                ),
            ));
        }
        Ok(Self {
            key: data.key.clone(),
            x_data,
            y_data,
            data_array,
            domain: data.domain,
            colour_map: data.colour_map.clone(),
            point_size: data.point_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfacePayload {
    pub key: String,
    pub values: DecodedArray,
    pub domain: Domain,
    pub scale: ScaleType,
    pub colour_map: Option<String>,
}

impl SurfacePayload {
    pub fn decode(data: &SurfaceData, limits: &DecodeLimits) -> PlotResult<Self> {
        let values = decode(&data.values, limits)?;
        require_rank(&values, &[2], "2")?;
        Ok(Self {
            key: data.key.clone(),
            values,
            domain: data.domain,
            scale: data.surface_scale,
            colour_map: data.colour_map.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TablePayload {
    pub key: String,
    pub data_array: DecodedArray,
    pub cell_width: f64,
    pub display_params: TableDisplayParams,
}

impl TablePayload {
    pub fn decode(data: &TableData, limits: &DecodeLimits) -> PlotResult<Self> {
        let data_array = decode(&data.data_array, limits)?;
        require_rank(&data_array, &[2], "2")?;
        Ok(Self {
            key: data.key.clone(),
            data_array,
            cell_width: data.cell_width,
            display_params: data.display_params.unwrap_or_default().clamped(),
        })
    }

    /// Formatted cell at `(row, column)`
    pub fn cell(&self, row: usize, column: usize) -> Option<String> {
        self.data_array
            .get(&[row, column])
            .map(|v| self.display_params.format(v))
    }
}

/// Current data of one plot, one variant per plot kind
#[derive(Debug, Clone, PartialEq)]
pub enum PlotPayload {
    MultiLine(Vec<LinePayload>),
    Image(ImagePayload),
    Heatmap(HeatmapPayload),
    Scatter(ScatterPayload),
    Surface(SurfacePayload),
    Table(TablePayload),
}

impl PlotPayload {
    /// Image data decodes to a heatmap when it carries a domain
    pub fn decode_image(data: &ImageData, limits: &DecodeLimits) -> PlotResult<Self> {
        let values = decode(&data.values, limits)?;
        require_rank(&values, &[2, 3], "2 or 3")?;
        let image = ImagePayload {
            key: data.key.clone(),
            values,
            aspect: data.aspect,
        };
        Ok(match data.domain {
            Some(domain) => PlotPayload::Heatmap(HeatmapPayload {
                image,
                domain,
                scale: data.heatmap_scale.unwrap_or_default(),
                colour_map: data.colour_map.clone(),
            }),
            None => PlotPayload::Image(image),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlotPayload::MultiLine(_) => "line",
            PlotPayload::Image(_) => "image",
            PlotPayload::Heatmap(_) => "heatmap",
            PlotPayload::Scatter(_) => "scatter",
            PlotPayload::Surface(_) => "surface",
            PlotPayload::Table(_) => "table",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            PlotPayload::MultiLine(_) => None,
            PlotPayload::Image(p) => Some(&p.key),
            PlotPayload::Heatmap(p) => Some(&p.image.key),
            PlotPayload::Scatter(p) => Some(&p.key),
            PlotPayload::Surface(p) => Some(&p.key),
            PlotPayload::Table(p) => Some(&p.key),
        }
    }
}
