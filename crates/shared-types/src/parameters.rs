//! Presentation parameters carried alongside plot data

use crate::ndarray::RawArrayPayload;
use serde::{Deserialize, Serialize};

/// Axis or colour scale
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    #[default]
    Linear,
    Log,
    Symlog,
    Sqrt,
    Gamma,
}

/// Named image aspect
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AspectKind {
    Auto,
    Equal,
}

/// Image aspect: either a named mode or a numeric ratio
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Aspect {
    Named(AspectKind),
    Ratio(f64),
}

/// Numeric [min, max] range an axis or colour scale maps onto
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Domain(pub f64, pub f64);

impl Domain {
    pub fn new(min: f64, max: f64) -> Self {
        Self(min, max)
    }

    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    pub fn span(&self) -> f64 {
        self.1 - self.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.0 && value <= self.1
    }

    /// Smallest domain covering both
    pub fn union(&self, other: &Domain) -> Domain {
        Domain(self.0.min(other.0), self.1.max(other.1))
    }

    /// Valid when both ends are finite and ordered
    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.1.is_finite() && self.0 <= self.1
    }
}

/// Axes configuration as sent by the plot server
///
/// A new message replaces the previous axes wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AxesParameters {
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub x_scale: Option<ScaleType>,
    pub y_scale: Option<ScaleType>,
    pub x_values: Option<RawArrayPayload>,
    pub y_values: Option<RawArrayPayload>,
    pub title: Option<String>,
}

/// Table number notation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TableDisplayType {
    #[default]
    Standard,
    Scientific,
}

/// Table cell formatting
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TableDisplayParams {
    pub display_type: Option<TableDisplayType>,
    /// Significant figures (scientific) or decimal places (standard)
    pub number_digits: Option<u32>,
}

impl TableDisplayParams {
    pub const DEFAULT_DIGITS: u32 = 2;

    pub fn display_type(&self) -> TableDisplayType {
        self.display_type.unwrap_or_default()
    }

    /// Digits clamped to 1..=21 for scientific and 0..=20 for standard notation
    pub fn digits(&self) -> u32 {
        let digits = self.number_digits.unwrap_or(Self::DEFAULT_DIGITS);
        match self.display_type() {
            TableDisplayType::Scientific => digits.clamp(1, 21),
            TableDisplayType::Standard => digits.min(20),
        }
    }

    /// Copy with `number_digits` clamped into range
    pub fn clamped(&self) -> Self {
        Self {
            display_type: self.display_type,
            number_digits: self.number_digits.map(|_| self.digits()),
        }
    }

    /// Render one cell value
    pub fn format(&self, value: f64) -> String {
        let digits = self.digits() as usize;
        match self.display_type() {
            TableDisplayType::Scientific => format!("{:.*e}", digits - 1, value),
            TableDisplayType::Standard => format!("{:.*}", digits, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain() {
        let a = Domain::new(0.0, 2.0);
        let b = Domain::new(-1.0, 1.5);
        assert_eq!(a.union(&b), Domain::new(-1.0, 2.0));
        assert!(a.contains(2.0));
        assert!(!a.contains(2.5));
        assert_eq!(a.span(), 2.0);
        assert!(!Domain::new(1.0, 0.0).is_valid());
        assert_eq!(serde_json::to_string(&a).unwrap(), "[0.0,2.0]");
    }

    #[test]
    fn test_aspect_deserialization() {
        let named: Aspect = serde_json::from_str("\"equal\"").unwrap();
        assert_eq!(named, Aspect::Named(AspectKind::Equal));
        let ratio: Aspect = serde_json::from_str("1.5").unwrap();
        assert_eq!(ratio, Aspect::Ratio(1.5));
        let integer: Aspect = serde_json::from_str("2").unwrap();
        assert_eq!(integer, Aspect::Ratio(2.0));
    }

    #[test]
    fn test_axes_defaults() {
        let axes: AxesParameters = serde_json::from_str(r#"{"title": "T"}"#).unwrap();
        assert_eq!(axes.title.as_deref(), Some("T"));
        assert!(axes.x_scale.is_none());
        assert!(axes.x_values.is_none());

        let axes: AxesParameters =
            serde_json::from_str(r#"{"x_scale": "symlog", "y_label": "counts"}"#).unwrap();
        assert_eq!(axes.x_scale, Some(ScaleType::Symlog));
        assert_eq!(axes.y_label.as_deref(), Some("counts"));
    }

    #[test]
    fn test_table_digits_clamped() {
        let params: TableDisplayParams =
            serde_json::from_str(r#"{"displayType": "scientific", "numberDigits": 40}"#).unwrap();
        assert_eq!(params.digits(), 21);

        let params = TableDisplayParams {
            display_type: Some(TableDisplayType::Scientific),
            number_digits: Some(0),
        };
        assert_eq!(params.digits(), 1);
        assert_eq!(params.clamped().number_digits, Some(1));

        let params = TableDisplayParams {
            display_type: Some(TableDisplayType::Standard),
            number_digits: Some(25),
        };
        assert_eq!(params.digits(), 20);
    }

    #[test]
    fn test_table_format() {
        let standard = TableDisplayParams {
            display_type: Some(TableDisplayType::Standard),
            number_digits: Some(3),
        };
        assert_eq!(standard.format(1.23456), "1.235");

        let scientific = TableDisplayParams {
            display_type: Some(TableDisplayType::Scientific),
            number_digits: Some(3),
        };
        assert_eq!(scientific.format(12345.0), "1.23e4");
    }
}
