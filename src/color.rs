//! Color gradients for graph metrics
//!
//! Colors are handled as templates: strings such as `rgb(255, 0, 0)` split into literal
//! text and integer channels. Two templates with the same layout can be blended
//! channel by channel, which lets [`GradientColorScaler`] turn a batch of metric
//! values into a batch of color strings.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::scaling::LinearScaler;
use crate::Result;

fn channel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("channel pattern is valid"))
}

/// One piece of a tokenized color string
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text between channels, such as `rgb(` or `, `
    Literal(String),
    /// A run of ASCII digits, kept as written
    Channel(String),
}

impl Segment {
    fn as_str(&self) -> &str {
        match self {
            Segment::Literal(text) | Segment::Channel(text) => text,
        }
    }

    fn channel_value(&self) -> Option<i64> {
        match self {
            Segment::Channel(digits) => digits.parse().ok(),
            Segment::Literal(_) => None,
        }
    }
}

/// A color string split into alternating literal and numeric segments.
///
/// # Examples
///
/// ```
/// use netviz::ColorTemplate;
///
/// let red = ColorTemplate::parse("rgb(255, 0, 0)");
/// let blue = ColorTemplate::parse("rgb(0, 0, 255)");
/// assert_eq!(red.channel_count(), 3);
/// assert_eq!(red.interpolate(&blue, 0.5), "rgb(127, 0, 127)");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorTemplate {
    segments: Vec<Segment>,
}

impl ColorTemplate {
    /// Tokenizes `color`. Never fails; a string without digits is a single literal.
    pub fn parse(color: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for found in channel_pattern().find_iter(color) {
            if found.start() > last {
                segments.push(Segment::Literal(color[last..found.start()].to_string()));
            }
            segments.push(Segment::Channel(found.as_str().to_string()));
            last = found.end();
        }
        if last < color.len() {
            segments.push(Segment::Literal(color[last..].to_string()));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of numeric channels in the template
    pub fn channel_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Channel(_)))
            .count()
    }

    /// Whether `other` has channels and literals at the same positions
    pub fn same_layout(&self, other: &ColorTemplate) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| std::mem::discriminant(a) == std::mem::discriminant(b))
    }

    /// Blends each channel towards `high` by the fraction `r`.
    ///
    /// Channels become `floor(low + (high - low) * r)`. Any position that is not a
    /// pair of parseable integer channels is copied from `self` unchanged.
    pub fn interpolate(&self, high: &ColorTemplate, r: f64) -> String {
        self.segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                let pair = segment
                    .channel_value()
                    .zip(high.segments.get(i).and_then(Segment::channel_value));

                match pair {
                    Some((x0, x1)) => {
                        let (x0, x1) = (x0 as f64, x1 as f64);
                        let blended = (x0 + (x1 - x0) * r).floor();
                        format!("{}", blended as i64)
                    }
                    None => segment.as_str().to_string(),
                }
            })
            .collect()
    }
}

impl fmt::Display for ColorTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

/// Maps numeric values onto a color gradient between two templates.
///
/// Values are first normalized into `[0, 1]` by an inner [`LinearScaler`] fitted to the
/// batch, then each channel is interpolated independently.
///
/// # Examples
///
/// ```
/// use netviz::GradientColorScaler;
///
/// let mut scaler = GradientColorScaler::new("rgb(0,0,0)", "rgb(255,255,255)");
/// let colors = scaler.fit_transform(&[0.0, 255.0]).unwrap();
/// assert_eq!(colors, vec!["rgb(0,0,0)", "rgb(255,255,255)"]);
/// ```
#[derive(Clone, Debug)]
pub struct GradientColorScaler {
    low: ColorTemplate,
    high: ColorTemplate,
    normalizer: LinearScaler,
}

impl GradientColorScaler {
    pub fn new(color_low: &str, color_high: &str) -> Self {
        let low = ColorTemplate::parse(color_low);
        let high = ColorTemplate::parse(color_high);

        if !low.same_layout(&high) {
            log::warn!(
                "color templates '{}' and '{}' differ in layout; \
                 unmatched channels keep the low color",
                low,
                high
            );
        }

        Self {
            low,
            high,
            normalizer: LinearScaler::new(0.0, 1.0),
        }
    }

    pub fn low(&self) -> &ColorTemplate {
        &self.low
    }

    pub fn high(&self) -> &ColorTemplate {
        &self.high
    }

    /// The unit-interval scaler used for value normalization
    pub fn normalizer(&self) -> &LinearScaler {
        &self.normalizer
    }

    pub fn is_fitted(&self) -> bool {
        self.normalizer.is_fitted()
    }

    /// Fits the normalizer to `values`; same rules as [`LinearScaler::fit`].
    pub fn fit(&mut self, values: &[f64]) -> Result<()> {
        self.normalizer.fit(values)
    }

    /// Color for an already normalized fraction `r`
    pub fn color_at(&self, r: f64) -> String {
        self.low.interpolate(&self.high, r)
    }

    /// One color per value, in input order.
    pub fn transform(&self, values: &[f64]) -> Result<Vec<String>> {
        let fractions = self.normalizer.transform(values)?;
        Ok(fractions.into_iter().map(|r| self.color_at(r)).collect())
    }

    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Vec<String>> {
        self.fit(values)?;
        self.transform(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetvizError;

    #[test]
    fn test_parse_keeps_digit_groups() {
        let template = ColorTemplate::parse("rgb(255, 0, 12)");

        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("rgb(".to_string()),
                Segment::Channel("255".to_string()),
                Segment::Literal(", ".to_string()),
                Segment::Channel("0".to_string()),
                Segment::Literal(", ".to_string()),
                Segment::Channel("12".to_string()),
                Segment::Literal(")".to_string()),
            ]
        );
        assert_eq!(template.to_string(), "rgb(255, 0, 12)");
    }

    #[test]
    fn test_parse_without_channels() {
        let template = ColorTemplate::parse("red");

        assert_eq!(template.channel_count(), 0);
        assert_eq!(template.to_string(), "red");
        assert_eq!(template.interpolate(&ColorTemplate::parse("blue"), 0.7), "red");
    }

    #[test]
    fn test_parse_leading_channel() {
        let template = ColorTemplate::parse("10 20");
        assert_eq!(template.segments()[0], Segment::Channel("10".to_string()));
        assert_eq!(template.channel_count(), 2);
    }

    #[test]
    fn test_gradient_boundaries() {
        let mut scaler = GradientColorScaler::new("rgb(0,0,0)", "rgb(255,255,255)");
        let colors = scaler.fit_transform(&[0.0, 255.0]).unwrap();

        assert_eq!(colors, vec!["rgb(0,0,0)", "rgb(255,255,255)"]);
    }

    #[test]
    fn test_gradient_midpoint_floors_channels() {
        let mut scaler = GradientColorScaler::new("rgb(255, 0, 0)", "rgb(0, 0, 255)");
        let colors = scaler.fit_transform(&[0.0, 1.0, 2.0]).unwrap();

        assert_eq!(
            colors,
            vec!["rgb(255, 0, 0)", "rgb(127, 0, 127)", "rgb(0, 0, 255)"]
        );
    }

    #[test]
    fn test_malformed_channel_falls_back_to_low_literal() {
        let mut scaler = GradientColorScaler::new("rgb(x,0,0)", "rgb(255,0,0)");
        let colors = scaler.fit_transform(&[0.0]).unwrap();

        assert_eq!(colors, vec!["rgb(x,0,0)"]);
    }

    #[test]
    fn test_mismatched_layout_keeps_low_segments() {
        let low = ColorTemplate::parse("rgb(0,0,0)");
        let high = ColorTemplate::parse("hsl(100)");

        assert!(!low.same_layout(&high));
        // Position 1 is a channel in both; the rest only exist in `low` or are literals.
        assert_eq!(low.interpolate(&high, 1.0), "rgb(100,0,0)");
    }

    #[test]
    fn test_overflowing_channel_is_passed_through() {
        let low = ColorTemplate::parse("v99999999999999999999");
        let high = ColorTemplate::parse("v0");

        assert_eq!(low.interpolate(&high, 0.5), "v99999999999999999999");
    }

    #[test]
    fn test_degenerate_batch_uses_low_color() {
        let mut scaler = GradientColorScaler::new("rgb(10, 20, 30)", "rgb(200, 200, 200)");
        let colors = scaler.fit_transform(&[3.0, 3.0, 3.0]).unwrap();

        assert_eq!(colors, vec!["rgb(10, 20, 30)"; 3]);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let scaler = GradientColorScaler::new("rgb(0,0,0)", "rgb(1,1,1)");

        assert!(!scaler.is_fitted());
        assert!(matches!(scaler.transform(&[0.5]), Err(NetvizError::NotFitted)));
    }

    #[test]
    fn test_empty_batch_is_invalid() {
        let mut scaler = GradientColorScaler::new("rgb(0,0,0)", "rgb(1,1,1)");
        assert!(matches!(
            scaler.fit_transform(&[]),
            Err(NetvizError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_color_at_fraction() {
        let scaler = GradientColorScaler::new("#000", "#100");
        assert_eq!(scaler.color_at(0.25), "#25");
    }
}
