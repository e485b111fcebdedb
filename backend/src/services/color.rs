//! Diverging color bins and radius scale for flux markers.
//!
//! Bins are fitted to the visible flux range and snapped to round numbers.
//! Colors run from red (departing) through a neutral yellow at zero to green
//! (arriving), symmetric about zero so equal magnitudes get equal intensity.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::services::viewport::ViewportStats;

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const NEUTRAL: Rgb = Rgb(255, 237, 148);
    pub const GREEN: Rgb = Rgb(0, 209, 0);

    /// Linear interpolation per channel, `t` clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgb(
            channel(self.0, other.0),
            channel(self.1, other.1),
            channel(self.2, other.2),
        )
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Knobs for binning and marker sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBinnerConfig {
    pub min_bins: usize,
    pub max_bins: usize,
    /// Flux range covered by one bin before clamping to `[min_bins, max_bins]`
    pub flux_per_bin: f64,
    pub min_radius: f64,
    pub max_radius: f64,
    pub negative: Rgb,
    pub neutral: Rgb,
    pub positive: Rgb,
}

impl Default for ColorBinnerConfig {
    fn default() -> Self {
        Self {
            min_bins: 2,
            max_bins: 5,
            flux_per_bin: 5.0,
            min_radius: 2.0,
            max_radius: 10.0,
            negative: Rgb::RED,
            neutral: Rgb::NEUTRAL,
            positive: Rgb::GREEN,
        }
    }
}

// JavaScript-style rounding (half towards +inf) so tick positions match the
// map's original scales.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Up to roughly `count + 1` evenly spaced round values within `[start, stop]`.
///
/// Steps are 1, 2 or 5 times a power of ten.
pub fn nice_ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if count == 0 || !start.is_finite() || !stop.is_finite() {
        return Vec::new();
    }
    if start == stop {
        return vec![start];
    }
    let (lo, hi, reverse) = if stop < start {
        (stop, start, true)
    } else {
        (start, stop, false)
    };

    let Some((i1, i2, inc)) = tick_spec(lo, hi, count as f64) else {
        return Vec::new();
    };
    if i2 < i1 {
        return Vec::new();
    }

    let mut ticks: Vec<f64> = (0..=(i2 - i1) as i64)
        .map(|i| {
            let k = i1 + i as f64;
            if inc < 0.0 {
                k / -inc
            } else {
                k * inc
            }
        })
        .collect();
    if reverse {
        ticks.reverse();
    }
    ticks
}

fn tick_spec(start: f64, stop: f64, count: f64) -> Option<(f64, f64, f64)> {
    let step = (stop - start) / count;
    if !(step > 0.0) || !step.is_finite() {
        return None;
    }
    let power = step.log10().floor() as i32;
    let error = step / 10f64.powi(power);
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };

    let (mut i1, mut i2, inc);
    if power < 0 {
        let scale = 10f64.powi(-power) / factor;
        i1 = round_half_up(start * scale);
        i2 = round_half_up(stop * scale);
        if i1 / scale < start {
            i1 += 1.0;
        }
        if i2 / scale > stop {
            i2 -= 1.0;
        }
        inc = -scale;
    } else {
        let step = 10f64.powi(power) * factor;
        i1 = round_half_up(start / step);
        i2 = round_half_up(stop / step);
        if i1 * step < start {
            i1 += 1.0;
        }
        if i2 * step > stop {
            i2 -= 1.0;
        }
        inc = step;
    }

    if i2 < i1 && (0.5..2.0).contains(&count) {
        return tick_spec(start, stop, count * 2.0);
    }
    Some((i1, i2, inc))
}

/// `round(range / flux_per_bin)` clamped to the configured bounds.
pub fn bin_count(min_flux: f64, max_flux: f64, config: &ColorBinnerConfig) -> usize {
    let raw = round_half_up((max_flux - min_flux) / config.flux_per_bin);
    let raw = if raw.is_finite() && raw > 0.0 { raw as usize } else { 0 };
    raw.clamp(config.min_bins, config.max_bins)
}

/// One half-open bin `[lower, upper)`; the last bin also includes `upper`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorBin {
    pub lower: f64,
    pub upper: f64,
    /// Values from the classified set falling into this bin
    pub count: usize,
    pub color: Rgb,
}

impl ColorBin {
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: Rgb,
    pub label: String,
}

/// Fitted scales for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxColorScale {
    bins: Vec<ColorBin>,
    abs_extent: f64,
    min_flux: f64,
    max_flux: f64,
    max_rides: f64,
    config: ColorBinnerConfig,
}

impl FluxColorScale {
    pub fn bins(&self) -> &[ColorBin] {
        &self.bins
    }

    /// `max(|min_flux|, |max_flux|)`; the color domain is `[-abs, abs]`.
    pub fn abs_extent(&self) -> f64 {
        self.abs_extent
    }

    /// Continuous diverging color for `flux`, clamped to the domain.
    pub fn gradient(&self, flux: f64) -> Rgb {
        gradient(flux, self.abs_extent, &self.config)
    }

    /// Bin containing `flux`; values beyond the domain land in the outer bins.
    pub fn bin_index(&self, flux: f64) -> usize {
        let above = self.bins.partition_point(|b| b.upper <= flux);
        above.min(self.bins.len() - 1)
    }

    /// Marker color for `flux`. Exactly zero is always the neutral color.
    pub fn color(&self, flux: f64) -> Rgb {
        if flux == 0.0 {
            return self.config.neutral;
        }
        self.bins[self.bin_index(flux)].color
    }

    /// Marker radius, linear in `rides` from `min_radius` at 0 to
    /// `max_radius` at the visible maximum.
    pub fn radius(&self, rides: f64) -> f64 {
        let t = if self.max_rides > 0.0 {
            (rides / self.max_rides).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let t = if t.is_nan() { 0.0 } else { t };
        self.config.min_radius + (self.config.max_radius - self.config.min_radius) * t
    }

    /// One entry per bin, lowest first.
    pub fn legend(&self) -> Vec<LegendEntry> {
        if self.min_flux == self.max_flux {
            return Vec::new();
        }

        let last = self.bins.len() - 1;
        self.bins
            .iter()
            .enumerate()
            .map(|(i, bin)| {
                let (left, right) = (bin.lower, bin.upper);
                let (abs_left, abs_right) = (left.abs(), right.abs());
                let label = if i == 0 {
                    if right > 0.0 {
                        format!("< {} arriving", abs_right)
                    } else {
                        format!("> {} departing", abs_right)
                    }
                } else if i == last {
                    if left >= 0.0 {
                        format!("> {} arriving", abs_left)
                    } else {
                        format!("< {} departing", abs_left)
                    }
                } else {
                    let direction = if left <= 0.0 && right <= 0.0 {
                        "departing"
                    } else {
                        "arriving"
                    };
                    format!(
                        "{} - {} {}",
                        abs_left.min(abs_right),
                        abs_left.max(abs_right),
                        direction
                    )
                };
                LegendEntry {
                    color: bin.color,
                    label,
                }
            })
            .collect()
    }
}

fn gradient(flux: f64, abs_extent: f64, config: &ColorBinnerConfig) -> Rgb {
    if flux < 0.0 {
        config.negative.lerp(config.neutral, (flux + abs_extent) / abs_extent)
    } else {
        config.neutral.lerp(config.positive, flux / abs_extent)
    }
}

/// Builds [`FluxColorScale`]s from viewport stats.
#[derive(Debug, Clone, Default)]
pub struct ColorBinner {
    config: ColorBinnerConfig,
}

impl ColorBinner {
    pub fn new(config: ColorBinnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ColorBinnerConfig {
        &self.config
    }

    /// Fit bins to `stats` and classify `values`.
    ///
    /// Returns `None` when there is nothing to encode: no rides, no flux in
    /// either direction, or non-finite stats.
    pub fn build(&self, stats: &ViewportStats, values: &[f64]) -> Option<FluxColorScale> {
        let ViewportStats {
            min_flux,
            max_flux,
            max_rides,
        } = *stats;
        if ![min_flux, max_flux, max_rides].iter().all(|v| v.is_finite())
            || stats.is_degenerate()
            || min_flux > max_flux
        {
            return None;
        }

        let abs_extent = min_flux.abs().max(max_flux.abs());
        let n_bins = bin_count(min_flux, max_flux, &self.config);

        let mut edges = vec![-abs_extent];
        edges.extend(
            nice_ticks(min_flux, max_flux, n_bins)
                .into_iter()
                .filter(|t| *t > min_flux && *t <= max_flux),
        );
        edges.push(abs_extent);

        // Outer bins reach past the visible range; color them by the part that is visible
        let bins: Vec<ColorBin> = edges
            .windows(2)
            .map(|w| {
                let (lo, hi) = (w[0].max(min_flux), w[1].min(max_flux));
                let anchor = if lo <= hi { (lo + hi) / 2.0 } else { (w[0] + w[1]) / 2.0 };
                ColorBin {
                    lower: w[0],
                    upper: w[1],
                    count: 0,
                    color: gradient(anchor, abs_extent, &self.config),
                }
            })
            .collect();

        let mut scale = FluxColorScale {
            bins,
            abs_extent,
            min_flux,
            max_flux,
            max_rides,
            config: self.config.clone(),
        };

        for value in values.iter().filter(|v| v.is_finite()) {
            let index = scale.bin_index(*value);
            scale.bins[index].count += 1;
        }
        Some(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(min_flux: f64, max_flux: f64, max_rides: f64) -> ViewportStats {
        ViewportStats {
            min_flux,
            max_flux,
            max_rides,
        }
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_ticks(-3.0, 7.0, 2), vec![0.0, 5.0]);
        assert_eq!(
            nice_ticks(0.0, 1.0, 5),
            vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]
        );
        assert_eq!(nice_ticks(10.0, 0.0, 2), vec![10.0, 5.0, 0.0]);
        assert_eq!(nice_ticks(1.0, 1.0, 3), vec![1.0]);
    }

    #[test]
    fn test_bin_count_is_clamped() {
        let config = ColorBinnerConfig::default();
        assert_eq!(bin_count(0.0, 1.0, &config), 2);
        assert_eq!(bin_count(-10.0, 10.0, &config), 4);
        assert_eq!(bin_count(-100.0, 100.0, &config), 5);
    }

    #[test]
    fn test_bins_are_contiguous_and_span_the_symmetric_domain() {
        let scale = ColorBinner::default()
            .build(&stats(-3.0, 7.0, 12.0), &[-3.0, 0.5, 7.0])
            .unwrap();
        let bins = scale.bins();
        assert_eq!(scale.abs_extent(), 7.0);
        assert_eq!(bins.first().unwrap().lower, -7.0);
        assert_eq!(bins.last().unwrap().upper, 7.0);
        for pair in bins.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_zero_is_always_neutral() {
        let scale = ColorBinner::default()
            .build(&stats(-3.0, 7.0, 12.0), &[])
            .unwrap();
        assert_eq!(scale.color(0.0), Rgb::NEUTRAL);
        assert_eq!(scale.color(-0.0), Rgb::NEUTRAL);
    }

    #[test]
    fn test_out_of_range_values_clamp_to_outer_bins() {
        let scale = ColorBinner::default()
            .build(&stats(-3.0, 7.0, 12.0), &[])
            .unwrap();
        let top = scale.bins().last().unwrap().color;
        let bottom = scale.bins().first().unwrap().color;
        assert_eq!(scale.color(14.0), top);
        assert_eq!(scale.color(-1000.0), bottom);
        assert_eq!(scale.bin_index(f64::INFINITY), scale.bins().len() - 1);
    }

    #[test]
    fn test_degenerate_stats_produce_nothing() {
        let binner = ColorBinner::default();
        assert!(binner.build(&stats(0.0, 0.0, 5.0), &[]).is_none());
        assert!(binner.build(&stats(-1.0, 1.0, 0.0), &[]).is_none());
        assert!(binner.build(&stats(f64::NAN, 1.0, 1.0), &[]).is_none());
    }

    #[test]
    fn test_gradient_endpoints() {
        let scale = ColorBinner::default()
            .build(&stats(-4.0, 4.0, 1.0), &[])
            .unwrap();
        assert_eq!(scale.gradient(-4.0), Rgb::RED);
        assert_eq!(scale.gradient(0.0), Rgb::NEUTRAL);
        assert_eq!(scale.gradient(4.0), Rgb::GREEN);
        assert_eq!(scale.gradient(99.0), Rgb::GREEN);
        assert_eq!(Rgb::NEUTRAL.to_string(), "rgb(255, 237, 148)");
    }

    #[test]
    fn test_radius_scale() {
        let scale = ColorBinner::default()
            .build(&stats(-4.0, 4.0, 20.0), &[])
            .unwrap();
        assert_eq!(scale.radius(0.0), 2.0);
        assert_eq!(scale.radius(10.0), 6.0);
        assert_eq!(scale.radius(20.0), 10.0);
        assert_eq!(scale.radius(40.0), 10.0);
    }

    #[test]
    fn test_all_arriving_view_has_no_departing_hue() {
        // ticks(1, 9, 2) = [5] -> bins [-9,5) [5,9]
        let scale = ColorBinner::default()
            .build(&stats(1.0, 9.0, 4.0), &[2.0, 8.0])
            .unwrap();
        assert_eq!(scale.bins().len(), 2);
        assert_eq!(scale.bins()[0].color, scale.gradient(3.0));
        assert_eq!(scale.bins()[1].color, scale.gradient(7.0));
        assert_eq!(scale.color(2.0), scale.gradient(3.0));

        let labels: Vec<String> = scale.legend().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["< 5 arriving", "> 5 arriving"]);
    }

    #[test]
    fn test_all_departing_view_has_no_arriving_hue() {
        let scale = ColorBinner::default()
            .build(&stats(-9.0, -1.0, 4.0), &[])
            .unwrap();
        for bin in scale.bins() {
            let anchor = (bin.lower.max(-9.0) + bin.upper.min(-1.0)) / 2.0;
            assert!(anchor < 0.0);
            assert_eq!(bin.color, scale.gradient(anchor));
        }
    }

    #[test]
    fn test_legend_labels() {
        // ticks(-3, 7, 2) = [0, 5] -> bins [-7,0) [0,5) [5,7]
        let scale = ColorBinner::default()
            .build(&stats(-3.0, 7.0, 12.0), &[])
            .unwrap();
        let labels: Vec<String> = scale.legend().into_iter().map(|e| e.label).collect();
        assert_eq!(
            labels,
            vec!["> 0 departing", "0 - 5 arriving", "> 5 arriving"]
        );
    }
}
