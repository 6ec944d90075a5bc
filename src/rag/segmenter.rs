//! Splits a regulation document into legal units.
//!
//! A unit opens at an article heading and runs until the next structural
//! heading (title, chapter, section, subsection, article or annex), or the end
//! of the text. Everything before the start marker is preamble (cover page,
//! table of contents) and is discarded.

use crate::types::{AppError, Result};
use crate::utils::toml_config::SegmenterConfig;
use regex::Regex;
use tracing::debug;

pub struct Segmenter {
    start_marker: String,
    unit: Regex,
    boundary: Regex,
    noise: Regex,
}

impl Segmenter {
    pub fn new(
        start_marker: &str,
        unit_pattern: &str,
        boundary_pattern: &str,
        noise_pattern: &str,
    ) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                AppError::Configuration(format!("Invalid pattern '{}': {}", pattern, e))
            })
        };

        if start_marker.is_empty() {
            return Err(AppError::Configuration(
                "Start marker must not be empty".to_string(),
            ));
        }

        Ok(Self {
            start_marker: start_marker.to_string(),
            unit: compile(unit_pattern)?,
            boundary: compile(boundary_pattern)?,
            noise: compile(noise_pattern)?,
        })
    }

    pub fn from_config(config: &SegmenterConfig) -> Result<Self> {
        Self::new(
            &config.start_marker,
            &config.unit_pattern,
            &config.boundary_pattern,
            &config.noise_pattern,
        )
    }

    /// Segment `raw` into units, in document order.
    ///
    /// Fails only when the start marker is absent. A document with no unit
    /// headings yields an empty list.
    pub fn segment(&self, raw: &str) -> Result<Vec<String>> {
        let text = raw.replace("\r\n", "\n").replace('\x0C', "\n");

        let start = text.find(&self.start_marker).ok_or_else(|| {
            AppError::Segmentation(format!(
                "Start marker '{}' not found in document",
                self.start_marker
            ))
        })?;
        let body = &text[start..];

        let heads: Vec<(usize, usize)> = self
            .unit
            .find_iter(body)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut units = Vec::with_capacity(heads.len());
        for (i, &(unit_start, heading_end)) in heads.iter().enumerate() {
            let next_unit = heads.get(i + 1).map_or(body.len(), |&(s, _)| s);
            let unit_end = match self.boundary.find_at(body, heading_end) {
                Some(m) if m.start() < next_unit => m.start(),
                _ => next_unit,
            };

            let unit = self.normalize(&body[unit_start..unit_end]);
            if !unit.is_empty() {
                units.push(unit);
            }
        }

        debug!(
            headings = heads.len(),
            units = units.len(),
            "Segmented document"
        );
        Ok(units)
    }

    /// Remove running headers and footers. No match is not an error.
    pub fn strip_noise(&self, text: &str) -> String {
        self.noise.replace_all(text, "").into_owned()
    }

    fn normalize(&self, unit: &str) -> String {
        self.strip_noise(unit)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}
