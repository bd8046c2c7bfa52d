//! Turning an engine's result vector into a gesture decision.
use crate::error::DaqError;
use crate::inference::ModelOutput;
use std::fmt;

/// Top probability must exceed this for a detection.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.60;

/// Index of the first maximum, ignoring NaN. `None` for an empty slice.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if v <= top => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Outcome for one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Class with the highest probability.
    pub class_index: usize,
    /// Probability of that class.
    pub confidence: f32,
    /// Whether the confidence cleared the threshold.
    pub detected: bool,
    /// Label of the top class, if one is configured.
    pub label: Option<String>,
    /// Dequantized probability of every class.
    pub probabilities: Vec<f32>,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .label
            .clone()
            .unwrap_or_else(|| format!("class {}", self.class_index));
        if self.detected {
            write!(f, "{name} ({:.0}%)", self.confidence * 100.0)
        } else {
            write!(f, "no gesture (best {name} at {:.0}%)", self.confidence * 100.0)
        }
    }
}

/// Per-class confidence listing for one [`Classification`].
///
/// Built by [`Classifier::table`]. One row per class with its rounded
/// percentage, then the detection line.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceTable<'a> {
    classifier: &'a Classifier,
    result: &'a Classification,
}

impl fmt::Display for ConfidenceTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (0..self.result.probabilities.len())
            .map(|i| {
                self.classifier
                    .label(i)
                    .map_or_else(|| format!("class {i}"), str::to_owned)
            })
            .collect();
        let width = names.iter().map(String::len).max().unwrap_or(0).max("detection".len());

        for (name, p) in names.iter().zip(&self.result.probabilities) {
            writeln!(f, "| {name:<width$} | {:>3}%", (p * 100.0).round() as i32)?;
        }
        let detection = if self.result.detected {
            names
                .get(self.result.class_index)
                .map_or("no gesture", String::as_str)
        } else {
            "no gesture"
        };
        write!(f, "| {:<width$} | {detection}", "detection")
    }
}

/// Thresholded arg-max classifier with optional labels.
#[derive(Debug, Clone)]
pub struct Classifier {
    min_confidence: f32,
    labels: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            labels: Vec::new(),
        }
    }
}

impl Classifier {
    /// Create a classifier.
    ///
    /// # Errors
    /// `BadArgument` unless `0 <= min_confidence <= 1`.
    pub fn new(min_confidence: f32, labels: Vec<String>) -> Result<Self, DaqError> {
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(DaqError::BadArgument(format!(
                "min_confidence {min_confidence} outside [0, 1]"
            )));
        }
        Ok(Self {
            min_confidence,
            labels,
        })
    }

    /// Detection threshold.
    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Label of a class.
    pub fn label(&self, class_index: usize) -> Option<&str> {
        self.labels.get(class_index).map(String::as_str)
    }

    /// Confidence of every class in `result`, labelled with this classifier's names.
    pub fn table<'a>(&'a self, result: &'a Classification) -> ConfidenceTable<'a> {
        ConfidenceTable {
            classifier: self,
            result,
        }
    }

    /// Classify an engine output. `None` if the output is empty.
    pub fn classify(&self, output: ModelOutput<'_>) -> Option<Classification> {
        let mut probabilities = Vec::with_capacity(output.len());
        output.dequantize_into(&mut probabilities);

        let class_index = argmax(&probabilities)?;
        let confidence = probabilities[class_index];
        Some(Classification {
            class_index,
            confidence,
            detected: confidence > self.min_confidence,
            label: self.label(class_index).map(str::to_owned),
            probabilities,
        })
    }
}
