//! The list of RF frequencies applied during a sweep.
//!
//! The ODB may describe the sweep as a `;` separated list of segments, each a
//! `(center, halfspan, count)` tuple in Hz. When that description is missing or
//! unreadable the list is interpolated between the start and stop frequency.
use super::error::FrequencyListError;
use super::parameters::ExperimentParameters;

/// One segment of a multi-segment sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencySegment {
    pub center: f64,
    pub halfspan: f64,
    pub count: usize,
}

impl FrequencySegment {
    /// Parse a `(center, halfspan, count)` tuple. Square brackets are accepted too.
    pub fn parse(text: &str) -> Result<Self, FrequencyListError> {
        let bad = || FrequencyListError::BadSegment(text.to_string());
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .or_else(|| trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')))
            .ok_or_else(bad)?;

        let mut fields = inner.split(',').map(str::trim).collect::<Vec<&str>>();
        if fields.last() == Some(&"") {
            fields.pop(); // trailing comma
        }
        if fields.len() != 3 {
            return Err(bad());
        }
        let values = fields
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| bad())?;

        let count = values[2];
        if count.fract() != 0.0 || count < 0.0 {
            return Err(bad());
        }
        if count < 2.0 {
            return Err(FrequencyListError::TooFewPoints(text.to_string()));
        }
        Ok(Self {
            center: values[0],
            halfspan: values[1],
            count: count as usize,
        })
    }

    pub fn step(&self) -> f64 {
        2.0 * self.halfspan / (self.count as f64 - 1.0)
    }

    pub fn frequencies(&self) -> impl Iterator<Item = f64> {
        let low = self.center - self.halfspan;
        let step = self.step();
        (0..self.count).map(move |i| low + i as f64 * step)
    }
}

/// Parse a full sweep descriptor. Any unreadable segment fails the whole descriptor.
pub fn parse_sweep(descriptor: &str) -> Result<Vec<FrequencySegment>, FrequencyListError> {
    descriptor.split(';').map(FrequencySegment::parse).collect()
}

/// The frequencies of every segment, concatenated in order
pub fn sweep_frequencies(segments: &[FrequencySegment]) -> Vec<f64> {
    segments.iter().flat_map(|s| s.frequencies()).collect()
}

/// `steps` evenly spaced frequencies from `start` to `stop`, both included.
///
/// A single step gives just the start frequency.
pub fn linear_sweep(start: f64, stop: f64, steps: f64) -> Vec<f64> {
    let n = if steps > 0.0 { steps as usize } else { 0 };
    if n == 1 {
        return vec![start];
    }
    let step = (stop - start) / (steps - 1.0);
    (0..n).map(|i| start + i as f64 * step).collect()
}

/// Generate the frequency list for a run.
///
/// `descriptor` is the ODB sweep description if there is one. Any failure to use it
/// falls back to the linear sweep built from the parameters.
pub fn generate_frequency_list(
    descriptor: Option<&str>,
    params: &ExperimentParameters,
) -> Vec<f64> {
    match descriptor
        .ok_or(FrequencyListError::MissingDescriptor)
        .and_then(parse_sweep)
    {
        Ok(segments) => {
            log::info!("Using frequency sweep with {} segment(s)", segments.len());
            sweep_frequencies(&segments)
        }
        Err(e) => {
            log::info!("No usable frequency sweep ({e}), interpolating from start/stop frequency");
            match (params.start_freq, params.stop_freq, params.num_freq_steps) {
                (Some(start), Some(stop), Some(steps)) => linear_sweep(start, stop, steps),
                _ => {
                    log::warn!("Could not generate a frequency list; start, stop or steps unknown");
                    Vec::new()
                }
            }
        }
    }
}
