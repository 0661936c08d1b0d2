use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::binner::CycleHistogram;
use super::constants::{POSITION_X_DIGITS, POSITION_Y_DIGITS};
use super::error::TextOutputError;
use super::eva::format_known;
use super::parameters::ExperimentParameters;

/// Decode the (x, y) position of one MCP position token
pub fn decode_position(token: &str) -> Result<(u8, u8), TextOutputError> {
    let field = |digits: std::ops::Range<usize>| {
        token
            .get(digits)
            .and_then(|f| u8::from_str_radix(f, 16).ok())
            .ok_or_else(|| TextOutputError::BadPosition(token.to_string()))
    };
    Ok((field(POSITION_X_DIGITS)?, field(POSITION_Y_DIGITS)?))
}

fn write_lines<I, S>(path: &Path, lines: I) -> Result<(), TextOutputError>
where
    I: IntoIterator<Item = S>,
    S: std::fmt::Display,
{
    let file =
        File::create(path).map_err(|e| TextOutputError::OpenError(path.to_path_buf(), e))?;
    let mut writer = BufWriter::new(file);
    let write_err = |e| TextOutputError::WriteError(path.to_path_buf(), e);
    for line in lines {
        writeln!(writer, "{line}").map_err(write_err)?;
    }
    writer.flush().map_err(write_err)
}

/// Write one `x y` line per position token. Nothing is written when there are no positions.
///
/// Returns whether the file was written.
pub fn write_positions(path: &Path, positions: &[String]) -> Result<bool, TextOutputError> {
    if positions.is_empty() {
        return Ok(false);
    }
    let decoded = positions
        .iter()
        .map(|token| decode_position(token))
        .collect::<Result<Vec<(u8, u8)>, TextOutputError>>()?;
    write_lines(path, decoded.iter().map(|(x, y)| format!("{x} {y}")))?;
    log::info!("Wrote {} positions to {}", decoded.len(), path.to_string_lossy());
    Ok(true)
}

/// Write every raw event token, one per line. Nothing is written when there are no tokens.
///
/// Returns whether the file was written.
pub fn write_dump(path: &Path, tokens: &[String]) -> Result<bool, TextOutputError> {
    if tokens.is_empty() {
        return Ok(false);
    }
    write_lines(path, tokens)?;
    log::info!("Wrote {} raw tokens to {}", tokens.len(), path.to_string_lossy());
    Ok(true)
}

/// Write every anomalous header word, one per line. The file is omitted when there are none.
///
/// Returns whether the file was written.
pub fn write_errors(path: &Path, anomalies: &[String]) -> Result<bool, TextOutputError> {
    if anomalies.is_empty() {
        return Ok(false);
    }
    write_lines(path, anomalies)?;
    log::warn!(
        "Found {} anomalous event words, listed in {}",
        anomalies.len(),
        path.to_string_lossy()
    );
    Ok(true)
}

/// Exports the binned data for the simplified one dimensional analysis.
///
/// The first line is `data:<start frequency>`, followed by `<cycle> <bin> <count>`
/// for every occupied bin.
#[derive(Debug, Clone, Copy)]
pub struct SdaExporter<'a> {
    params: &'a ExperimentParameters,
}

impl<'a> SdaExporter<'a> {
    pub fn new(params: &'a ExperimentParameters) -> Self {
        Self { params }
    }

    pub fn lines(&self, histograms: &[CycleHistogram]) -> Vec<String> {
        let mut lines = vec![format!("data:{}", format_known(self.params.start_freq))];
        for (cycle, hist) in histograms.iter().enumerate() {
            lines.extend(
                hist.iter()
                    .map(|(bin, count)| format!("{cycle} {bin} {count}")),
            );
        }
        lines
    }

    pub fn write(&self, path: &Path, histograms: &[CycleHistogram]) -> Result<(), TextOutputError> {
        write_lines(path, self.lines(histograms))?;
        log::info!("Wrote simplified analysis data to {}", path.to_string_lossy());
        Ok(())
    }
}
