use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::binner::CycleBinner;
use super::config::Config;
use super::constants::*;
use super::decoder::decode_events;
use super::error::{ProcessorError, TextOutputError};
use super::eva::EvaWriter;
use super::frequency::generate_frequency_list;
use super::mdump::{parse_dump, EventDumpSource};
use super::odb::OdbSnapshots;
use super::parameters::{ExperimentParameters, Overrides, ParameterExtractor};
use super::text_output::{write_dump, write_errors, write_positions, SdaExporter};

/// Check that the input exists and is a .mid file
pub fn validate_input(input: &Path) -> Result<(), ProcessorError> {
    let is_mid = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MIDAS_EXTENSION));
    if input.is_file() && is_mid {
        Ok(())
    } else {
        Err(ProcessorError::InvalidInput(input.to_path_buf()))
    }
}

/// Read a .mid file and parse its pre-run and post-run ODB dumps
pub fn load_snapshots(input: &Path) -> Result<OdbSnapshots, ProcessorError> {
    validate_input(input)?;
    let data =
        std::fs::read(input).map_err(|e| ProcessorError::OpenError(input.to_path_buf(), e))?;
    log::info!(
        "Read {} ({})",
        input.to_string_lossy(),
        human_bytes::human_bytes(data.len() as f64)
    );
    Ok(OdbSnapshots::from_bytes(&data)?)
}

/// What came out of converting one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSummary {
    pub cycles: usize,
    pub anomalies: usize,
    pub written: Vec<PathBuf>,
    /// Number of outputs which could not be written
    pub failed: usize,
}

impl ConversionSummary {
    fn record_output(&mut self, path: PathBuf, result: Result<bool, TextOutputError>) {
        match result {
            Ok(true) => self.written.push(path),
            Ok(false) => (),
            Err(e) => {
                log::warn!("{e}");
                self.failed += 1;
            }
        }
    }
}

/// The conversion of a single .mid file.
///
/// Creating one reads the ODB dumps, extracts the experiment parameters and builds the
/// frequency list. [`Conversion::convert`] then runs the event dump through the decoder
/// and binner and writes the outputs.
#[derive(Debug, Clone)]
pub struct Conversion {
    input: PathBuf,
    params: ExperimentParameters,
    frequencies: Vec<f64>,
}

impl Conversion {
    pub fn new(input: &Path, overrides: &Overrides) -> Result<Self, ProcessorError> {
        let snapshots = load_snapshots(input)?;
        let extractor = ParameterExtractor::new(&snapshots);
        let params = extractor.extract(overrides);
        let descriptor = extractor.freq_list_descriptor().ok();
        let frequencies = generate_frequency_list(descriptor.as_deref(), &params);
        log::info!("Frequency list has {} entries", frequencies.len());
        Ok(Self {
            input: input.to_path_buf(),
            params,
            frequencies,
        })
    }

    pub fn params(&self) -> &ExperimentParameters {
        &self.params
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// Decode, bin and write every output the config asks for.
    ///
    /// Every output is best effort: one which cannot be written is logged, counted in
    /// the summary and skipped, and the remaining outputs are still written.
    pub fn convert(
        &self,
        config: &Config,
        source: &dyn EventDumpSource,
    ) -> Result<ConversionSummary, ProcessorError> {
        let text = source.dump(&self.input)?;
        log::info!(
            "Event dump size: {}",
            human_bytes::human_bytes(text.len() as f64)
        );
        let dump = parse_dump(&text)?;
        let stream = decode_events(&dump.events)?;

        let max_tof = config.effective_max_tof(self.params.tdc_gate_width);
        let binned = CycleBinner::new(config.bin_width, max_tof).bin(&stream.events);
        if let Some(expected) = self.params.num_cycles {
            if expected as usize != binned.cycles.len() {
                log::warn!(
                    "Run was set up for {expected} cycles but {} completed cycles were found",
                    binned.cycles.len()
                );
            }
        }
        let histograms = binned.histograms();

        let mut summary = ConversionSummary {
            cycles: histograms.len(),
            anomalies: stream.anomalies.len(),
            ..Default::default()
        };

        let eva_path = config.get_output_file_name(&self.input, EVA_SUFFIX)?;
        match EvaWriter::new(&self.params, &self.frequencies, &binned)
            .write_file(&eva_path, &histograms)
        {
            Ok(_) => summary.written.push(eva_path),
            Err(e) => {
                log::warn!("Could not write {}: {e}", eva_path.to_string_lossy());
                summary.failed += 1;
            }
        }

        if config.write_positions {
            let path = config.get_output_file_name(&self.input, POSITION_SUFFIX)?;
            let result = write_positions(&path, &dump.positions);
            summary.record_output(path, result);
        }
        if config.write_dump {
            let path = config.get_output_file_name(&self.input, DUMP_SUFFIX)?;
            let result = write_dump(&path, &dump.events);
            summary.record_output(path, result);
        }
        let path = config.get_output_file_name(&self.input, ERROR_SUFFIX)?;
        let result = write_errors(&path, &stream.anomalies);
        summary.record_output(path, result);
        if config.write_sda {
            let path = config.get_output_file_name(&self.input, SDA_SUFFIX)?;
            let result = SdaExporter::new(&self.params)
                .write(&path, &histograms)
                .map(|_| true);
            summary.record_output(path, result);
        }

        Ok(summary)
    }
}

/// Convert a single file
pub fn convert_file(
    config: &Config,
    input: &Path,
    source: &dyn EventDumpSource,
) -> Result<ConversionSummary, ProcessorError> {
    Conversion::new(input, &config.overrides)?.convert(config, source)
}

/// The main loop of midas2eva.
///
/// Converts every input file of the config, reporting the fraction of files done through
/// `status`. A file which fails is logged and skipped. Returns the number of files
/// converted.
pub fn process<S: EventDumpSource>(
    config: Config,
    source: S,
    status: Arc<Mutex<f32>>,
) -> Result<usize, ProcessorError> {
    if !config.is_output_path_valid() {
        return Err(ProcessorError::BadOutputPath(config.output_path.clone()));
    }
    if !config.is_binning_valid() {
        return Err(ProcessorError::BadBinning(config.bin_width, config.max_tof));
    }

    let n_files = config.input_files.len();
    let mut converted = 0;
    for (idx, input) in config.input_files.iter().enumerate() {
        log::info!("Processing {}...", input.to_string_lossy());
        match convert_file(&config, input, &source) {
            Ok(summary) => {
                converted += 1;
                log::info!(
                    "Finished {}: {} cycles, {} anomalies, {} files written",
                    input.to_string_lossy(),
                    summary.cycles,
                    summary.anomalies,
                    summary.written.len()
                );
            }
            Err(e) => log::error!("Skipping {}: {e}", input.to_string_lossy()),
        }
        match status.lock() {
            Ok(mut stat) => *stat = (idx + 1) as f32 / n_files as f32,
            Err(e) => log::error!("{e}"),
        }
    }
    Ok(converted)
}
