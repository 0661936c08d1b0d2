use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OdbError {
    #[error("Could not find ODB dump markers in the MIDAS file")]
    MissingMarkers,
    #[error("ODB dump markers in the MIDAS file are out of order")]
    BadMarkerOrder,
    #[error("Failed to parse ODB dump XML: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("Failed to parse ODB dump attribute: {0}")]
    AttrError(#[from] quick_xml::events::attributes::AttrError),
    #[error("ODB dump does not start with an odb element")]
    MissingRoot,
    #[error("ODB dump has an unbalanced element structure")]
    Unbalanced,
}

/// The Accessor error. Always carries the full location that was asked for.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("Error accessing odb element: depth {depth} dir {dir} key {key} -- directory not found")]
    MissingDirectory {
        depth: usize,
        dir: String,
        key: String,
    },
    #[error("Error accessing odb element: depth {depth} dir {dir} key {key} -- key not found")]
    MissingKey {
        depth: usize,
        dir: String,
        key: String,
    },
    #[error("Error accessing odb element: depth {depth} dir {dir} key {key} -- could not convert value {value:?}")]
    BadValue {
        depth: usize,
        dir: String,
        key: String,
        value: String,
    },
}

impl LookupError {
    /// True if the directory or key simply does not exist
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::BadValue { .. })
    }
}

#[derive(Debug, Error)]
pub enum FrequencyListError {
    #[error("Frequency list descriptor is missing")]
    MissingDescriptor,
    #[error("Frequency list segment {0:?} is not a (center, halfspan, count) tuple")]
    BadSegment(String),
    #[error("Frequency list segment {0:?} has fewer than two points")]
    TooFewPoints(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum MdumpError {
    #[error("Failed to run the event dump program {0}: {1}")]
    SpawnError(String, std::io::Error),
    #[error("Bank {0} has an unreadable length declaration {1:?}")]
    BadLength(String, String),
    #[error("Bank {0} has no length declaration")]
    MissingLength(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Event token {0:?} is too short to decode")]
    ShortToken(String),
    #[error("Event token {0:?} contains invalid hex digits")]
    BadHex(String),
}

#[derive(Debug, Error)]
pub enum EvaWriterError {
    #[error("EvaWriter failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("EvaWriter requires parameter {0} which could not be determined")]
    MissingParameter(&'static str),
    #[error("EvaWriter cannot encode value {0} into a {1} byte field")]
    FieldOverflow(i64, usize),
}

#[derive(Debug, Error)]
pub enum EvaReaderError {
    #[error("EvaReader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("EvaReader found a header length {0} which exceeds the data start {1}")]
    BadHeaderLength(i32, i32),
    #[error("EvaReader found a record of length {0} which matches neither record layout")]
    BadRecordLength(i16),
    #[error("EvaReader could not find the channel count in the header")]
    MissingChannelCount,
    #[error("EvaReader found a frequency table of {0} bytes, which is not a whole number of values")]
    BadFrequencyTable(i64),
}

#[derive(Debug, Error)]
pub enum TextOutputError {
    #[error("Could not open {0:?} for writing: {1}")]
    OpenError(PathBuf, std::io::Error),
    #[error("Failed writing to {0:?}: {1}")]
    WriteError(PathBuf, std::io::Error),
    #[error("Position token {0:?} is malformed")]
    BadPosition(String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{0:?} is not a valid MIDAS file")]
    InvalidInput(PathBuf),
    #[error("Could not open {0:?}: {1}")]
    OpenError(PathBuf, std::io::Error),
    #[error("Processor failed due to ODB error: {0}")]
    OdbError(#[from] OdbError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to mdump error: {0}")]
    MdumpError(#[from] MdumpError),
    #[error("Processor failed due to decode error: {0}")]
    DecodeError(#[from] DecodeError),
    #[error("Processor failed due to EvaWriter error: {0}")]
    EvaError(#[from] EvaWriterError),
    #[error("Processor failed because output directory {0:?} does not exist")]
    BadOutputPath(PathBuf),
    #[error("Processor requires a positive bin width and maximum TOF, got {0} and {1:?}")]
    BadBinning(f64, Option<f64>),
}
