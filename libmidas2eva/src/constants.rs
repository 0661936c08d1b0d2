// ODB dump markers inside a .mid file
pub const ODB_START_MARKER: &[u8] = b"<odb";
pub const ODB_END_MARKER: &[u8] = b"</odb>";
pub const MIDAS_EXTENSION: &str = "mid";

// ODB locations, given as (depth, directory, key)
pub const VARIABLES_DEPTH: usize = 2;
pub const VARIABLES_DIR: &str = "Variables";
pub const SEQUENCER_DEPTH: usize = 4;
pub const RUNINFO_DEPTH: usize = 1;
pub const RUNINFO_DIR: &str = "Runinfo";

pub const AMPLITUDE_KEY: &str = "MPETRFAmp";
pub const START_FREQ_KEY: &str = "StartFreq (MHz)";
pub const STOP_FREQ_KEY: &str = "EndFreq (MHz)";
pub const SPECIES_KEY: &str = "Species";
pub const CHARGE_KEY: &str = "Charge";
pub const FREQ_LIST_KEY: &str = "Quad FreqList";
pub const RAMP_DIR: &str = "begin_ramp";
pub const SCAN_DIR: &str = "begin_scan";
pub const LOOP_COUNT_KEY: &str = "loop count";
pub const START_TIME_KEY: &str = "Start time binary";
pub const STOP_TIME_KEY: &str = "Stop time binary";
pub const QUAD_TRANSITION_PREFIX: &str = "transition_QUAD";
pub const QUAD_TIME_OFFSET_KEY: &str = "time offset (ms)";
pub const TDC_GATE_DIR: &str = "pul_TDCGate";
pub const TDC_GATE_WIDTH_KEY: &str = "pulse width (ms)";

// Unit conversions
pub const HZ_PER_MHZ: f64 = 1.0e6;
pub const MS_PER_S: f64 = 1000.0;
pub const US_PER_MS: f64 = 1000.0;

// mdump output
pub const EVENT_BANK_MARKER: &str = "Bank:MPET";
pub const POSITION_BANK_MARKER: &str = "Bank:MCPP";
pub const BANK_LENGTH_MARKER: &str = "Length: ";
pub const BANK_LENGTH_FIELD_WIDTH: usize = 10;
pub const BYTES_PER_ENTRY: usize = 4;
pub const TOKEN_PREFIX: &str = "0x";
pub const TOKEN_WIDTH: usize = 10; // 0x + 8 hex digits

// Event word layout
pub const TOF_UNIT_US: f64 = 0.01;
pub const KIND_DIGIT: usize = 2;
pub const CYCLE_DIGITS: std::ops::Range<usize> = 3..6;
pub const PAYLOAD_DIGITS_START: usize = 2;
pub const POSITION_X_DIGITS: std::ops::Range<usize> = 6..8;
pub const POSITION_Y_DIGITS: std::ops::Range<usize> = 8..10;

// Binning defaults, in us
pub const DEFAULT_BIN_WIDTH: f64 = 0.1;
pub const DEFAULT_MAX_TOF: f64 = 100.0;

// Output suffixes
pub const EVA_SUFFIX: &str = "_eva.dat";
pub const POSITION_SUFFIX: &str = "_pos.dat";
pub const DUMP_SUFFIX: &str = "_dump.dat";
pub const ERROR_SUFFIX: &str = "_err.dat";
pub const SDA_SUFFIX: &str = "_se_test.dat";

// EVA layout
pub const EVA_PREAMBLE_SIZE: u64 = 8;
pub const EVA_HEADER_LENGTH_OFFSET: u64 = 0;
pub const EVA_DATA_START_OFFSET: u64 = 4;
pub const EVA_BINARY_MARKER: &str = "*---------------here the binary part begins---------------*\n";
pub const EVA_MICRO_SIGN: u8 = 0xB5; // latin-1
pub const EVA_RECORD_PREAMBLE_SIZE: usize = 4;
pub const EVA_DENSE_BYTES_PER_CHANNEL: usize = 2;
pub const EVA_SPARSE_BYTES_PER_BIN: usize = 4;
pub const EVA_TRAILER_INT: i32 = 1;
pub const EVA_TRAILER_FLOAT: f64 = 0.0;
/// Rendered in the header for any value that could not be determined
pub const UNKNOWN_VALUE: &str = "-1";
