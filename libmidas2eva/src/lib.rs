//! # midas2eva
//!
//! midas2eva converts MIDAS run files (.mid) from the TITAN MPET Penning trap into the
//! EVA binary format read by the EVA analysis and visualization tools. Each run file
//! carries two ODB dumps (one written at the start of the run, one at the end) from
//! which the experiment parameters are read, and an event stream of MPET banks which is
//! decoded into time-of-flight histograms, one per measurement cycle.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### mdump
//!
//! The event stream is read with the `mdump` utility which ships with MIDAS. It must
//! either be in your path or be given with the `mdump_program` configuration field.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./midas2eva_cli` from the top
//! level midas2eva repository. The binary will be installed to your cargo install
//! location (typically something like `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! A template configuration can be made with `midas2eva_cli new -p config.yaml`. The YAML
//! format of a configuration file is as follows:
//!
//! ```yml
//! input_files:
//! - /data/mpet/run04221.mid
//! output_path: /data/mpet/eva
//! mdump_program: mdump
//! bank: MPET
//! bin_width: 0.1
//! max_tof: null
//! write_dump: true
//! write_positions: true
//! write_sda: false
//! overrides:
//!   mass: null
//!   charge: null
//!   amplitude: null
//!   start_freq: null
//!   stop_freq: null
//!   num_freq_steps: null
//!   rf_time: null
//!   start_time: null
//!   end_time: null
//!   tdc_gate_width: null
//! ```
//!
//! `bin_width` and `max_tof` are in microseconds. If `max_tof` is `null` the TDC gate
//! width of the run is used. Any value in `overrides` replaces the value read from the
//! ODB: frequencies are in Hz, `rf_time` in seconds and `tdc_gate_width` in
//! microseconds. Overrides given on the command line replace the ones in the file.
//!
//! ## Output
//!
//! For a run file `run04221.mid`, midas2eva writes into `output_path`:
//!
//! - `run04221_eva.dat`: the EVA file
//! - `run04221_pos.dat`: one `x y` line per MCP position (only if there are positions)
//! - `run04221_dump.dat`: every raw MPET word, one per line
//! - `run04221_err.dat`: every anomalous event word (only if there are any)
//! - `run04221_se_test.dat`: the histograms as `cycle bin count` lines for the
//! simplified 1D analysis (only if `write_sda` is set)
//!
//! ### EVA Format
//!
//! All values are little-endian.
//!
//! ```text
//! i32 header length | i32 offset of first cycle record
//! header text: [Mass] [Switch] [Excit] [MCA] [SCAN0] [SCAN1] sections, then
//!   *---------------here the binary part begins---------------*
//! i32 frequency steps | f64 frequency ... | i32 1 | f64 0
//! per cycle: i16 record length | i32 start time | counts
//! ```
//!
//! A cycle record holds either a count for every channel (dense) or `(bin, count)`
//! pairs for the occupied bins (sparse), whichever the occupancy favors.
pub mod binner;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod eva;
pub mod frequency;
pub mod mdump;
pub mod odb;
pub mod parameters;
pub mod process;
pub mod text_output;
