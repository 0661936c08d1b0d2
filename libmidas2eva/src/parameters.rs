use serde::{Deserialize, Serialize};

use super::constants::*;
use super::error::LookupError;
use super::odb::{OdbSnapshot, OdbSnapshots};

/// Values given by the user which take precedence over the ODB.
///
/// Units are the user-facing ones: frequencies in Hz, RF time in seconds,
/// TDC gate width in microseconds. Start and end time are the binary run times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    pub mass: Option<String>,
    pub charge: Option<i32>,
    pub amplitude: Option<f64>,
    pub start_freq: Option<f64>,
    pub stop_freq: Option<f64>,
    pub num_freq_steps: Option<f64>,
    pub rf_time: Option<f64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub tdc_gate_width: Option<f64>,
}

impl Overrides {
    /// Combine two sets of overrides. Values in `other` win.
    pub fn merged_with(&self, other: &Overrides) -> Overrides {
        Overrides {
            mass: other.mass.clone().or_else(|| self.mass.clone()),
            charge: other.charge.or(self.charge),
            amplitude: other.amplitude.or(self.amplitude),
            start_freq: other.start_freq.or(self.start_freq),
            stop_freq: other.stop_freq.or(self.stop_freq),
            num_freq_steps: other.num_freq_steps.or(self.num_freq_steps),
            rf_time: other.rf_time.or(self.rf_time),
            start_time: other.start_time.or(self.start_time),
            end_time: other.end_time.or(self.end_time),
            tdc_gate_width: other.tdc_gate_width.or(self.tdc_gate_width),
        }
    }
}

/// All experiment parameters of one run. None means the value could not be determined.
///
/// Frequencies are in Hz, RF time in seconds, TDC gate width in microseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentParameters {
    pub mass: Option<String>,
    pub charge: Option<i32>,
    pub amplitude: Option<f64>,
    pub start_freq: Option<f64>,
    pub stop_freq: Option<f64>,
    pub num_freq_steps: Option<f64>,
    pub num_cycles: Option<f64>,
    pub rf_time: Option<f64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub tdc_gate_width: Option<f64>,
}

/// Reads every experiment parameter out of the ODB snapshots of one run.
///
/// Values which change during a run (the ramp frequencies, the stop time) come from
/// the post-run snapshot, everything else from the pre-run snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ParameterExtractor<'a> {
    snapshots: &'a OdbSnapshots,
}

impl<'a> ParameterExtractor<'a> {
    pub fn new(snapshots: &'a OdbSnapshots) -> Self {
        Self { snapshots }
    }

    fn pre(&self) -> &'a OdbSnapshot {
        &self.snapshots.pre_run
    }

    fn post(&self) -> &'a OdbSnapshot {
        &self.snapshots.post_run
    }

    /// Extract every parameter, applying the overrides
    pub fn extract(&self, overrides: &Overrides) -> ExperimentParameters {
        ExperimentParameters {
            mass: self.mass(overrides.mass.as_deref()),
            charge: self.charge(overrides.charge),
            amplitude: self.amplitude(overrides.amplitude),
            start_freq: self.start_freq(overrides.start_freq),
            stop_freq: self.stop_freq(overrides.stop_freq),
            num_freq_steps: self.num_freq_steps(overrides.num_freq_steps),
            num_cycles: self.num_cycles(),
            rf_time: self.rf_time(overrides.rf_time),
            start_time: self.start_time(overrides.start_time),
            end_time: self.end_time(overrides.end_time),
            tdc_gate_width: self.tdc_gate_width(overrides.tdc_gate_width),
        }
    }

    pub fn amplitude(&self, amplitude: Option<f64>) -> Option<f64> {
        let value = match amplitude {
            Some(amp) => Some(amp),
            None => determined(
                self.pre()
                    .get_parsed::<f64>(VARIABLES_DEPTH, VARIABLES_DIR, AMPLITUDE_KEY),
                "amplitude",
            ),
        };
        if let Some(amp) = value {
            log::info!("RF amplitude = {amp:?} Volts");
        }
        value
    }

    pub fn start_freq(&self, start_freq: Option<f64>) -> Option<f64> {
        let value = self
            .freq_mhz(start_freq, START_FREQ_KEY, "start frequency")
            .map(|mhz| mhz * HZ_PER_MHZ);
        if let Some(freq) = value {
            log::info!("Start frequency = {freq:?} Hertz");
        }
        value
    }

    pub fn stop_freq(&self, stop_freq: Option<f64>) -> Option<f64> {
        let value = self
            .freq_mhz(stop_freq, STOP_FREQ_KEY, "stop frequency")
            .map(|mhz| mhz * HZ_PER_MHZ);
        if let Some(freq) = value {
            log::info!("Stop frequency = {freq:?} Hertz");
        }
        value
    }

    /// The ODB stores MHz; a given value in Hz is brought to MHz first so both paths
    /// share the same conversion back to Hz.
    fn freq_mhz(&self, hz: Option<f64>, key: &str, what: &str) -> Option<f64> {
        match hz {
            Some(hz) => Some(hz / HZ_PER_MHZ),
            None => determined(
                self.post().get_parsed::<f64>(VARIABLES_DEPTH, VARIABLES_DIR, key),
                what,
            ),
        }
    }

    pub fn num_freq_steps(&self, num_freq_steps: Option<f64>) -> Option<f64> {
        let value = match num_freq_steps {
            Some(n) => Some(n),
            None => determined(
                self.post()
                    .get_parsed::<f64>(SEQUENCER_DEPTH, RAMP_DIR, LOOP_COUNT_KEY),
                "the number of frequency steps",
            ),
        };
        if let Some(n) = value {
            log::info!("Number of frequency steps = {n:?}");
        }
        value
    }

    pub fn num_cycles(&self) -> Option<f64> {
        let value = determined(
            self.pre()
                .get_parsed::<f64>(SEQUENCER_DEPTH, SCAN_DIR, LOOP_COUNT_KEY),
            "the number of cycles",
        );
        if let Some(n) = value {
            log::info!("Number of cycles = {n:?}");
        }
        value
    }

    pub fn start_time(&self, start_time: Option<f64>) -> Option<f64> {
        let value = match start_time {
            Some(t) => Some(t),
            None => determined(
                self.pre()
                    .get_parsed::<f64>(RUNINFO_DEPTH, RUNINFO_DIR, START_TIME_KEY),
                "the start time",
            ),
        };
        if let Some(t) = value {
            log::info!("Start time = {t:?} ({})", format_epoch(t));
        }
        value
    }

    pub fn end_time(&self, end_time: Option<f64>) -> Option<f64> {
        let value = match end_time {
            Some(t) => Some(t),
            None => determined(
                self.post()
                    .get_parsed::<f64>(RUNINFO_DEPTH, RUNINFO_DIR, STOP_TIME_KEY),
                "the end time",
            ),
        };
        if let Some(t) = value {
            log::info!("End time = {t:?} ({})", format_epoch(t));
        }
        value
    }

    pub fn mass(&self, mass: Option<&str>) -> Option<String> {
        let value = match mass {
            Some(m) => Some(m.to_string()),
            None => determined(
                self.pre()
                    .get_string(VARIABLES_DEPTH, VARIABLES_DIR, SPECIES_KEY),
                "element",
            ),
        };
        if let Some(m) = value.as_deref() {
            log::info!("Element = {m}");
        }
        value
    }

    /// The ODB holds a `;` separated list of charge states; the first one is used.
    pub fn charge(&self, charge: Option<i32>) -> Option<i32> {
        let value = match charge {
            Some(z) => Some(z),
            None => determined(
                self.pre()
                    .get_attribute(VARIABLES_DEPTH, VARIABLES_DIR, CHARGE_KEY, first_charge),
                "charge",
            ),
        };
        if let Some(z) = value {
            log::info!("Charge = {z}");
        }
        value
    }

    /// Durations in ms of every quadrupole RF transition: transition_QUAD2, 4, 6, ...
    /// The sequence ends at the first transition which is missing or unreadable.
    pub fn rf_segment_durations(&self) -> impl Iterator<Item = f64> + 'a {
        let snapshot = self.pre();
        (1..)
            .map(|n| format!("{QUAD_TRANSITION_PREFIX}{}", 2 * n))
            .map_while(move |dir| {
                snapshot
                    .get_parsed::<f64>(SEQUENCER_DEPTH, &dir, QUAD_TIME_OFFSET_KEY)
                    .ok()
            })
    }

    /// Total RF time in seconds. A given value is in seconds.
    pub fn rf_time(&self, rf_time: Option<f64>) -> Option<f64> {
        let ms = match rf_time {
            Some(s) => s * MS_PER_S,
            None => self.rf_segment_durations().sum(),
        };
        let seconds = ms / MS_PER_S;
        log::info!("RF Time = {seconds:?} s");
        Some(seconds)
    }

    /// TDC gate width in microseconds. The ODB stores ms, a given value is in us.
    pub fn tdc_gate_width(&self, tdc_gate_width: Option<f64>) -> Option<f64> {
        let value = match tdc_gate_width {
            Some(us) => Some(us),
            None => determined(
                self.pre()
                    .get_parsed::<f64>(SEQUENCER_DEPTH, TDC_GATE_DIR, TDC_GATE_WIDTH_KEY),
                "the TDC gate width",
            )
            .map(|ms| ms * US_PER_MS),
        };
        if let Some(us) = value {
            log::info!("TDC Gate Width = {us:?} us");
        }
        value
    }

    /// The raw sweep descriptor (`Quad FreqList`) from the post-run snapshot
    pub fn freq_list_descriptor(&self) -> Result<String, LookupError> {
        self.post()
            .get_string(VARIABLES_DEPTH, VARIABLES_DIR, FREQ_LIST_KEY)
    }
}

fn determined<T>(result: Result<T, LookupError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Could not determine {what}: {e}");
            None
        }
    }
}

fn first_charge(value: &str) -> Option<i32> {
    let charges = value
        .split(';')
        .map(|z| z.trim().parse::<i32>())
        .collect::<Result<Vec<i32>, _>>()
        .ok()?;
    charges.first().copied()
}

fn format_epoch(seconds: f64) -> String {
    match time::OffsetDateTime::from_unix_timestamp(seconds as i64) {
        Ok(date) => date
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| String::from("invalid date")),
        Err(_) => String::from("invalid date"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_xml(vars: &str, sequencer: &str, runinfo: &str) -> String {
        format!(
            "<odb root=\"/\">\
             <dir name=\"Runinfo\">{runinfo}</dir>\
             <dir name=\"Experiment\"><dir name=\"Variables\">{vars}</dir>\
             <dir name=\"Edit on start\"></dir></dir>\
             <dir name=\"Equipment\"><dir name=\"TITAN_ACQ\"><dir name=\"ppg cycle\">{sequencer}</dir></dir></dir>\
             </odb>"
        )
    }

    fn key(name: &str, value: &str) -> String {
        format!("<key name=\"{name}\" type=\"DOUBLE\">{value}</key>")
    }

    fn sequencer_dir(name: &str, keys: &str) -> String {
        format!("<dir name=\"{name}\">{keys}</dir>")
    }

    fn test_snapshots() -> OdbSnapshots {
        let pre_vars = [
            key("MPETRFAmp", "10.5"),
            key("Species", "1K39"),
            key("Charge", "1; 2; 3"),
            key("StartFreq (MHz)", "0.5"),
            key("EndFreq (MHz)", "0.5"),
        ]
        .concat();
        let post_vars = [
            key("StartFreq (MHz)", "1.0"),
            key("EndFreq (MHz)", "1.0002"),
            key("Quad FreqList", "(1000000, 20, 3)"),
        ]
        .concat();
        let sequencer = |ramp_steps: &str| {
            [
                sequencer_dir("begin_scan", &key("loop count", "25")),
                sequencer_dir("begin_ramp", &key("loop count", ramp_steps)),
                sequencer_dir("transition_QUAD2", &key("time offset (ms)", "100.0")),
                sequencer_dir("transition_QUAD4", &key("time offset (ms)", "100.0")),
                sequencer_dir("transition_QUAD8", &key("time offset (ms)", "500.0")),
                sequencer_dir("pul_TDCGate", &key("pulse width (ms)", "0.1")),
            ]
            .concat()
        };
        let pre = snapshot_xml(
            &pre_vars,
            &sequencer("3"),
            &[key("Start time binary", "0.0"), key("Stop time binary", "0.0")].concat(),
        );
        let post = snapshot_xml(
            &post_vars,
            &sequencer("41"),
            &[key("Start time binary", "0.0"), key("Stop time binary", "30.0")].concat(),
        );
        OdbSnapshots {
            pre_run: OdbSnapshot::parse(&pre).unwrap(),
            post_run: OdbSnapshot::parse(&post).unwrap(),
        }
    }

    #[test]
    fn test_extract_from_snapshots() {
        let snapshots = test_snapshots();
        let params = ParameterExtractor::new(&snapshots).extract(&Overrides::default());
        assert_eq!(params.mass.as_deref(), Some("1K39"));
        assert_eq!(params.charge, Some(1));
        assert_eq!(params.amplitude, Some(10.5));
        // post-run values win for the ramp
        assert_eq!(params.start_freq, Some(1_000_000.0));
        assert_eq!(params.stop_freq, Some(1.0002 * 1e6));
        assert_eq!(params.num_freq_steps, Some(41.0));
        assert_eq!(params.num_cycles, Some(25.0));
        assert_eq!(params.start_time, Some(0.0));
        assert_eq!(params.end_time, Some(30.0));
        assert_eq!(params.tdc_gate_width, Some(100.0));
        // QUAD6 is missing so QUAD8 is never reached
        assert_eq!(params.rf_time, Some(0.2));
    }

    #[test]
    fn test_rf_segments_are_lazy() {
        let snapshots = test_snapshots();
        let extractor = ParameterExtractor::new(&snapshots);
        let segments: Vec<f64> = extractor.rf_segment_durations().collect();
        assert_eq!(segments, vec![100.0, 100.0]);

        let empty = OdbSnapshots::default();
        let extractor = ParameterExtractor::new(&empty);
        assert_eq!(extractor.rf_segment_durations().count(), 0);
        assert_eq!(extractor.rf_time(None), Some(0.0));
    }

    #[test]
    fn test_missing_values_are_none() {
        let empty = OdbSnapshots::default();
        let params = ParameterExtractor::new(&empty).extract(&Overrides::default());
        assert_eq!(params.mass, None);
        assert_eq!(params.charge, None);
        assert_eq!(params.amplitude, None);
        assert_eq!(params.start_freq, None);
        assert_eq!(params.end_time, None);
        assert_eq!(params.tdc_gate_width, None);
        assert!(ParameterExtractor::new(&empty).freq_list_descriptor().is_err());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let snapshots = test_snapshots();
        let overrides = Overrides {
            mass: Some(String::from("1K41")),
            charge: Some(10),
            amplitude: Some(2.0),
            start_freq: Some(2_000_000.0),
            stop_freq: Some(2_000_000.0),
            num_freq_steps: Some(21.0),
            rf_time: Some(0.1),
            start_time: Some(5.0),
            end_time: Some(6.0),
            tdc_gate_width: Some(200.0),
        };
        let params = ParameterExtractor::new(&snapshots).extract(&overrides);
        assert_eq!(params.mass.as_deref(), Some("1K41"));
        assert_eq!(params.charge, Some(10));
        assert_eq!(params.amplitude, Some(2.0));
        assert_eq!(params.start_freq, Some(2_000_000.0));
        assert_eq!(params.stop_freq, Some(2_000_000.0));
        assert_eq!(params.num_freq_steps, Some(21.0));
        assert_eq!(params.rf_time, Some(0.1));
        assert_eq!(params.start_time, Some(5.0));
        assert_eq!(params.end_time, Some(6.0));
        assert_eq!(params.tdc_gate_width, Some(200.0));
    }

    #[test]
    fn test_override_matches_snapshot_quantity() {
        let snapshots = test_snapshots();
        let extractor = ParameterExtractor::new(&snapshots);
        assert_eq!(extractor.start_freq(Some(1_000_000.0)), extractor.start_freq(None));
        assert_eq!(extractor.rf_time(Some(0.2)), extractor.rf_time(None));
        assert_eq!(extractor.tdc_gate_width(Some(100.0)), extractor.tdc_gate_width(None));
    }

    #[test]
    fn test_charge_list() {
        assert_eq!(first_charge("1;2"), Some(1));
        assert_eq!(first_charge(" 3 "), Some(3));
        assert_eq!(first_charge("-1"), Some(-1));
        assert_eq!(first_charge("1;x"), None);
        assert_eq!(first_charge(""), None);
    }

    #[test]
    fn test_merged_overrides() {
        let base = Overrides {
            mass: Some(String::from("1K39")),
            charge: Some(1),
            ..Default::default()
        };
        let cli = Overrides {
            charge: Some(2),
            amplitude: Some(3.0),
            ..Default::default()
        };
        let merged = base.merged_with(&cli);
        assert_eq!(merged.mass.as_deref(), Some("1K39"));
        assert_eq!(merged.charge, Some(2));
        assert_eq!(merged.amplitude, Some(3.0));
    }
}
