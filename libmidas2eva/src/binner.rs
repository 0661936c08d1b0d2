use std::collections::BTreeMap;

use super::decoder::{DecodedEvent, EventKind};

/// Sparse time-of-flight histogram of one cycle: bin index -> count.
///
/// Only occupied bins are stored, in ascending bin order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleHistogram {
    counts: BTreeMap<usize, u32>,
}

impl CycleHistogram {
    pub fn from_bins(bins: &[usize]) -> Self {
        let mut hist = Self::default();
        for bin in bins {
            hist.add(*bin, 1);
        }
        hist
    }

    pub fn add(&mut self, bin: usize, count: u32) {
        if count > 0 {
            *self.counts.entry(bin).or_insert(0) += count;
        }
    }

    pub fn get(&self, bin: usize) -> u32 {
        self.counts.get(&bin).copied().unwrap_or(0)
    }

    /// Number of occupied bins
    pub fn occupied(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|c| *c as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.counts.iter().map(|(bin, count)| (*bin, *count))
    }
}

impl FromIterator<(usize, u32)> for CycleHistogram {
    fn from_iter<I: IntoIterator<Item = (usize, u32)>>(iter: I) -> Self {
        let mut hist = Self::default();
        for (bin, count) in iter {
            hist.add(bin, count);
        }
        hist
    }
}

/// The binned time-of-flight data of a run: one bin list per completed cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinnedData {
    pub cycles: Vec<Vec<usize>>,
    pub num_channels: usize,
    /// Bin width in us
    pub bin_width: f64,
}

impl BinnedData {
    pub fn histograms(&self) -> Vec<CycleHistogram> {
        self.cycles
            .iter()
            .map(|bins| CycleHistogram::from_bins(bins))
            .collect()
    }
}

/// CycleBinner splits the decoded event stream into cycles and bins the time of flight.
///
/// A cycle is closed by a gate end. Gate starts and out-of-gate ions are skipped, as are
/// raw timestamps. Every other event with a time of flight below the maximum adds its
/// bin to the open cycle. A cycle still open at the end of the stream never saw its
/// gate end and is dropped.
#[derive(Debug, Clone, Copy)]
pub struct CycleBinner {
    bin_width: f64,
    max_tof: f64,
}

impl CycleBinner {
    /// `bin_width` and `max_tof` in us
    pub fn new(bin_width: f64, max_tof: f64) -> Self {
        Self { bin_width, max_tof }
    }

    pub fn num_channels(&self) -> usize {
        (self.max_tof / self.bin_width) as usize
    }

    /// The bin of a time of flight, if it is inside the histogram range
    pub fn bin_index(&self, tof: f64) -> Option<usize> {
        if tof.is_nan() || tof >= self.max_tof || tof < 0.0 {
            return None;
        }
        let bin = (tof / self.bin_width).floor() as usize;
        (bin < self.num_channels()).then_some(bin)
    }

    pub fn bin(&self, events: &[DecodedEvent]) -> BinnedData {
        let mut cycles: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for event in events {
            match event.kind {
                EventKind::GateStart | EventKind::OutOfGate | EventKind::Timestamp => (),
                EventKind::GateEnd => cycles.push(std::mem::take(&mut current)),
                EventKind::InGate | EventKind::Other(_) => {
                    if let Some(bin) = self.bin_index(event.tof) {
                        current.push(bin);
                    }
                }
            }
        }
        if !current.is_empty() {
            log::warn!(
                "Dropping {} hits of a final cycle which was never closed by a gate end",
                current.len()
            );
        }
        log::info!("Binned {} completed cycles", cycles.len());

        BinnedData {
            cycles,
            num_channels: self.num_channels(),
            bin_width: self.bin_width,
        }
    }
}
