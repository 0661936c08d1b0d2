//! The EVA binary format.
//!
//! ```text
//! i32  header length (bytes of header text)
//! i32  offset of the first cycle record
//! ...  header text ([Mass], [Switch], [Excit], [MCA], [SCAN0], [SCAN1], end marker)
//! i32  number of frequency steps
//! f64  one per applied frequency
//! i32  1
//! f64  0
//! per cycle:
//!   i16  record length (bytes following this field)
//!   i32  cycle start time
//!   dense:  i16 count for every channel
//!   sparse: (i16 bin, i16 count) for every occupied bin
//! ```
//!
//! Everything is little-endian. A cycle is written dense when fewer than half of the
//! channels are empty, otherwise sparse.
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::binner::{BinnedData, CycleHistogram};
use super::constants::*;
use super::error::{EvaReaderError, EvaWriterError};
use super::parameters::ExperimentParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEncoding {
    Dense,
    Sparse,
}

impl RecordEncoding {
    /// Depends only on how many bins are occupied
    pub fn choose(occupied: usize, num_channels: usize) -> Self {
        let empty = num_channels.saturating_sub(occupied);
        if empty < num_channels / 2 {
            Self::Dense
        } else {
            Self::Sparse
        }
    }
}

/// Render a float in the header. Always carries a decimal point.
pub fn format_float(value: f64) -> String {
    format!("{value:?}")
}

/// Render a value which may be unknown in the header
pub fn format_known(value: Option<f64>) -> String {
    value
        .map(format_float)
        .unwrap_or_else(|| String::from(UNKNOWN_VALUE))
}

/// Start time of every cycle, spreading the run time evenly over the cycles
pub fn cycle_start_times(start_time: f64, end_time: f64, n_cycles: usize) -> Vec<f64> {
    let dtime = (end_time - start_time) / n_cycles as f64;
    (0..n_cycles)
        .map(|i| start_time + i as f64 * dtime)
        .collect()
}

/// Encode one cycle record, including its leading length field
pub fn encode_record(
    histogram: &CycleHistogram,
    num_channels: usize,
    start_time: i32,
) -> Result<Vec<u8>, EvaWriterError> {
    let encoding = RecordEncoding::choose(histogram.occupied(), num_channels);
    let payload_len = match encoding {
        RecordEncoding::Dense => num_channels * EVA_DENSE_BYTES_PER_CHANNEL,
        RecordEncoding::Sparse => histogram.occupied() * EVA_SPARSE_BYTES_PER_BIN,
    };
    let mut record: Vec<u8> = Vec::with_capacity(payload_len + EVA_RECORD_PREAMBLE_SIZE + 2);
    record.write_i16::<LittleEndian>(to_i16(payload_len + EVA_RECORD_PREAMBLE_SIZE)?)?;
    record.write_i32::<LittleEndian>(start_time)?;
    match encoding {
        RecordEncoding::Dense => {
            for channel in 0..num_channels {
                record.write_i16::<LittleEndian>(to_i16(histogram.get(channel) as usize)?)?;
            }
        }
        RecordEncoding::Sparse => {
            for (bin, count) in histogram.iter() {
                record.write_i16::<LittleEndian>(to_i16(bin)?)?;
                record.write_i16::<LittleEndian>(to_i16(count as usize)?)?;
            }
        }
    }
    Ok(record)
}

fn to_i16(value: usize) -> Result<i16, EvaWriterError> {
    i16::try_from(value).map_err(|_| EvaWriterError::FieldOverflow(value as i64, 2))
}

fn to_i32(value: u64) -> Result<i32, EvaWriterError> {
    i32::try_from(value).map_err(|_| EvaWriterError::FieldOverflow(value as i64, 4))
}

fn require(value: Option<f64>, name: &'static str) -> Result<f64, EvaWriterError> {
    value.ok_or(EvaWriterError::MissingParameter(name))
}

/// Writes the binned data of one run to the EVA format
#[derive(Debug, Clone, Copy)]
pub struct EvaWriter<'a> {
    params: &'a ExperimentParameters,
    frequencies: &'a [f64],
    bin_width: f64,
    num_channels: usize,
}

impl<'a> EvaWriter<'a> {
    pub fn new(
        params: &'a ExperimentParameters,
        frequencies: &'a [f64],
        binned: &BinnedData,
    ) -> Self {
        Self {
            params,
            frequencies,
            bin_width: binned.bin_width,
            num_channels: binned.num_channels,
        }
    }

    /// The header text. The time unit carries a latin-1 micro sign, so this is bytes.
    pub fn header_text(&self) -> Result<Vec<u8>, EvaWriterError> {
        let start = require(self.params.start_freq, "start frequency")?;
        let stop = require(self.params.stop_freq, "stop frequency")?;
        let steps = require(self.params.num_freq_steps, "number of frequency steps")?;
        let mass = self.params.mass.as_deref().unwrap_or(UNKNOWN_VALUE);
        let charge = self
            .params
            .charge
            .map(|z| z.to_string())
            .unwrap_or_else(|| String::from(UNKNOWN_VALUE));

        let mut text: Vec<u8> = Vec::new();
        write!(text, "\n\n[Mass]\n Mass={mass} ,Charge= {charge}\n\n")?;
        write!(text, "[Switch]\n NrCycles=-1\n\n")?;
        write!(
            text,
            "[Excit]\n Mass={mass} ,Charge= {charge},Freq ={}, Amp= {},Time={}\n\n",
            format_float((stop - start) / 2.0),
            format_known(self.params.amplitude),
            format_known(self.params.rf_time),
        )?;
        write!(
            text,
            "[MCA]\n MCA=sim,TimePerChannel={}",
            format_float(self.bin_width)
        )?;
        text.push(EVA_MICRO_SIGN);
        write!(text, "s,Channels= {},Pipse=   0\n\n", self.num_channels)?;
        write!(
            text,
            "[SCAN0]\n Dev=AFG, Fct=SetFrequency, Spec=,\n Start={}, Stop={}, Step={}, Unit=Hz\n\n",
            format_float(start),
            format_float(stop),
            format_float((stop - start) / steps),
        )?;
        write!(
            text,
            "[SCAN1]\n Dev=*, Fct=*, Spec=,\n Start=0.000000, Stop=0.000000, Step=1.000000, Unit=1\n\n"
        )?;
        text.extend_from_slice(EVA_BINARY_MARKER.as_bytes());
        Ok(text)
    }

    /// Write the full file. Offsets are relative to the position `out` starts at.
    pub fn write<W: Write + Seek>(
        &self,
        out: &mut W,
        histograms: &[CycleHistogram],
    ) -> Result<(), EvaWriterError> {
        let steps = require(self.params.num_freq_steps, "number of frequency steps")?;
        let header = self.header_text()?;
        let base = out.stream_position()?;

        // placeholders for the header length and the data start
        out.write_i32::<LittleEndian>(1)?;
        out.write_i32::<LittleEndian>(2)?;
        out.write_all(&header)?;
        let header_len = out.stream_position()? - base - EVA_PREAMBLE_SIZE;
        out.seek(SeekFrom::Start(base + EVA_HEADER_LENGTH_OFFSET))?;
        out.write_i32::<LittleEndian>(to_i32(header_len)?)?;
        out.seek(SeekFrom::End(0))?;

        out.write_i32::<LittleEndian>(steps as i32)?;
        for freq in self.frequencies {
            out.write_f64::<LittleEndian>(*freq)?;
        }
        out.write_i32::<LittleEndian>(EVA_TRAILER_INT)?;
        out.write_f64::<LittleEndian>(EVA_TRAILER_FLOAT)?;

        let data_start = out.stream_position()? - base;
        out.seek(SeekFrom::Start(base + EVA_DATA_START_OFFSET))?;
        out.write_i32::<LittleEndian>(to_i32(data_start)?)?;
        out.seek(SeekFrom::Start(base + data_start))?;

        if histograms.is_empty() {
            log::warn!("No completed cycles; EVA file has no cycle records");
            return Ok(());
        }
        let start_time = require(self.params.start_time, "start time")?;
        let end_time = require(self.params.end_time, "end time")?;
        let times = cycle_start_times(start_time, end_time, histograms.len());
        for (histogram, time) in histograms.iter().zip(times) {
            out.write_all(&encode_record(histogram, self.num_channels, time as i32)?)?;
        }
        Ok(())
    }

    fn check_parameters(&self, histograms: &[CycleHistogram]) -> Result<(), EvaWriterError> {
        require(self.params.start_freq, "start frequency")?;
        require(self.params.stop_freq, "stop frequency")?;
        require(self.params.num_freq_steps, "number of frequency steps")?;
        if !histograms.is_empty() {
            require(self.params.start_time, "start time")?;
            require(self.params.end_time, "end time")?;
        }
        Ok(())
    }

    /// Write to a file, returning its size in bytes. The file is not created when a
    /// required parameter is unknown.
    pub fn write_file(
        &self,
        path: &Path,
        histograms: &[CycleHistogram],
    ) -> Result<u64, EvaWriterError> {
        self.check_parameters(histograms)?;
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer, histograms)?;
        writer.flush()?;
        let size = writer.get_ref().metadata()?.len();
        log::info!(
            "Wrote {} cycles to {} ({})",
            histograms.len(),
            path.to_string_lossy(),
            human_bytes::human_bytes(size as f64)
        );
        Ok(size)
    }
}

/// One cycle record read back from an EVA file
#[derive(Debug, Clone, PartialEq)]
pub struct EvaRecord {
    pub start_time: i32,
    pub encoding: RecordEncoding,
    pub histogram: CycleHistogram,
    /// The dense reading of a record which is also a valid sparse record. `histogram`
    /// then holds the sparse reading.
    pub dense_reading: Option<CycleHistogram>,
}

impl EvaRecord {
    /// Whether the record reads validly as both dense and sparse
    pub fn is_ambiguous(&self) -> bool {
        self.dense_reading.is_some()
    }

    /// Every valid reading of the record, the preferred one first
    pub fn readings(&self) -> impl Iterator<Item = (RecordEncoding, &CycleHistogram)> {
        std::iter::once((self.encoding, &self.histogram)).chain(
            self.dense_reading
                .iter()
                .map(|hist| (RecordEncoding::Dense, hist)),
        )
    }
}

/// The content of an EVA file
#[derive(Debug, Clone, PartialEq)]
pub struct EvaFile {
    pub header: Vec<u8>,
    pub data_start: i32,
    pub num_channels: usize,
    pub num_freq_steps: i32,
    pub frequencies: Vec<f64>,
    pub records: Vec<EvaRecord>,
}

impl EvaFile {
    pub fn read_file(path: &Path) -> Result<Self, EvaReaderError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read(&mut reader)
    }

    /// Parse an EVA file. Offsets are relative to the position `input` starts at.
    ///
    /// With an even channel count a sparse record holding exactly half the channels has
    /// the same length as a dense record. When such a record is also a valid ascending
    /// (bin, count) list it is read as sparse, a warning is logged and the dense reading
    /// is kept in [`EvaRecord::dense_reading`].
    pub fn read<R: Read + Seek>(input: &mut R) -> Result<Self, EvaReaderError> {
        let base = input.stream_position()?;
        let header_len = input.read_i32::<LittleEndian>()?;
        let data_start = input.read_i32::<LittleEndian>()?;
        let table_start = header_len as i64 + EVA_PREAMBLE_SIZE as i64;
        // step count, then at least the trailer
        if header_len < 0 || table_start + 4 + 12 > data_start as i64 {
            return Err(EvaReaderError::BadHeaderLength(header_len, data_start));
        }

        let mut header = vec![0u8; header_len as usize];
        input.read_exact(&mut header)?;
        let num_channels =
            parse_channel_count(&header).ok_or(EvaReaderError::MissingChannelCount)?;

        let num_freq_steps = input.read_i32::<LittleEndian>()?;
        let table_bytes = data_start as i64 - table_start - 4 - 12;
        if table_bytes % 8 != 0 {
            return Err(EvaReaderError::BadFrequencyTable(table_bytes));
        }
        let mut frequencies = Vec::with_capacity((table_bytes / 8) as usize);
        for _ in 0..(table_bytes / 8) {
            frequencies.push(input.read_f64::<LittleEndian>()?);
        }

        input.seek(SeekFrom::Start(base + data_start as u64))?;
        let mut records = Vec::new();
        loop {
            let record_len = match input.read_i16::<LittleEndian>() {
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            if record_len < EVA_RECORD_PREAMBLE_SIZE as i16 {
                return Err(EvaReaderError::BadRecordLength(record_len));
            }
            let start_time = input.read_i32::<LittleEndian>()?;
            let mut payload = vec![0u8; record_len as usize - EVA_RECORD_PREAMBLE_SIZE];
            input.read_exact(&mut payload)?;
            let record = decode_record(start_time, &payload, num_channels)
                .ok_or(EvaReaderError::BadRecordLength(record_len))?;
            if record.is_ambiguous() {
                log::warn!(
                    "Record {} (start time {start_time}) reads as both dense and sparse; using the sparse reading",
                    records.len()
                );
            }
            records.push(record);
        }

        Ok(Self {
            header,
            data_start,
            num_channels,
            num_freq_steps,
            frequencies,
            records,
        })
    }

    /// The header as text, decoding latin-1
    pub fn header_text(&self) -> String {
        self.header.iter().map(|b| *b as char).collect()
    }
}

fn parse_channel_count(header: &[u8]) -> Option<usize> {
    let marker = b"Channels= ";
    let at = header
        .windows(marker.len())
        .position(|window| window == marker)?
        + marker.len();
    let digits: String = header[at..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|b| *b as char)
        .collect();
    digits.parse().ok()
}

fn decode_record(start_time: i32, payload: &[u8], num_channels: usize) -> Option<EvaRecord> {
    let words: Vec<u16> = payload
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect();
    let record = |encoding, histogram, dense_reading| EvaRecord {
        start_time,
        encoding,
        histogram,
        dense_reading,
    };

    if payload.len() == num_channels * EVA_DENSE_BYTES_PER_CHANNEL {
        let dense: CycleHistogram = words
            .iter()
            .enumerate()
            .map(|(bin, count)| (bin, *count as u32))
            .collect();
        let sparse = if payload.len() % EVA_SPARSE_BYTES_PER_BIN == 0 {
            decode_sparse(&words, num_channels)
        } else {
            None
        };
        return match sparse {
            Some(sparse) => Some(record(RecordEncoding::Sparse, sparse, Some(dense))),
            None => Some(record(RecordEncoding::Dense, dense, None)),
        };
    }
    if payload.len() % EVA_SPARSE_BYTES_PER_BIN == 0 {
        return decode_sparse(&words, num_channels)
            .map(|sparse| record(RecordEncoding::Sparse, sparse, None));
    }
    None
}

fn decode_sparse(words: &[u16], num_channels: usize) -> Option<CycleHistogram> {
    let mut last: Option<usize> = None;
    let mut hist = CycleHistogram::default();
    for pair in words.chunks_exact(2) {
        let (bin, count) = (pair[0] as usize, pair[1] as u32);
        if bin >= num_channels || count == 0 || last.is_some_and(|l| bin <= l) {
            return None;
        }
        hist.add(bin, count);
        last = Some(bin);
    }
    Some(hist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn params() -> ExperimentParameters {
        ExperimentParameters {
            mass: Some(String::from("1K39")),
            charge: Some(1),
            amplitude: Some(10.5),
            start_freq: Some(1_000_000.0),
            stop_freq: Some(1_000_200.0),
            num_freq_steps: Some(3.0),
            num_cycles: None,
            rf_time: Some(0.2),
            start_time: Some(0.0),
            end_time: Some(30.0),
            tdc_gate_width: Some(100.0),
        }
    }

    fn binned(num_channels: usize) -> BinnedData {
        BinnedData {
            cycles: Vec::new(),
            num_channels,
            bin_width: 0.1,
        }
    }

    #[test]
    fn test_encoding_choice() {
        assert_eq!(RecordEncoding::choose(0, 1000), RecordEncoding::Sparse);
        assert_eq!(RecordEncoding::choose(500, 1000), RecordEncoding::Sparse);
        assert_eq!(RecordEncoding::choose(501, 1000), RecordEncoding::Dense);
        assert_eq!(RecordEncoding::choose(3, 5), RecordEncoding::Dense);
        assert_eq!(RecordEncoding::choose(2, 5), RecordEncoding::Sparse);
    }

    #[test]
    fn test_header_text() {
        let p = params();
        let freqs = [1.0];
        let data = binned(1000);
        let writer = EvaWriter::new(&p, &freqs, &data);
        let header = writer.header_text().unwrap();
        let text: String = header.iter().map(|b| *b as char).collect();
        assert!(text.starts_with("\n\n[Mass]\n Mass=1K39 ,Charge= 1\n\n[Switch]\n NrCycles=-1\n\n"));
        assert!(text.contains("[Excit]\n Mass=1K39 ,Charge= 1,Freq =100.0, Amp= 10.5,Time=0.2\n\n"));
        assert!(text.contains("[MCA]\n MCA=sim,TimePerChannel=0.1\u{b5}s,Channels= 1000,Pipse=   0\n\n"));
        assert!(text.contains(" Start=1000000.0, Stop=1000200.0, Step=66.66666666666667, Unit=Hz\n\n"));
        assert!(text.ends_with(EVA_BINARY_MARKER));
    }

    #[test]
    fn test_unknown_header_values() {
        let mut p = params();
        p.mass = None;
        p.charge = None;
        p.amplitude = None;
        let freqs = [1.0];
        let data = binned(10);
        let header = EvaWriter::new(&p, &freqs, &data).header_text().unwrap();
        let text: String = header.iter().map(|b| *b as char).collect();
        assert!(text.contains("Mass=-1 ,Charge= -1,Freq =100.0, Amp= -1,"));

        p.start_freq = None;
        assert!(matches!(
            EvaWriter::new(&p, &freqs, &data).header_text(),
            Err(EvaWriterError::MissingParameter("start frequency"))
        ));
    }

    #[test]
    fn test_layout() {
        let p = params();
        let freqs = [999_980.0, 1_000_000.0, 1_000_020.0];
        let data = binned(1000);
        let writer = EvaWriter::new(&p, &freqs, &data);
        let hists: Vec<CycleHistogram> = (0..3).map(|_| CycleHistogram::from_bins(&[50])).collect();
        let mut out = Cursor::new(Vec::new());
        writer.write(&mut out, &hists).unwrap();
        let bytes = out.into_inner();

        let header_len = writer.header_text().unwrap().len();
        let mut rdr = Cursor::new(&bytes);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap() as usize, header_len);
        let data_start = rdr.read_i32::<LittleEndian>().unwrap() as usize;
        assert_eq!(data_start, 8 + header_len + 4 + 3 * 8 + 4 + 8);

        rdr.set_position((8 + header_len) as u64);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 3);
        assert_eq!(rdr.read_f64::<LittleEndian>().unwrap(), 999_980.0);
        rdr.set_position((data_start - 12) as u64);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 1);
        assert_eq!(rdr.read_f64::<LittleEndian>().unwrap(), 0.0);

        // three sparse records of one bin each
        let mut times = Vec::new();
        for _ in 0..3 {
            assert_eq!(rdr.read_i16::<LittleEndian>().unwrap(), 8);
            times.push(rdr.read_i32::<LittleEndian>().unwrap());
            assert_eq!(rdr.read_i16::<LittleEndian>().unwrap(), 50);
            assert_eq!(rdr.read_i16::<LittleEndian>().unwrap(), 1);
        }
        assert_eq!(times, vec![0, 10, 20]);
        assert_eq!(rdr.position() as usize, bytes.len());
    }

    #[test]
    fn test_dense_record() {
        let hist: CycleHistogram = [(0, 2), (1, 1), (3, 7)].into_iter().collect();
        let record = encode_record(&hist, 4, 42).unwrap();
        let mut rdr = Cursor::new(&record);
        assert_eq!(rdr.read_i16::<LittleEndian>().unwrap(), 4 * 2 + 4);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 42);
        let counts: Vec<i16> = (0..4).map(|_| rdr.read_i16::<LittleEndian>().unwrap()).collect();
        assert_eq!(counts, vec![2, 1, 0, 7]);
    }

    #[test]
    fn test_overflow() {
        let hist: CycleHistogram = [(0, 40_000)].into_iter().collect();
        assert!(matches!(
            encode_record(&hist, 100, 0),
            Err(EvaWriterError::FieldOverflow(40_000, 2))
        ));
    }

    #[test]
    fn test_round_trip() {
        let p = params();
        let freqs = [999_980.0, 1_000_000.0, 1_000_020.0];
        let data = binned(6);
        let hists = vec![
            [(0, 1), (1, 2), (2, 3), (5, 4)].into_iter().collect::<CycleHistogram>(),
            [(4, 9)].into_iter().collect(),
            CycleHistogram::default(),
        ];
        let mut out = Cursor::new(Vec::new());
        EvaWriter::new(&p, &freqs, &data).write(&mut out, &hists).unwrap();
        out.set_position(0);
        let file = EvaFile::read(&mut out).unwrap();
        assert_eq!(file.num_channels, 6);
        assert_eq!(file.num_freq_steps, 3);
        assert_eq!(file.frequencies, freqs.to_vec());
        assert!(file.header_text().contains("[SCAN1]"));
        let encodings: Vec<RecordEncoding> = file.records.iter().map(|r| r.encoding).collect();
        assert_eq!(
            encodings,
            vec![RecordEncoding::Dense, RecordEncoding::Sparse, RecordEncoding::Sparse]
        );
        let read: Vec<CycleHistogram> = file.records.into_iter().map(|r| r.histogram).collect();
        assert_eq!(read, hists);
    }

    #[test]
    fn test_no_cycles() {
        let mut p = params();
        p.start_time = None;
        let freqs = [1.0];
        let data = binned(10);
        let mut out = Cursor::new(Vec::new());
        EvaWriter::new(&p, &freqs, &data).write(&mut out, &[]).unwrap();
        out.set_position(0);
        assert!(EvaFile::read(&mut out).unwrap().records.is_empty());

        let mut out = Cursor::new(Vec::new());
        let hists = [CycleHistogram::default()];
        assert!(matches!(
            EvaWriter::new(&p, &freqs, &data).write(&mut out, &hists),
            Err(EvaWriterError::MissingParameter("start time"))
        ));
    }

    #[test]
    fn test_half_occupied_is_ambiguous() {
        let hist: CycleHistogram = [(1, 3), (2, 5)].into_iter().collect();
        let record = encode_record(&hist, 4, 7).unwrap();
        assert_eq!(record.len(), 2 + 4 + 4 * 2);
        let read = decode_record(7, &record[6..], 4).unwrap();
        assert_eq!(read.encoding, RecordEncoding::Sparse);
        assert_eq!(read.histogram, hist);
        let dense: CycleHistogram = [(0, 1), (1, 3), (2, 2), (3, 5)].into_iter().collect();
        assert_eq!(read.dense_reading, Some(dense));
    }

    #[test]
    fn test_even_channel_dense_records() {
        let p = params();
        let freqs = [1.0];
        let data = binned(4);
        // even-indexed counts 0, 1 ascend, so this also reads as sparse {0: 1, 1: 1}
        let ascending: CycleHistogram = [(1, 1), (2, 1), (3, 1)].into_iter().collect();
        let descending: CycleHistogram = [(0, 2), (1, 1), (3, 1)].into_iter().collect();
        let mut out = Cursor::new(Vec::new());
        EvaWriter::new(&p, &freqs, &data)
            .write(&mut out, &[ascending.clone(), descending.clone()])
            .unwrap();
        out.set_position(0);
        let file = EvaFile::read(&mut out).unwrap();

        let first = &file.records[0];
        assert!(first.is_ambiguous());
        let sparse: CycleHistogram = [(0, 1), (1, 1)].into_iter().collect();
        assert_eq!(first.histogram, sparse);
        assert!(first
            .readings()
            .any(|(encoding, hist)| encoding == RecordEncoding::Dense && *hist == ascending));

        let second = &file.records[1];
        assert!(!second.is_ambiguous());
        assert_eq!(second.encoding, RecordEncoding::Dense);
        assert_eq!(second.histogram, descending);
    }

    #[test]
    fn test_cycle_times() {
        assert_eq!(cycle_start_times(0.0, 30.0, 3), vec![0.0, 10.0, 20.0]);
        assert_eq!(cycle_start_times(100.0, 100.0, 2), vec![100.0, 100.0]);
        assert!(cycle_start_times(0.0, 1.0, 0).is_empty());
    }

    proptest! {
        #[test]
        fn records_round_trip(
            num_channels in 64usize..257,
            bins in proptest::collection::vec((0usize..256, 1u32..1000), 0..256),
        ) {
            let hist: CycleHistogram = bins
                .into_iter()
                .filter(|(bin, _)| *bin < num_channels)
                .collect();
            let p = params();
            let freqs = [1.0];
            let data = binned(num_channels);
            let writer = EvaWriter::new(&p, &freqs, &data);

            let first = encode_record(&hist, num_channels, 0);
            prop_assume!(first.is_ok());
            // same occupancy, same bytes
            prop_assert_eq!(first.unwrap(), encode_record(&hist, num_channels, 0).unwrap());

            let mut out = Cursor::new(Vec::new());
            writer.write(&mut out, std::slice::from_ref(&hist)).unwrap();
            out.set_position(0);
            let file = EvaFile::read(&mut out).unwrap();
            prop_assert_eq!(file.records.len(), 1);
            let record = &file.records[0];
            let encoding = RecordEncoding::choose(hist.occupied(), num_channels);
            if record.is_ambiguous() {
                // only possible when a sparse record has the dense length
                prop_assert_eq!(num_channels % 2, 0);
                prop_assert!(record.readings().any(|reading| reading == (encoding, &hist)));
            } else {
                prop_assert_eq!(record.encoding, encoding);
                prop_assert_eq!(&record.histogram, &hist);
            }
        }
    }
}
