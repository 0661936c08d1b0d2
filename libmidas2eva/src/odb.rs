//! The MIDAS online database (ODB) dumps embedded in a .mid file.
//!
//! A .mid file carries the ODB twice as XML: once at begin-of-run and once at
//! end-of-run. Some values (stop time, the frequencies of the last ramp) are only
//! correct in the second dump, so both are kept and the parameter extraction picks
//! the right one per value.
//!
//! The dumps are located by the first and last occurrence of the `<odb` and `</odb>`
//! markers. This is not nesting aware and assumes exactly two dumps are present; a
//! file with a third dump in the middle would have it silently ignored.
use std::str::FromStr;

use fxhash::FxHashMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::constants::{ODB_END_MARKER, ODB_START_MARKER};
use super::error::{LookupError, OdbError};

/// A single ODB key. Only the text of plain `<key>` elements is kept; `<keyarray>`
/// contents are not addressable through the Accessor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OdbKey {
    pub name: String,
    pub kind: Option<String>,
    pub value: String,
}

/// An ODB directory. Subdirectories keep their document order, which decides which
/// directory wins when several at the same depth share a name.
#[derive(Debug, Clone, Default)]
pub struct OdbDir {
    pub name: String,
    pub dirs: Vec<OdbDir>,
    keys: FxHashMap<String, OdbKey>,
}

impl OdbDir {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// The first key of that name wins, as in the XML
    fn insert_key(&mut self, key: OdbKey) {
        self.keys.entry(key.name.clone()).or_insert(key);
    }

    pub fn key(&self, name: &str) -> Option<&OdbKey> {
        self.keys.get(name)
    }

    pub fn n_keys(&self) -> usize {
        self.keys.len()
    }
}

/// One complete ODB dump. Immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct OdbSnapshot {
    root: OdbDir,
}

impl OdbSnapshot {
    /// Parse a single `<odb>...</odb>` block
    pub fn parse(xml: &str) -> Result<Self, OdbError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<OdbDir> = Vec::new();
        let mut current_key: Option<OdbKey> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"odb" => stack.push(OdbDir::new(String::from("/"))),
                    b"dir" => stack.push(OdbDir::new(get_attribute(&e, "name")?.unwrap_or_default())),
                    b"key" => current_key = Some(start_key(&e)?),
                    _ => (),
                },
                Event::Empty(e) => {
                    let parent = stack.last_mut().ok_or(OdbError::MissingRoot)?;
                    match e.name().as_ref() {
                        b"dir" => parent
                            .dirs
                            .push(OdbDir::new(get_attribute(&e, "name")?.unwrap_or_default())),
                        b"key" => parent.insert_key(start_key(&e)?),
                        _ => (),
                    }
                }
                Event::Text(t) => {
                    if let Some(key) = current_key.as_mut() {
                        key.value.push_str(&t.unescape()?);
                    }
                }
                Event::CData(t) => {
                    if let Some(key) = current_key.as_mut() {
                        key.value.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"key" => {
                        if let Some(key) = current_key.take() {
                            stack.last_mut().ok_or(OdbError::Unbalanced)?.insert_key(key);
                        }
                    }
                    b"dir" => {
                        let dir = stack.pop().ok_or(OdbError::Unbalanced)?;
                        stack.last_mut().ok_or(OdbError::Unbalanced)?.dirs.push(dir);
                    }
                    b"odb" => {
                        let root = stack.pop().ok_or(OdbError::Unbalanced)?;
                        if !stack.is_empty() {
                            return Err(OdbError::Unbalanced);
                        }
                        return Ok(Self { root });
                    }
                    _ => (),
                },
                Event::Eof => {
                    return Err(if stack.is_empty() {
                        OdbError::MissingRoot
                    } else {
                        OdbError::Unbalanced
                    })
                }
                _ => (),
            }
        }
    }

    /// Find the first directory named `name` which is `depth` levels below the root.
    ///
    /// `/Experiment/Variables` is at depth 2.
    pub fn find_dir(&self, depth: usize, name: &str) -> Option<&OdbDir> {
        let mut level: Vec<&OdbDir> = vec![&self.root];
        for _ in 0..depth {
            level = level.iter().flat_map(|dir| dir.dirs.iter()).collect();
        }
        level.into_iter().find(|dir| dir.name == name)
    }

    /// Get the raw text of `key` in the directory `dir` found at `depth`.
    pub fn get_value(&self, depth: usize, dir: &str, key: &str) -> Result<&str, LookupError> {
        let directory = self
            .find_dir(depth, dir)
            .ok_or_else(|| LookupError::MissingDirectory {
                depth,
                dir: dir.to_string(),
                key: key.to_string(),
            })?;
        directory
            .key(key)
            .map(|k| k.value.as_str())
            .ok_or_else(|| LookupError::MissingKey {
                depth,
                dir: dir.to_string(),
                key: key.to_string(),
            })
    }

    /// Get a value converted by `convert`. A conversion returning None is an error.
    pub fn get_attribute<T, F>(
        &self,
        depth: usize,
        dir: &str,
        key: &str,
        convert: F,
    ) -> Result<T, LookupError>
    where
        F: FnOnce(&str) -> Option<T>,
    {
        let value = self.get_value(depth, dir, key)?;
        convert(value).ok_or_else(|| LookupError::BadValue {
            depth,
            dir: dir.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Get a value parsed with `FromStr`, ignoring surrounding whitespace
    pub fn get_parsed<T: FromStr>(
        &self,
        depth: usize,
        dir: &str,
        key: &str,
    ) -> Result<T, LookupError> {
        self.get_attribute(depth, dir, key, |v| v.trim().parse::<T>().ok())
    }

    /// Get a value as a string
    pub fn get_string(&self, depth: usize, dir: &str, key: &str) -> Result<String, LookupError> {
        self.get_value(depth, dir, key).map(String::from)
    }
}

/// The begin-of-run and end-of-run dumps of a single .mid file
#[derive(Debug, Clone, Default)]
pub struct OdbSnapshots {
    pub pre_run: OdbSnapshot,
    pub post_run: OdbSnapshot,
}

impl OdbSnapshots {
    /// Locate and parse both dumps in the raw bytes of a .mid file
    pub fn from_bytes(data: &[u8]) -> Result<Self, OdbError> {
        let (first, last) = extract_odb_sections(data)?;
        Ok(Self {
            pre_run: OdbSnapshot::parse(&String::from_utf8_lossy(first))?,
            post_run: OdbSnapshot::parse(&String::from_utf8_lossy(last))?,
        })
    }
}

/// Slice out the first and the last `<odb ...>...</odb>` block.
///
/// With a single dump both slices are the same block.
pub fn extract_odb_sections(data: &[u8]) -> Result<(&[u8], &[u8]), OdbError> {
    let first_start = find_bytes(data, ODB_START_MARKER).ok_or(OdbError::MissingMarkers)?;
    let first_end =
        find_bytes(data, ODB_END_MARKER).ok_or(OdbError::MissingMarkers)? + ODB_END_MARKER.len();
    let last_start = rfind_bytes(data, ODB_START_MARKER).ok_or(OdbError::MissingMarkers)?;
    let last_end =
        rfind_bytes(data, ODB_END_MARKER).ok_or(OdbError::MissingMarkers)? + ODB_END_MARKER.len();

    if first_end <= first_start || last_end <= last_start {
        return Err(OdbError::BadMarkerOrder);
    }
    Ok((&data[first_start..first_end], &data[last_start..last_end]))
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn start_key(e: &BytesStart) -> Result<OdbKey, OdbError> {
    Ok(OdbKey {
        name: get_attribute(e, "name")?.unwrap_or_default(),
        kind: get_attribute(e, "type")?,
        value: String::new(),
    })
}

fn get_attribute(e: &BytesStart, name: &str) -> Result<Option<String>, OdbError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
