use std::path::Path;
use std::process::Command;

use super::constants::*;
use super::error::MdumpError;

/// Anything which can produce the text dump of the event banks in a .mid file.
///
/// The whole dump is buffered before decoding starts.
pub trait EventDumpSource {
    fn dump(&self, input: &Path) -> Result<String, MdumpError>;
}

/// Runs the MIDAS `mdump` utility: `mdump -b <bank> -x <file>`
#[derive(Debug, Clone)]
pub struct MdumpCommand {
    program: String,
    bank: String,
}

impl MdumpCommand {
    pub fn new(program: &str, bank: &str) -> Self {
        Self {
            program: program.to_string(),
            bank: bank.to_string(),
        }
    }
}

impl EventDumpSource for MdumpCommand {
    fn dump(&self, input: &Path) -> Result<String, MdumpError> {
        let output = Command::new(&self.program)
            .arg("-b")
            .arg(&self.bank)
            .arg("-x")
            .arg(input)
            .output()
            .map_err(|e| MdumpError::SpawnError(self.program.clone(), e))?;
        if !output.status.success() {
            log::warn!(
                "{} exited with {}; continuing with its output",
                self.program,
                output.status
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// The raw tokens of the event and position banks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpData {
    pub events: Vec<String>,
    pub positions: Vec<String>,
}

/// Split the dump text into event tokens and position tokens
pub fn parse_dump(text: &str) -> Result<DumpData, MdumpError> {
    let events = extract_bank(text, EVENT_BANK_MARKER)?;
    if events.is_empty() {
        log::warn!("No valid MPET banks found in file.");
    }
    let positions = extract_bank(text, POSITION_BANK_MARKER)?;
    if positions.is_empty() {
        log::info!("No valid MCPP banks found in file.");
    }
    Ok(DumpData { events, positions })
}

/// Collect the tokens of every bank named by `marker`.
///
/// Each bank declares its size as `Length: <bytes>(...)`; the bank holds one
/// `0x????????` token per four bytes. Tokens are searched for starting right after
/// the bank marker.
pub fn extract_bank(text: &str, marker: &str) -> Result<Vec<String>, MdumpError> {
    let bytes = text.as_bytes();
    let mut tokens: Vec<String> = Vec::new();
    for (bank_start, _) in text.match_indices(marker) {
        let mut cursor = bank_start + marker.len();
        let length_at = find_from(bytes, BANK_LENGTH_MARKER.as_bytes(), cursor)
            .ok_or_else(|| MdumpError::MissingLength(marker.to_string()))?;
        let field_start = length_at + BANK_LENGTH_MARKER.len();
        let field_end = (field_start + BANK_LENGTH_FIELD_WIDTH).min(bytes.len());
        let field = String::from_utf8_lossy(&bytes[field_start..field_end]);
        let declared = field
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .parse::<usize>()
            .map_err(|_| MdumpError::BadLength(marker.to_string(), field.to_string()))?;

        for _ in 0..(declared / BYTES_PER_ENTRY) {
            let Some(token_at) = find_from(bytes, TOKEN_PREFIX.as_bytes(), cursor) else {
                log::warn!("{marker} declared {declared} bytes but the dump ended early");
                break;
            };
            let token_end = (token_at + TOKEN_WIDTH).min(bytes.len());
            tokens.push(String::from_utf8_lossy(&bytes[token_at..token_end]).into_owned());
            cursor = token_at + 1;
        }
    }
    Ok(tokens)
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
------------------------ Event# 1 ------------------------\n\
Evid:0001- Mask:0001- Serial:1- Time:0x5a5b5c5d- Dsize:40/0x28\n\
#banks:2 - Bank list:-MPETMCPP-\n\
\n\
Bank:MPET Length: 16(I*1)/4(I*4)/4(Type) Type:Unsigned Integer*4\n\
   1-> 0x80010000 0x00000000 0x200101f4 0x000001f4 \n\
Bank:MCPP Length: 8(I*1)/2(I*4)/2(Type) Type:Unsigned Integer*4\n\
   1-> 0x00001234 0x00000a0b \n\
------------------------ Event# 2 ------------------------\n\
Bank:MPET Length: 8(I*1)/2(I*4)/2(Type) Type:Unsigned Integer*4\n\
   1-> 0x10010000 0x00000000 \n";

    #[test]
    fn test_parse_dump() {
        let data = parse_dump(DUMP).unwrap();
        assert_eq!(
            data.events,
            vec!["0x80010000", "0x00000000", "0x200101f4", "0x000001f4", "0x10010000", "0x00000000"]
        );
        assert_eq!(data.positions, vec!["0x00001234", "0x00000a0b"]);
    }

    #[test]
    fn test_no_banks() {
        let data = parse_dump("nothing to see").unwrap();
        assert!(data.events.is_empty());
        assert!(data.positions.is_empty());
    }

    #[test]
    fn test_truncated_bank() {
        let tokens = extract_bank("Bank:MPET Length: 16(I*1)\n 0x80010000 0x0000", "Bank:MPET").unwrap();
        assert_eq!(tokens, vec!["0x80010000", "0x0000"]);
    }

    #[test]
    fn test_bad_length() {
        assert!(matches!(
            extract_bank("Bank:MPET Length: xx(I*1)", "Bank:MPET"),
            Err(MdumpError::BadLength(..))
        ));
        assert!(matches!(
            extract_bank("Bank:MPET", "Bank:MPET"),
            Err(MdumpError::MissingLength(..))
        ));
    }

    #[test]
    fn test_missing_program() {
        let cmd = MdumpCommand::new("/definitely/not/a/real/mdump", "MPET");
        assert!(matches!(
            cmd.dump(Path::new("run.mid")),
            Err(MdumpError::SpawnError(..))
        ));
    }
}
