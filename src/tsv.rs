use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Result, UmiError};
use crate::types::{DuplicateSet, Read};
use crate::umi_aware::DuplicateSetSource;

/// Marks an absent UMI in the third column.
pub const NO_UMI: &str = "-";

/// Streams duplicate sets from tab-delimited text (optionally gzip'd):
///
/// ```text
/// <set_id>\t<read_name>[\t<umi>]
/// ```
///
/// Consecutive lines with the same `set_id` form one duplicate set, and the
/// first of them is its representative. Blank lines and lines starting with
/// `#` are ignored. An absent, empty or `-` UMI leaves the read without one.
pub struct TsvDuplicateSetReader {
    reader: Box<dyn BufRead>,
    umi_tag: String,
    line: String,
    line_number: usize,
    /// First read of the next set, already consumed from the input.
    pending: Option<(String, Read)>,
}

impl TsvDuplicateSetReader {
    pub fn new<B: BufRead + 'static>(reader: B, umi_tag: &str) -> Self {
        Self {
            reader: Box::new(reader),
            umi_tag: umi_tag.to_string(),
            line: String::new(),
            line_number: 0,
            pending: None,
        }
    }

    /// Opens `path`, decompressing on the fly when it ends in `.gz`.
    pub fn from_path<P: AsRef<Path>>(path: P, umi_tag: &str) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path)?;

        let is_gz = path
            .extension()
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let reader: Box<dyn BufRead> = if is_gz {
            Box::new(BufReader::new(MultiGzDecoder::new(f)))
        } else {
            Box::new(BufReader::new(f))
        };

        log::debug!("Reading duplicate sets from {}", path.display());
        Ok(Self::new(reader, umi_tag))
    }

    /// Next `(set_id, read)` pair, skipping blanks and comments.
    fn read_entry(&mut self) -> Result<Option<(String, Read)>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None); // EOF
            }
            self.line_number += 1;

            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split('\t');
            let set_id = fields.next().unwrap_or_default().trim();
            let read_name = fields.next().map(str::trim).unwrap_or_default();
            let umi = fields.next().map(str::trim).unwrap_or_default();

            if set_id.is_empty() || read_name.is_empty() {
                return Err(UmiError::Parse {
                    line: self.line_number,
                    reason: "expected '<set_id>\\t<read_name>[\\t<umi>]'".to_string(),
                });
            }
            if fields.next().is_some() {
                return Err(UmiError::Parse {
                    line: self.line_number,
                    reason: "too many columns".to_string(),
                });
            }

            let mut read = Read::new(read_name);
            if !umi.is_empty() && umi != NO_UMI {
                read = read.with_tag(&self.umi_tag, umi);
            }
            return Ok(Some((set_id.to_string(), read)));
        }
    }
}

impl DuplicateSetSource for TsvDuplicateSetReader {
    type Record = Read;

    fn next_set(&mut self) -> Result<Option<DuplicateSet<Read>>> {
        let (set_id, first) = match self.pending.take() {
            Some(entry) => entry,
            None => match self.read_entry()? {
                Some(entry) => entry,
                None => return Ok(None),
            },
        };

        let mut records = vec![first];
        while let Some((next_id, read)) = self.read_entry()? {
            if next_id != set_id {
                self.pending = Some((next_id, read));
                break;
            }
            records.push(read);
        }

        DuplicateSet::new(records).map(Some)
    }
}
