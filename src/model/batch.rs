/// Raw records packed into one buffer, with the end offset of each record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineBatch {
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl LineBatch {
    pub fn with_capacity(records: usize) -> Self {
        LineBatch {
            data: Vec::with_capacity(records.saturating_mul(16)),
            ends: Vec::with_capacity(records),
        }
    }

    pub fn push(&mut self, line: &[u8]) {
        self.data.extend_from_slice(line);
        self.ends.push(self.data.len());
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts.zip(self.ends.iter().copied()).map(move |(start, end)| &self.data[start..end])
    }
}

/// Unit of work handed from the reader to a counter worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// Keys that were already validated
    Keys(Vec<u32>),
    /// Raw text records still to be parsed
    Lines(LineBatch),
}

impl Batch {
    pub fn len(&self) -> usize {
        match self {
            Batch::Keys(keys) => keys.len(),
            Batch::Lines(lines) => lines.len(),
        }
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u32>> for Batch {
    fn from(keys: Vec<u32>) -> Self {
        Batch::Keys(keys)
    }
}

impl From<LineBatch> for Batch {
    fn from(lines: LineBatch) -> Self {
        Batch::Lines(lines)
    }
}
