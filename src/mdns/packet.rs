//! DNS message data types.

use std::fmt;

/// DNS record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    NS,
    CNAME,
    SOA,
    PTR,
    TXT,
    AAAA,
    SRV,
    NSEC,
    ANY,
    Other(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            12 => RecordType::PTR,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            47 => RecordType::NSEC,
            255 => RecordType::ANY,
            other => RecordType::Other(other),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::PTR => write!(f, "PTR"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::SRV => write!(f, "SRV"),
            RecordType::NSEC => write!(f, "NSEC"),
            RecordType::ANY => write!(f, "ANY"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// A question-section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Query name, labels joined with '.', no trailing dot.
    pub name: String,
    pub qtype: RecordType,
    pub qclass: u16,
}

/// A resource record from the answer, authority, or additional section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Record name, labels joined with '.', no trailing dot.
    pub name: String,
    pub rtype: RecordType,
    pub rclass: u16,
    pub ttl: u32,
    /// Raw RDATA bytes, kept opaque.
    pub rdata: Vec<u8>,
}

/// A parsed DNS message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additionals: Vec<DnsRecord>,
}

impl DnsMessage {
    /// Whether the QR bit marks this message as a response.
    pub fn is_response(&self) -> bool {
        (self.flags & 0x8000) != 0
    }

    /// Names carried in the question and answer sections, the ones filter
    /// patterns are matched against.
    pub fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.questions
            .iter()
            .map(|q| q.name.as_str())
            .chain(self.answers.iter().map(|a| a.name.as_str()))
    }
}
