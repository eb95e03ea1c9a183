//! DNS wire-format parsing.
//!
//! Decodes the subset of the DNS message format the bridge needs: header,
//! question and resource-record sections, and compressed names. RDATA is
//! carried opaquely; the bridge never rewrites packets.

use crate::error::{Error, Result};
use crate::mdns::packet::{DnsMessage, DnsQuestion, DnsRecord};

/// Maximum compression-pointer jumps before a name is rejected as a loop.
const MAX_POINTER_JUMPS: usize = 10;

impl DnsMessage {
    /// Parse a DNS message from raw packet bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::Parse("message shorter than DNS header".to_string()));
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let flags = u16::from_be_bytes([data[2], data[3]]);
        let qdcount = u16::from_be_bytes([data[4], data[5]]);
        let ancount = u16::from_be_bytes([data[6], data[7]]);
        let nscount = u16::from_be_bytes([data[8], data[9]]);
        let arcount = u16::from_be_bytes([data[10], data[11]]);

        let mut offset = 12;

        let mut questions = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            let (name, next) = read_name(data, offset)?;
            offset = next;
            let fixed = take(data, offset, 4)?;
            questions.push(DnsQuestion {
                name,
                qtype: u16::from_be_bytes([fixed[0], fixed[1]]).into(),
                qclass: u16::from_be_bytes([fixed[2], fixed[3]]),
            });
            offset += 4;
        }

        let answers = read_records(data, &mut offset, ancount)?;
        let authorities = read_records(data, &mut offset, nscount)?;
        let additionals = read_records(data, &mut offset, arcount)?;

        Ok(DnsMessage {
            id,
            flags,
            questions,
            answers,
            authorities,
            additionals,
        })
    }
}

fn read_records(data: &[u8], offset: &mut usize, count: u16) -> Result<Vec<DnsRecord>> {
    let mut records = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (name, next) = read_name(data, *offset)?;
        *offset = next;

        let fixed = take(data, *offset, 10)?;
        let rtype = u16::from_be_bytes([fixed[0], fixed[1]]);
        let rclass = u16::from_be_bytes([fixed[2], fixed[3]]);
        let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]) as usize;
        *offset += 10;

        let rdata = take(data, *offset, rdlength)?.to_vec();
        *offset += rdlength;

        records.push(DnsRecord {
            name,
            rtype: rtype.into(),
            rclass,
            ttl,
            rdata,
        });
    }

    Ok(records)
}

/// Read a possibly-compressed name starting at `start`.
///
/// Returns the name (labels joined with '.') and the offset just past the
/// name in the original byte stream. Compression pointers (top two bits set)
/// may jump anywhere earlier in the message; the first pointer fixes where
/// the name ends in the stream.
fn read_name(data: &[u8], start: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = start;
    let mut end = None;
    let mut jumps = 0;

    loop {
        let len = *data
            .get(pos)
            .ok_or_else(|| Error::Parse("name runs past end of message".to_string()))?
            as usize;

        if len == 0 {
            pos += 1;
            break;
        }

        if len & 0xC0 == 0xC0 {
            let low = *data
                .get(pos + 1)
                .ok_or_else(|| Error::Parse("truncated compression pointer".to_string()))?;
            if end.is_none() {
                end = Some(pos + 2);
            }
            pos = ((len & 0x3F) << 8) | low as usize;
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(Error::Parse("compression pointer loop".to_string()));
            }
            continue;
        }

        let label = data
            .get(pos + 1..pos + 1 + len)
            .ok_or_else(|| Error::Parse("label runs past end of message".to_string()))?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += 1 + len;
    }

    Ok((labels.join("."), end.unwrap_or(pos)))
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len)
        .ok_or_else(|| Error::Parse("truncated message section".to_string()))
}
