use crate::error::{CountError, Result};

/// Longest dotted quad: "255.255.255.255"
pub const MAX_ADDRESS_LEN: usize = 15;

/// Parses a dotted-quad IPv4 address into its big-endian integer key.
///
/// Each octet is 1 to 3 decimal digits with a value up to 255. Leading zeros
/// are read as decimal, so `010.0.0.1` and `10.0.0.1` share a key. Anything
/// else (whitespace, signs, IPv6, CIDR suffixes) yields `None`.
#[inline]
pub fn parse_ipv4(line: &[u8]) -> Option<u32> {
    if line.is_empty() || line.len() > MAX_ADDRESS_LEN {
        return None;
    }

    let mut key: u32 = 0;
    let mut octets = 0;
    let mut value: u32 = 0;
    let mut digits = 0;

    for &b in line {
        match b {
            b'0'..=b'9' => {
                digits += 1;
                if digits > 3 {
                    return None;
                }
                value = value * 10 + (b - b'0') as u32;
            }
            b'.' => {
                if digits == 0 || value > 255 || octets == 3 {
                    return None;
                }
                key = (key << 8) | value;
                octets += 1;
                value = 0;
                digits = 0;
            }
            _ => return None,
        }
    }

    if octets != 3 || digits == 0 || value > 255 {
        return None;
    }
    Some((key << 8) | value)
}

#[allow(dead_code)]
pub fn ipv4_to_index(ip: &str) -> Result<u32> {
    parse_ipv4(ip.as_bytes())
        .ok_or_else(|| CountError::Parse(format!("not an IPv4 address: {:?}", ip)))
}

#[allow(dead_code)]
pub fn index_to_ipv4(index: u32) -> String {
    std::net::Ipv4Addr::from(index).to_string()
}
