//! Response code names as they appear in configuration.

use crate::error::Error;
use lazy_static::lazy_static;
use std::collections::HashMap;
use trust_dns_proto::op::ResponseCode;

/// Every named code. Where two names share a number, the first listed is the one reported.
const RCODE_NAMES: [(&str, ResponseCode); 20] = [
    ("NOERROR", ResponseCode::NoError),
    ("FORMERR", ResponseCode::FormErr),
    ("SERVFAIL", ResponseCode::ServFail),
    ("NXDOMAIN", ResponseCode::NXDomain),
    ("NOTIMP", ResponseCode::NotImp),
    ("REFUSED", ResponseCode::Refused),
    ("YXDOMAIN", ResponseCode::YXDomain),
    ("YXRRSET", ResponseCode::YXRRSet),
    ("NXRRSET", ResponseCode::NXRRSet),
    ("NOTAUTH", ResponseCode::NotAuth),
    ("NOTZONE", ResponseCode::NotZone),
    ("BADVERS", ResponseCode::BADVERS),
    ("BADSIG", ResponseCode::BADSIG),
    ("BADKEY", ResponseCode::BADKEY),
    ("BADTIME", ResponseCode::BADTIME),
    ("BADMODE", ResponseCode::BADMODE),
    ("BADNAME", ResponseCode::BADNAME),
    ("BADALG", ResponseCode::BADALG),
    ("BADTRUNC", ResponseCode::BADTRUNC),
    ("BADCOOKIE", ResponseCode::BADCOOKIE),
];

lazy_static! {
    static ref RCODES_BY_NAME: HashMap<&'static str, ResponseCode> =
        RCODE_NAMES.iter().copied().collect();
    static ref NAMES_BY_RCODE: HashMap<u16, &'static str> = {
        let mut names = HashMap::new();
        for (name, rcode) in RCODE_NAMES {
            names.entry(u16::from(rcode)).or_insert(name);
        }
        names
    };
}

/// Look up a single response code by name, ignoring case.
///
/// # Errors
///
/// Returns [`Error::InvalidRcode`] for names outside the standard table.
pub fn parse_rcode(name: &str) -> Result<ResponseCode, Error> {
    RCODES_BY_NAME
        .get(name.to_ascii_uppercase().as_str())
        .copied()
        .ok_or_else(|| Error::InvalidRcode(name.to_string()))
}

/// Parse a comma separated list such as `SERVFAIL,refused`. Codes repeated within the list are
/// only returned once, in order of first appearance.
///
/// # Errors
///
/// Returns [`Error::InvalidRcode`] naming the first unrecognized entry.
pub fn parse_rcodes(list: &str) -> Result<Vec<ResponseCode>, Error> {
    let mut rcodes: Vec<ResponseCode> = Vec::new();
    for name in list.split(',') {
        let rcode = parse_rcode(name)?;
        if !rcodes.iter().any(|seen| u16::from(*seen) == u16::from(rcode)) {
            rcodes.push(rcode);
        }
    }
    Ok(rcodes)
}

/// The configuration name of `rcode`, or its number when it has none.
#[must_use]
pub fn rcode_name(rcode: ResponseCode) -> String {
    let code = u16::from(rcode);
    NAMES_BY_RCODE
        .get(&code)
        .map_or_else(|| code.to_string(), |name| (*name).to_string())
}
