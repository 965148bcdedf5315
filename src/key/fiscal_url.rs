use url::form_urlencoded;

use super::AccessKey;
use crate::common::{ScanError, ScanResult};

// Query parameters carrying the key
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyParam {
    /// `p=KEY|VERSION|ENVIRONMENT|CSC_ID|HASH`, used by NFC-e consultation links.
    P,
    /// `chNFe=KEY`, used by the national NF-e portal.
    ChNFe,
}

impl KeyParam {
    fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("p") {
            Some(Self::P)
        } else if name.eq_ignore_ascii_case("chNFe") {
            Some(Self::ChNFe)
        } else {
            None
        }
    }
}

// Fiscal URL
//------------------------------------------------------------------------------

/// Key and accompanying record found in the query string of a consultation URL.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FiscalUrl {
    pub key: AccessKey,
    pub param: KeyParam,
    /// Pipe separated fields of the parameter value, key included at index 0.
    pub record: Vec<String>,
}

impl FiscalUrl {
    /// Parses the query string of `payload`. The first parameter yielding a valid key wins.
    pub fn parse(payload: &str) -> ScanResult<Self> {
        let query = match payload.split_once('?') {
            Some((_, q)) => q.split('#').next().unwrap_or_default(),
            None => return Err(ScanError::NoKeyFound),
        };

        let mut invalid = None;
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let Some(param) = KeyParam::from_name(&name) else {
                continue;
            };

            let record: Vec<String> = match param {
                KeyParam::P => value.split('|').map(|f| f.trim().to_owned()).collect(),
                KeyParam::ChNFe => vec![value.trim().to_owned()],
            };
            let candidate = record.first().cloned().unwrap_or_default();

            match AccessKey::new(&candidate) {
                Some(key) => return Ok(Self { key, param, record }),
                None => invalid = invalid.or(Some(candidate)),
            }
        }

        Err(invalid.map_or(ScanError::NoKeyFound, ScanError::InvalidKeyFormat))
    }

    /// Layout version, the second field of a `p` record.
    pub fn version(&self) -> Option<&str> {
        self.record.get(1).map(String::as_str)
    }

    /// Security hash, the last field of a `p` record with at least 5 fields. Some states
    /// append extra fields before it.
    pub fn security_hash(&self) -> Option<&str> {
        if self.record.len() < 5 {
            return None;
        }
        self.record.last().map(String::as_str)
    }
}

#[cfg(test)]
mod fiscal_url_tests {
    use test_case::test_case;

    use super::{FiscalUrl, KeyParam};
    use crate::common::ScanError;

    #[test_case(
        "https://host/path?p=43210987654321098765432109876543210987654321|2|1|1|ABC",
        "43210987654321098765432109876543210987654321",
        KeyParam::P;
        "p record"
    )]
    #[test_case(
        "https://www.sefaz.rs.gov.br/NFCE/NFCE-COM.aspx?p=43210987654321098765432109876543210987654321",
        "43210987654321098765432109876543210987654321",
        KeyParam::P;
        "p bare key"
    )]
    #[test_case(
        "http://nfe.fazenda.gov.br/portal/consultaRecaptcha.aspx?chNFe=35210123456789012345678901234567890123456789",
        "35210123456789012345678901234567890123456789",
        KeyParam::ChNFe;
        "chNFe"
    )]
    #[test_case(
        "http://x.gov.br/consulta?tpAmb=1&CHNFE=35210123456789012345678901234567890123456789#top",
        "35210123456789012345678901234567890123456789",
        KeyParam::ChNFe;
        "case insensitive name and fragment"
    )]
    fn test_parse(payload: &str, exp_key: &str, exp_param: KeyParam) {
        let url = FiscalUrl::parse(payload).unwrap();
        assert_eq!(url.key.as_str(), exp_key);
        assert_eq!(url.param, exp_param);
    }

    #[test]
    fn test_record_fields() {
        let payload = "http://nfe.sefaz.go.gov.br/nfeweb/sites/nfce/danfeNFCe?p=52250339346861034147651070004999491107141815|2|1|1|DF46C0CAD32EF01BE6B47848D0D7BD145878E215";
        let url = FiscalUrl::parse(payload).unwrap();
        assert_eq!(url.version(), Some("2"));
        assert_eq!(url.security_hash(), Some("DF46C0CAD32EF01BE6B47848D0D7BD145878E215"));
        assert_eq!(url.record.len(), 5);
    }

    #[test]
    fn test_short_record_has_no_hash() {
        let url = FiscalUrl::parse("http://h/?p=52250339346861034147651070004999491107141815|2")
            .unwrap();
        assert_eq!(url.security_hash(), None);
    }

    #[test]
    fn test_missing_param() {
        let res = FiscalUrl::parse("http://nfe.sefaz.go.gov.br/nfeweb/sites/nfce/danfeNFCe?chave=123");
        assert_eq!(res, Err(ScanError::NoKeyFound));
    }

    #[test]
    fn test_not_a_url() {
        assert_eq!(FiscalUrl::parse("just some text"), Err(ScanError::NoKeyFound));
        assert_eq!(FiscalUrl::parse(""), Err(ScanError::NoKeyFound));
    }

    #[test]
    fn test_invalid_candidate() {
        let res = FiscalUrl::parse("http://h/q?p=12345|2|1|1|ABC");
        assert_eq!(res, Err(ScanError::InvalidKeyFormat("12345".into())));
    }
}
