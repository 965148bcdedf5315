use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::ScanError;

pub const ACCESS_KEY_LEN: usize = 44;

/// True iff `s` is exactly 44 ASCII decimal digits. No trimming or normalization is applied.
pub fn validate(s: &str) -> bool {
    s.len() == ACCESS_KEY_LEN && s.bytes().all(|b| b.is_ascii_digit())
}

// Access key
//------------------------------------------------------------------------------

/// The 44-digit identifier of an NF-e / NFC-e document.
///
/// Layout:
///
/// | digits | field                |
/// |--------|----------------------|
/// | 0..2   | IBGE state code      |
/// | 2..6   | issue year and month |
/// | 6..20  | issuer CNPJ          |
/// | 20..22 | model (55 / 65)      |
/// | 22..25 | series               |
/// | 25..34 | document number      |
/// | 34     | emission type        |
/// | 35..43 | numeric code         |
/// | 43     | check digit          |
#[derive(Debug, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    pub fn new(s: &str) -> Option<Self> {
        validate(s).then(|| Self(s.to_owned()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn state_code(&self) -> &str {
        &self.0[0..2]
    }

    /// Issue date as `AAMM`.
    pub fn year_month(&self) -> &str {
        &self.0[2..6]
    }

    pub fn cnpj(&self) -> &str {
        &self.0[6..20]
    }

    pub fn model(&self) -> &str {
        &self.0[20..22]
    }

    pub fn series(&self) -> &str {
        &self.0[22..25]
    }

    pub fn number(&self) -> &str {
        &self.0[25..34]
    }

    pub fn emission_type(&self) -> &str {
        &self.0[34..35]
    }

    pub fn numeric_code(&self) -> &str {
        &self.0[35..43]
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[43] - b'0'
    }

    /// Modulo 11 over the first 43 digits, weights 2..=9 cycling from the right.
    pub fn expected_check_digit(&self) -> u8 {
        let sum: u32 = self.0.as_bytes()[..43]
            .iter()
            .rev()
            .zip((2..=9).cycle())
            .map(|(d, w)| (d - b'0') as u32 * w)
            .sum();
        match sum % 11 {
            0 | 1 => 0,
            r => (11 - r) as u8,
        }
    }

    pub fn check_digit_valid(&self) -> bool {
        self.check_digit() == self.expected_check_digit()
    }

    /// Shortened form for status lines, e.g. `52250339346861034147...`.
    pub fn abbreviated(&self, len: usize) -> String {
        if len >= ACCESS_KEY_LEN {
            return self.0.clone();
        }
        format!("{}...", &self.0[..len])
    }
}

impl Display for AccessKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AccessKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccessKey {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| ScanError::InvalidKeyFormat(s.to_owned()))
    }
}

impl TryFrom<String> for AccessKey {
    type Error = ScanError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if validate(&s) {
            Ok(Self(s))
        } else {
            Err(ScanError::InvalidKeyFormat(s))
        }
    }
}

impl From<AccessKey> for String {
    fn from(k: AccessKey) -> Self {
        k.0
    }
}
