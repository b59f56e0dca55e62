use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const ALPHABET_LEN: u32 = 26;

/// Stable identifier of one entity (chain) within a run.
///
/// Identifiers are assigned from the 1-based position of the record in the input using a
/// bijective base-26 scheme written least-significant letter first: `1 -> A`, `26 -> Z`,
/// `27 -> AA`, `28 -> BA`. Ordering follows the ordinal, so `Z < AA` even though the
/// strings compare the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ChainId(u32);

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ChainIdError {
    #[error("Chain ordinals start at 1, got {0}")]
    ZeroOrdinal(u32),
    #[error("Invalid chain identifier '{0}': expected upper-case letters A-Z")]
    InvalidLetters(String),
    #[error("Chain identifier '{0}' is out of range")]
    OutOfRange(String),
}

impl ChainId {
    pub fn from_ordinal(ordinal: u32) -> Result<Self, ChainIdError> {
        if ordinal == 0 {
            return Err(ChainIdError::ZeroOrdinal(ordinal));
        }
        Ok(Self(ordinal))
    }

    /// Identifier for the record at zero-based `index` in input order.
    pub fn from_index(index: usize) -> Result<Self, ChainIdError> {
        let ordinal = u32::try_from(index + 1)
            .map_err(|_| ChainIdError::OutOfRange(format!("#{}", index + 1)))?;
        Self::from_ordinal(ordinal)
    }

    pub fn ordinal(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut num = i64::from(self.0) - 1;
        let mut letters = String::new();
        while num >= 0 {
            let digit = (num % i64::from(ALPHABET_LEN)) as u8;
            letters.push(char::from(b'A' + digit));
            num = num / i64::from(ALPHABET_LEN) - 1;
        }
        f.write_str(&letters)
    }
}

impl FromStr for ChainId {
    type Err = ChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ChainIdError::InvalidLetters(s.to_string()));
        }
        let mut ordinal: u64 = 0;
        let mut place: u64 = 1;
        for b in s.bytes() {
            let digit = u64::from(b - b'A') + 1;
            ordinal = digit
                .checked_mul(place)
                .and_then(|v| v.checked_add(ordinal))
                .ok_or_else(|| ChainIdError::OutOfRange(s.to_string()))?;
            place = place.saturating_mul(u64::from(ALPHABET_LEN));
        }
        let ordinal = u32::try_from(ordinal).map_err(|_| ChainIdError::OutOfRange(s.to_string()))?;
        Self::from_ordinal(ordinal)
    }
}

impl From<ChainId> for String {
    fn from(id: ChainId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ChainId {
    type Error = ChainIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_map_to_little_endian_letters() {
        let cases = [(1, "A"), (2, "B"), (26, "Z"), (27, "AA"), (28, "BA"), (52, "ZA"), (53, "AB")];
        for (ordinal, expected) in cases {
            assert_eq!(ChainId::from_ordinal(ordinal).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn parsing_is_the_inverse_of_display() {
        for ordinal in 1..2000 {
            let id = ChainId::from_ordinal(ordinal).unwrap();
            assert_eq!(id.to_string().parse::<ChainId>().unwrap(), id);
        }
    }

    #[test]
    fn ordering_follows_input_position_not_string_order() {
        let z = ChainId::from_index(25).unwrap();
        let aa = ChainId::from_index(26).unwrap();
        assert!(z < aa);
        assert!(z.to_string() > aa.to_string());
    }

    #[test]
    fn rejects_invalid_identifiers() {
        assert!(matches!("a".parse::<ChainId>(), Err(ChainIdError::InvalidLetters(_))));
        assert!(matches!("".parse::<ChainId>(), Err(ChainIdError::InvalidLetters(_))));
        assert!(matches!(ChainId::from_ordinal(0), Err(ChainIdError::ZeroOrdinal(0))));
    }

    #[test]
    fn serializes_as_string() {
        let id = ChainId::from_ordinal(28).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"BA\"");
        let back: ChainId = serde_json::from_str("\"BA\"").unwrap();
        assert_eq!(back, id);
    }
}
