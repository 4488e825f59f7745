use rand::Rng;

/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

/// Milliseconds since the Unix epoch. All coordinator timestamps use this unit.
pub type Millis = u64;

pub fn now_ms() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Identifier handed to us by the external auth layer. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::ops::Deref for UserId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const PARTY_CODE_LEN: usize = 6;
const PARTY_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Six character party code (A-Z, 0-9).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PartyCode(pub String);

impl PartyCode {
    /// Generates a random code. Uniqueness is the directory's job.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let s: String = (0..PARTY_CODE_LEN)
            .map(|_| PARTY_CODE_ALPHABET[rng.gen_range(0..PARTY_CODE_ALPHABET.len())] as char)
            .collect();
        Self(s)
    }

    /// Parses user input. Lowercase input is accepted and normalized.
    pub fn parse(raw: &str) -> Option<Self> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == PARTY_CODE_LEN
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        valid.then_some(Self(code))
    }
}

impl std::ops::Deref for PartyCode {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for PartyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_well_formed() {
        for _ in 0..200 {
            let code = PartyCode::generate();
            assert_eq!(code.len(), PARTY_CODE_LEN);
            assert!(PartyCode::parse(&code).is_some(), "bad code {}", code);
        }
    }

    #[test]
    fn test_parse_normalizes_and_rejects() {
        assert_eq!(PartyCode::parse(" ab12cd ").unwrap().0, "AB12CD");
        assert!(PartyCode::parse("AB12C").is_none());
        assert!(PartyCode::parse("AB12CDE").is_none());
        assert!(PartyCode::parse("AB-2CD").is_none());
    }
}
