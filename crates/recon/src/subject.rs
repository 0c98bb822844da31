use std::fmt;

use serde::Serialize;

use crate::error::ReconError;

/// Normalized national ID (cédula, 10 digits) or tax ID (RUC, 13 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubjectId(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PersonaType {
    #[serde(rename = "Persona Natural")]
    Natural,
    #[serde(rename = "Persona Jurídica")]
    Juridica,
}

impl PersonaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "Persona Natural",
            Self::Juridica => "Persona Jurídica",
        }
    }
}

impl SubjectId {
    /// Strip whitespace, dots and dashes; the rest must be 10 or 13 digits.
    pub fn parse(raw: &str) -> Result<Self, ReconError> {
        let normalized: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
            .collect();

        let valid_len = normalized.len() == 10 || normalized.len() == 13;
        if !valid_len || !normalized.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReconError::InvalidSubject(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_ruc(&self) -> bool {
        self.0.len() == 13
    }

    /// Natural persons hold a cédula, or a RUC of the form `<cédula>001`
    /// whose third digit is 0-5. Everything else is a legal entity.
    pub fn persona_type(&self) -> PersonaType {
        let digits = self.0.as_bytes();
        if digits.len() == 10 {
            return PersonaType::Natural;
        }
        if self.0.ends_with("001") && (b'0'..=b'5').contains(&digits[2]) {
            return PersonaType::Natural;
        }
        PersonaType::Juridica
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SubjectId {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
