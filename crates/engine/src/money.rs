use std::{fmt, str::FromStr};

use crate::EngineError;

/// An amount in integer cents, as typed by an operator and printed back.
///
/// The ledger itself works on raw `i64` minor units; this type only sits at
/// the text boundary.
///
/// ```rust
/// use engine::MoneyCents;
///
/// assert_eq!(MoneyCents::new(12_34).to_string(), "12.34");
/// assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<MoneyCents>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<MoneyCents>().is_err());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoneyCents(i64);

impl MoneyCents {
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for MoneyCents {
    type Err = EngineError;

    /// `[+|-]units[(.|,)cents]`, at most two fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |msg: &str| EngineError::InvalidAmount(msg.to_string());

        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        if digits.is_empty() {
            return Err(invalid("empty amount"));
        }

        let (units, frac) = digits.split_once(['.', ',']).unwrap_or((digits, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if units.is_empty() || !all_digits(units) || !all_digits(frac) {
            return Err(invalid("invalid amount"));
        }
        if frac.len() > 2 {
            return Err(invalid("too many decimals"));
        }

        let too_large = || invalid("amount too large");
        let units: i64 = units.parse().map_err(|_| too_large())?;
        // "5" means 50 cents, "" means none.
        let cents: i64 = format!("{frac:0<2}").parse().map_err(|_| invalid("invalid amount"))?;
        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(too_large)?;

        Ok(MoneyCents(if negative { -total } else { total }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_cents() {
        assert_eq!(MoneyCents::new(0).to_string(), "0.00");
        assert_eq!(MoneyCents::new(7).to_string(), "0.07");
        assert_eq!(MoneyCents::new(1050).to_string(), "10.50");
        assert_eq!(MoneyCents::new(-1334).to_string(), "-13.34");
    }

    #[test]
    fn parses_operator_input() {
        assert_eq!("10".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.".parse::<MoneyCents>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<MoneyCents>().unwrap().cents(), 1050);
        assert_eq!("13,34".parse::<MoneyCents>().unwrap().cents(), 1334);
        assert_eq!("+1.00".parse::<MoneyCents>().unwrap().cents(), 100);
        assert_eq!(" 2.30 ".parse::<MoneyCents>().unwrap().cents(), 230);
        let refund = "-0.01".parse::<MoneyCents>().unwrap();
        assert_eq!(refund.cents(), -1);
        assert!(!refund.is_positive());
    }

    #[test]
    fn rejects_malformed_amounts() {
        for raw in ["", "-", "+", "12.345", "1.2.3", "abc", ".50", "1e3", "9223372036854775807"] {
            assert!(
                matches!(raw.parse::<MoneyCents>(), Err(EngineError::InvalidAmount(_))),
                "{raw:?}"
            );
        }
    }
}
