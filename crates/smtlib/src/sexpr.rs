use std::{fmt::Display, rc::Rc, str::FromStr};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

/// An s-expression as it appears in the source. Quoted and simple symbols are not distinguished,
/// as `|abc|` and `abc` denote the same symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SExpr {
    Numeral(BigInt),
    Decimal(BigRational),
    /// The digits of a `#x` literal.
    Hexadecimal(Rc<str>),
    /// The digits of a `#b` literal.
    Binary(Rc<str>),
    /// A string literal with its escapes resolved.
    String(Rc<str>),
    /// A keyword without its leading colon.
    Keyword(Rc<str>),
    Symbol(Rc<str>),
    List(Vec<SExpr>),
}

impl SExpr {
    pub fn as_symbol(&self) -> Option<&Rc<str>> {
        match self {
            SExpr::Symbol(symbol) => Some(symbol),
            _ => None,
        }
    }
}

impl Display for SExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SExpr::Numeral(value) => write!(f, "{value}"),
            SExpr::Decimal(value) => write!(f, "{}", DecimalDisplay(value)),
            SExpr::Hexadecimal(digits) => write!(f, "#x{digits}"),
            SExpr::Binary(digits) => write!(f, "#b{digits}"),
            SExpr::String(value) => write!(f, "\"{}\"", value.replace('"', "\"\"")),
            SExpr::Keyword(keyword) => write!(f, ":{keyword}"),
            SExpr::Symbol(symbol) => write!(f, "{symbol}"),
            SExpr::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Renders a rational as the decimal it was parsed from, when it has a finite expansion.
struct DecimalDisplay<'a>(&'a BigRational);

impl Display for DecimalDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = self.0;

        let (two, five) = (BigInt::from(2), BigInt::from(5));
        let mut rest = value.denom().clone();
        let (mut twos, mut fives) = (0, 0);

        while (&rest % &two).is_zero() {
            rest /= &two;
            twos += 1;
        }
        while (&rest % &five).is_zero() {
            rest /= &five;
            fives += 1;
        }

        if !rest.is_one() {
            return write!(f, "{value}");
        }

        let digits: usize = twos.max(fives);
        let scaled = value.numer() * num_traits::pow(BigInt::from(10), digits) / value.denom();
        let sign = if scaled.is_negative() { "-" } else { "" };
        let scaled = scaled.abs().to_string();

        if digits == 0 {
            return write!(f, "{sign}{scaled}.0");
        }

        let (int_part, frac_part) = if scaled.len() > digits {
            scaled.split_at(scaled.len() - digits)
        } else {
            ("0", scaled.as_str())
        };

        write!(f, "{sign}{int_part}.{frac_part:0>digits$}")
    }
}

/// Parse a string of decimal digits.
pub(crate) fn parse_numeral(text: &str) -> Option<BigInt> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    BigInt::from_str(text).ok()
}

/// Parse a decimal of the form `<digits>.<digits>`.
pub(crate) fn parse_decimal(text: &str) -> Option<BigRational> {
    let (int_part, frac_part) = text.split_once('.')?;

    if int_part.is_empty()
        || frac_part.is_empty()
        || !int_part.bytes().all(|byte| byte.is_ascii_digit())
        || !frac_part.bytes().all(|byte| byte.is_ascii_digit())
    {
        return None;
    }

    let numer = BigInt::from_str(&format!("{int_part}{frac_part}")).ok()?;
    let denom = num_traits::pow(BigInt::from(10), frac_part.len());

    Some(BigRational::new(numer, denom))
}

/// SMT-LIB forbids leading zeros in numerals and in the integer part of decimals.
pub(crate) fn has_leading_zero(text: &str) -> bool {
    let int_part = text.split('.').next().unwrap_or(text);
    int_part.len() > 1 && int_part.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_are_exact() {
        assert_eq!(
            Some(BigRational::new(BigInt::from(5), BigInt::from(4))),
            parse_decimal("1.25")
        );
        assert_eq!(None, parse_decimal("1."));
        assert_eq!(None, parse_decimal(".5"));
    }

    #[test]
    fn leading_zeros_are_detected() {
        assert!(has_leading_zero("007"));
        assert!(has_leading_zero("01.5"));
        assert!(!has_leading_zero("0"));
        assert!(!has_leading_zero("0.05"));
    }

    #[test]
    fn lists_render_as_source() {
        let expr = SExpr::List(vec![
            SExpr::Symbol("_".into()),
            SExpr::Symbol("BitVec".into()),
            SExpr::Numeral(BigInt::from(8)),
        ]);

        assert_eq!("(_ BitVec 8)", expr.to_string());
    }

    #[test]
    fn decimals_render_as_source() {
        let value = parse_decimal("0.050").unwrap();
        assert_eq!("0.05", SExpr::Decimal(value).to_string());
        assert_eq!(
            "12.5",
            SExpr::Decimal(parse_decimal("12.5").unwrap()).to_string()
        );
    }
}
