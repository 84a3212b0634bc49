//! Abstract schema types to concrete MySQL column types, and back.

use regex::Regex;
use std::sync::OnceLock;

/// Convert an abstract column type into a MySQL column type.
///
/// Unknown type names are trusted and returned unchanged, which lets a
/// schema spell out any MySQL type directly.
pub fn convert_type(kind: Option<&str>, length: Option<u32>, decimal: Option<u32>) -> String {
    match kind {
        None => "varchar(255)".to_string(),
        Some("integer") => match length {
            None => "int(11)".to_string(),
            Some(len) => integer_type(len),
        },
        Some("float") => match (length, decimal) {
            (Some(len), Some(dec)) => format!("float({},{})", len, dec),
            (Some(len), None) => format!("float({},1)", len),
            _ => "float".to_string(),
        },
        Some("string") => match length {
            None => "varchar(255)".to_string(),
            Some(len) => format!("varchar({})", len),
        },
        Some(other) => other.to_string(),
    }
}

/// Narrowest integer type able to display `length` digits.
pub fn integer_type(length: u32) -> String {
    let name = if length < 3 {
        "tinyint"
    } else if length < 5 {
        "smallint"
    } else if length < 7 {
        "mediumint"
    } else if length < 10 {
        "int"
    } else {
        "bigint"
    };
    format!("{}({})", name, length)
}

/// A live column type decomposed into the schema vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractType {
    pub kind: String,
    pub length: Option<u32>,
    pub decimal: Option<u32>,
    pub unsigned: bool,
    pub zerofill: bool,
}

fn column_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([a-zA-Z]+)\s*(?:\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\))?(.*)$")
            .expect("column type pattern is valid")
    })
}

/// Map a MySQL `COLUMN_TYPE` such as `smallint(4) unsigned zerofill` back to
/// the abstract vocabulary. Integer widths collapse to `integer` and
/// `varchar` to `string`; anything else keeps its MySQL name.
pub fn abstract_type(column_type: &str) -> AbstractType {
    let lowered = column_type.to_ascii_lowercase();
    let Some(caps) = column_type_regex().captures(&lowered) else {
        return AbstractType {
            kind: lowered.trim().to_string(),
            length: None,
            decimal: None,
            unsigned: false,
            zerofill: false,
        };
    };
    let base = &caps[1];
    let length = caps.get(2).and_then(|m| m.as_str().parse().ok());
    let decimal = caps.get(3).and_then(|m| m.as_str().parse().ok());
    let rest = caps.get(4).map(|m| m.as_str()).unwrap_or("");

    let kind = match base {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => "integer",
        "varchar" => "string",
        other => other,
    };

    AbstractType {
        kind: kind.to_string(),
        length,
        decimal,
        unsigned: rest.contains("unsigned"),
        zerofill: rest.contains("zerofill"),
    }
}
