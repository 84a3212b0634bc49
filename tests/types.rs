use sybil_orm::types::{abstract_type, convert_type, integer_type};

#[test]
fn integer_length_picks_narrowest_type() {
    assert_eq!(convert_type(Some("integer"), Some(1), None), "tinyint(1)");
    assert_eq!(convert_type(Some("integer"), Some(2), None), "tinyint(2)");
    assert_eq!(convert_type(Some("integer"), Some(4), None), "smallint(4)");
    assert_eq!(convert_type(Some("integer"), Some(6), None), "mediumint(6)");
    assert_eq!(convert_type(Some("integer"), Some(9), None), "int(9)");
    assert_eq!(convert_type(Some("integer"), Some(12), None), "bigint(12)");
    assert_eq!(integer_type(3), "smallint(3)");
    assert_eq!(integer_type(10), "bigint(10)");
}

#[test]
fn integer_without_length_is_int11() {
    assert_eq!(convert_type(Some("integer"), None, None), "int(11)");
}

#[test]
fn string_defaults_to_varchar_255() {
    assert_eq!(convert_type(Some("string"), None, None), "varchar(255)");
    assert_eq!(convert_type(Some("string"), Some(50), None), "varchar(50)");
    assert_eq!(convert_type(None, None, None), "varchar(255)");
}

#[test]
fn float_precision() {
    assert_eq!(convert_type(Some("float"), Some(8), Some(3)), "float(8,3)");
    assert_eq!(convert_type(Some("float"), Some(8), None), "float(8,1)");
    assert_eq!(convert_type(Some("float"), None, None), "float");
}

#[test]
fn unknown_types_pass_through() {
    assert_eq!(convert_type(Some("datetime"), None, None), "datetime");
    assert_eq!(convert_type(Some("text"), Some(10), None), "text");
}

#[test]
fn live_types_map_back() {
    let t = abstract_type("smallint(4) unsigned zerofill");
    assert_eq!(t.kind, "integer");
    assert_eq!(t.length, Some(4));
    assert!(t.unsigned);
    assert!(t.zerofill);

    let t = abstract_type("varchar(120)");
    assert_eq!(t.kind, "string");
    assert_eq!(t.length, Some(120));

    let t = abstract_type("float(8,3)");
    assert_eq!(t.kind, "float");
    assert_eq!(t.length, Some(8));
    assert_eq!(t.decimal, Some(3));

    // MySQL 8 drops integer display widths
    let t = abstract_type("int");
    assert_eq!(t.kind, "integer");
    assert_eq!(t.length, None);
}
