//! Option matrix tests.

use std::collections::HashMap;

use xbackup_core::{Error, OptionMatrix};

fn pairs(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| (format!("opt_{}", i), format!("value-{}", i * 7)))
        .collect()
}

fn render(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

#[test]
fn parsed_matrix_holds_exactly_the_given_pairs() {
    for n in [1, 2, 5, 20] {
        let expected: HashMap<_, _> = pairs(n).into_iter().collect();
        let matrix = OptionMatrix::parse(&render(&pairs(n))).unwrap();

        let parsed: HashMap<String, String> = matrix
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(parsed, expected);
    }
}

#[test]
fn later_duplicate_wins() {
    let matrix = OptionMatrix::parse("engine=innodb,engine=xtradb").unwrap();
    assert_eq!(matrix.len(), 1);
    assert_eq!(matrix.get("engine"), Some("xtradb"));
}

#[test]
fn surrounding_whitespace_and_stray_commas_are_ignored() {
    let matrix = OptionMatrix::parse(" a = 1 , ,b=2,").unwrap();
    assert_eq!(matrix.get("a"), Some("1"));
    assert_eq!(matrix.get("b"), Some("2"));
    assert_eq!(matrix.len(), 2);
}

#[test]
fn check_required_fails_iff_a_key_is_absent() {
    let matrix = OptionMatrix::parse("zero=0,empty=,off=false").unwrap();

    // Falsy values still count as present
    assert!(matrix.check_required(&["zero", "empty", "off"]).is_ok());
    assert!(matrix.check_required::<&str>(&[]).is_ok());

    let err = matrix
        .check_required(&["zero", "missing", "also_missing"])
        .unwrap_err();
    assert!(matches!(err, Error::MissingOption(ref key) if key == "missing"));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn check_required_on_empty_matrix() {
    let matrix = OptionMatrix::from_optional(None).unwrap();
    let required = vec!["innodb_file_per_table".to_string()];

    assert!(matches!(
        matrix.check_required(&required),
        Err(Error::MissingOption(ref key)) if key == "innodb_file_per_table"
    ));
}
