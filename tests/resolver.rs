use std::io::Cursor;

use sybil_orm::resolve::{ConflictAnswer, ConsoleResolver, Question, Resolver};
use sybil_orm::Error;

fn conflict() -> Question {
    Question::TableConflict {
        table: "article".into(),
    }
}

fn orphan() -> Question {
    Question::OrphanColumn {
        table: "article".into(),
        column: "legacy".into(),
    }
}

#[test]
fn console_reprompts_until_a_valid_answer() {
    let mut output = Vec::new();
    let answer = {
        let mut resolver = ConsoleResolver::new(Cursor::new("Replace\n\nupdate\n"), &mut output);
        resolver.resolve_conflict(&conflict()).unwrap()
    };
    assert_eq!(answer, ConflictAnswer::Update);

    let shown = String::from_utf8(output).unwrap();
    assert_eq!(shown.matches("[replace|update|cancel]").count(), 3);
    assert!(shown.starts_with("WARNING : The table \"article\" already exists"));
}

#[test]
fn console_end_of_input_cancels_conflicts() {
    let mut resolver = ConsoleResolver::new(Cursor::new(""), Vec::new());
    let err = resolver.resolve_conflict(&conflict()).unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[test]
fn console_drops_only_on_capital_y() {
    let mut resolver = ConsoleResolver::new(Cursor::new("Y\ny\nyes\n"), Vec::new());
    assert!(resolver.confirm_drop(&orphan()).unwrap());
    assert!(!resolver.confirm_drop(&orphan()).unwrap());
    assert!(!resolver.confirm_drop(&orphan()).unwrap());
    // end of input keeps the column
    assert!(!resolver.confirm_drop(&orphan()).unwrap());
}

#[test]
fn prompts_name_the_table_and_column() {
    assert_eq!(
        orphan().to_string(),
        "A \"legacy\" column exists in table \"article\" but is missing from your schema. \
         Do you want to remove it ? [Y/n] :"
    );
    assert_eq!(
        Question::OrphanTable {
            table: "old".into()
        }
        .to_string(),
        "A \"old\" table exists in database but is missing from your schema. \
         Do you want to remove it ? [Y/n] :"
    );
}

#[test]
fn answers_parse_exactly() {
    assert_eq!(ConflictAnswer::parse("replace"), Some(ConflictAnswer::Replace));
    assert_eq!(ConflictAnswer::parse(" cancel\n"), Some(ConflictAnswer::Cancel));
    assert_eq!(ConflictAnswer::parse("Update"), None);
    assert_eq!(ConflictAnswer::parse("r"), None);
}
