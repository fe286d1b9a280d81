use nucleus_dsl::{extract_command, Bindings, DslError, Interpreter, Value, MAX_DEPTH};
use nucleus_snapshot::{render_file_section, SnapshotDocument};
use pretty_assertions::assert_eq;
use regex::Regex;
use std::time::SystemTime;

fn rust_like_document() -> SnapshotDocument {
    let mut text = String::from("# snapshot\n");
    let bodies = [
        ("src/lib.rs", "fn alpha() {}\nfn beta() { fn inner() {} }\n"),
        ("src/util.ts", "export function gamma() {}\nconst fn_ = 1;\n"),
        ("src/empty.ts", ""),
        ("src/tail.rs", "pub fn delta() {}\n// fn in a comment\nfn epsilon() {}"),
    ];
    for (path, body) in bodies {
        text.push_str(&render_file_section(path, body));
    }
    SnapshotDocument::parse("props.txt", SystemTime::UNIX_EPOCH, &text)
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

#[test]
fn grep_count_matches_reference_scan() {
    let doc = rust_like_document();
    let interp = Interpreter::new(&doc);
    for pattern in ["fn ", r"\w+", "=", "^fn", "[a-z]+\\("] {
        let regex = Regex::new(pattern).unwrap();
        let reference: usize = doc
            .lines()
            .iter()
            .map(|(_, line)| regex.find_iter(line).count())
            .sum();
        let source = format!("(count (grep {}))", quote(pattern));
        let counted = interp.execute(&source, &Bindings::new()).unwrap();
        assert_eq!(counted, Value::from(reference), "pattern {pattern:?}");
    }
}

#[test]
fn count_is_idempotent_on_unchanged_document() {
    let doc = rust_like_document();
    let interp = Interpreter::new(&doc);
    let bindings = Bindings::new();
    let first = interp.execute(r#"(count (grep "fn"))"#, &bindings).unwrap();
    for _ in 0..5 {
        assert_eq!(interp.execute(r#"(count (grep "fn"))"#, &bindings).unwrap(), first);
    }
}

#[test]
fn take_of_sorted_grep_is_bounded_and_ordered() {
    let doc = rust_like_document();
    let value = Interpreter::new(&doc)
        .execute(r#"(take (sort (grep "fn ") "lineNum") 5)"#, &Bindings::new())
        .unwrap();
    let items = value.as_list().unwrap();
    assert!(items.len() <= 5);
    assert!(!items.is_empty());
    let nums: Vec<f64> = items
        .iter()
        .filter_map(|m| m.field("lineNum").as_number())
        .collect();
    assert_eq!(nums.len(), items.len());
    assert!(nums.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn bindings_flow_between_commands() {
    let doc = rust_like_document();
    let interp = Interpreter::new(&doc);
    let mut bindings = Bindings::new();

    let commands = [
        r#"(grep "fn (\\w+)")"#,
        r#"(map RESULTS (lambda (m) (match m "fn (\\w+)" 1)))"#,
        "(count _1)",
    ];
    for (turn, command) in commands.iter().enumerate() {
        let value = interp.execute(command, &bindings).unwrap();
        bindings.record_result(turn + 1, value);
    }

    assert_eq!(bindings.get("RESULTS"), bindings.get("_3"));
    let names = bindings.get("_2").and_then(Value::as_list).unwrap();
    assert_eq!(names[0], Value::from("alpha"));
    assert_eq!(bindings.get("_3"), Some(&Value::from(names.len())));
}

#[test]
fn extracted_commands_evaluate() {
    let doc = rust_like_document();
    let reply = "I'll narrow this down.\n\n(filter (grep \"fn \") (lambda (m) (not (match m \"//\"))))\n";
    let command = extract_command(reply).unwrap();
    let value = Interpreter::new(&doc)
        .execute(command, &Bindings::new())
        .unwrap();
    assert!(value
        .as_list()
        .unwrap()
        .iter()
        .all(|m| !m.field("line").to_string().starts_with("//")));
}

#[test]
fn deeply_nested_replies_fail_as_parse_errors() {
    let doc = rust_like_document();
    let interp = Interpreter::new(&doc);
    let nested = |depth: usize| format!("{}1{}", "(not ".repeat(depth), ")".repeat(depth));

    let deepest = nested(MAX_DEPTH);
    let value = interp.execute(&deepest, &Bindings::new()).unwrap();
    assert_eq!(value, Value::Bool(MAX_DEPTH % 2 == 0));

    for depth in [MAX_DEPTH + 1, 10_000, 50_000] {
        let reply = format!("Trying this:\n{}", nested(depth));
        let command = extract_command(&reply).unwrap();
        let err = interp.execute(command, &Bindings::new()).unwrap_err();
        assert!(matches!(err, DslError::ParseError { .. }), "depth {depth}: {err}");
    }
}
