use crate::env::{Bindings, Scope};
use crate::error::{DslError, Result};
use crate::parser::{parse, Expr};
use crate::value::Value;
use nucleus_snapshot::{Match, SnapshotDocument};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

/// Upper bound on matches a single `grep` returns.
pub const DEFAULT_MAX_MATCHES: usize = 1000;

/// Operators understood by the evaluator, in reference order.
pub const OPERATORS: &[&str] = &[
    "grep", "count", "map", "filter", "first", "last", "take", "sort", "match", "lines", "files",
    "get", "sum", "not",
];

const LAMBDA: &str = "lambda";

/// Evaluates Nucleus expressions against one document handle.
///
/// Evaluation is synchronous and never mutates the document or the session
/// bindings; the caller decides what to bind afterwards.
pub struct Interpreter<'d> {
    document: &'d SnapshotDocument,
    max_matches: usize,
}

impl<'d> Interpreter<'d> {
    pub fn new(document: &'d SnapshotDocument) -> Self {
        Self {
            document,
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches.max(1);
        self
    }

    /// Parse and evaluate one command in the session's binding environment.
    pub fn execute(&self, source: &str, bindings: &Bindings) -> Result<Value> {
        let expr = parse(source)?;
        self.eval(&expr, &Scope::root(bindings))
    }

    pub fn eval(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
        match expr {
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Symbol(name) => Ok(scope
                .lookup(name)
                .cloned()
                .unwrap_or_else(|| Value::String(name.clone()))),
            Expr::List(items) => {
                let Some((head, args)) = items.split_first() else {
                    return Err(DslError::parse(0, "empty application"));
                };
                let Some(op) = head.as_symbol() else {
                    return Err(DslError::UnknownOperator {
                        op: head.to_string(),
                    });
                };
                self.apply(op, args, scope)
            }
        }
    }

    fn apply(&self, op: &str, args: &[Expr], scope: &Scope<'_>) -> Result<Value> {
        match op {
            "grep" => {
                arity(op, args, 1, 2, "(grep pattern [flags])")?;
                let pattern = self.eval_string(op, &args[0], scope)?;
                let flags = match args.get(1) {
                    Some(expr) => self.eval_string(op, expr, scope)?,
                    None => String::new(),
                };
                self.grep(&pattern, &flags)
            }
            "count" => {
                arity(op, args, 1, 1, "(count x)")?;
                let n = match self.eval(&args[0], scope)? {
                    Value::List(items) => items.len(),
                    Value::String(s) => s.chars().count(),
                    _ => 0,
                };
                Ok(Value::from(n))
            }
            "map" | "filter" => {
                arity(op, args, 2, 2, "(map|filter x (lambda (p) body))")?;
                let (param, body) = lambda_parts(op, &args[1])?;
                let items = self.eval_seq(op, &args[0], scope)?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let frame = Scope::child(scope, param, item);
                    let result = self.eval(body, &frame)?;
                    if op == "map" {
                        out.push(result);
                    } else if result.is_truthy() {
                        out.extend(frame.into_param());
                    }
                }
                Ok(Value::List(out))
            }
            "first" | "last" => {
                arity(op, args, 1, 1, "(first|last x)")?;
                let mut items = self.eval_seq(op, &args[0], scope)?;
                let picked = if op == "first" {
                    (!items.is_empty()).then(|| items.swap_remove(0))
                } else {
                    items.pop()
                };
                Ok(picked.unwrap_or(Value::Null))
            }
            "take" => {
                arity(op, args, 2, 2, "(take x n)")?;
                let items = self.eval_seq(op, &args[0], scope)?;
                let n = self.eval_number(op, &args[1], scope)?;
                let n = if n.is_nan() || n <= 0.0 { 0 } else { n as usize };
                Ok(Value::List(items.into_iter().take(n).collect()))
            }
            "sort" => {
                arity(op, args, 1, 2, "(sort x [key])")?;
                let items = self.eval_seq(op, &args[0], scope)?;
                let key = match args.get(1) {
                    Some(expr) => Some(self.eval_string(op, expr, scope)?),
                    None => None,
                };
                let mut keyed: Vec<(Value, Value)> = items
                    .into_iter()
                    .map(|item| {
                        let k = match &key {
                            Some(field) => item.field(field),
                            None => item.clone(),
                        };
                        (k, item)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.compare(&b.0));
                Ok(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
            }
            "match" => {
                arity(op, args, 2, 3, "(match value pattern [group])")?;
                let subject = self.eval(&args[0], scope)?.subject_text();
                let pattern = self.eval_string(op, &args[1], scope)?;
                let group = match args.get(2) {
                    Some(expr) => self.eval_number(op, expr, scope)?,
                    None => 0.0,
                };
                let regex = Regex::new(&pattern).map_err(|err| DslError::InvalidPattern {
                    op: op.to_string(),
                    message: err.to_string(),
                })?;
                if group < 0.0 || group.fract() != 0.0 {
                    return Ok(Value::Null);
                }
                Ok(regex
                    .captures(&subject)
                    .and_then(|caps| caps.get(group as usize))
                    .map_or(Value::Null, |m| Value::from(m.as_str())))
            }
            "lines" => {
                arity(op, args, 2, 2, "(lines start end)")?;
                let start = self.eval_number(op, &args[0], scope)?;
                let end = self.eval_number(op, &args[1], scope)?;
                Ok(self.lines(start, end))
            }
            "files" => {
                arity(op, args, 0, 0, "(files)")?;
                let files = self
                    .document
                    .files()
                    .map(|(path, range)| {
                        let mut record = BTreeMap::new();
                        record.insert("path".to_string(), Value::from(path));
                        record.insert("start".to_string(), Value::from(range.start));
                        record.insert("end".to_string(), Value::from(range.end));
                        Value::Record(record)
                    })
                    .collect();
                Ok(Value::List(files))
            }
            "get" => {
                arity(op, args, 2, 2, "(get x field)")?;
                let target = self.eval(&args[0], scope)?;
                let field = self.eval_string(op, &args[1], scope)?;
                Ok(match target {
                    Value::List(items) => {
                        Value::List(items.iter().map(|item| item.field(&field)).collect())
                    }
                    other => other.field(&field),
                })
            }
            "sum" => {
                arity(op, args, 1, 2, "(sum x [key])")?;
                let items = self.eval_seq(op, &args[0], scope)?;
                let key = match args.get(1) {
                    Some(expr) => Some(self.eval_string(op, expr, scope)?),
                    None => None,
                };
                let total: f64 = items
                    .iter()
                    .filter_map(|item| match &key {
                        Some(field) => item.field(field).as_number(),
                        None => item.as_number(),
                    })
                    .sum();
                Ok(Value::Number(total))
            }
            "not" => {
                arity(op, args, 1, 1, "(not x)")?;
                Ok(Value::Bool(!self.eval(&args[0], scope)?.is_truthy()))
            }
            _ => Err(DslError::UnknownOperator { op: op.to_string() }),
        }
    }

    fn grep(&self, pattern: &str, flags: &str) -> Result<Value> {
        let mut builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                // every scan is global
                'g' => {}
                other => {
                    return Err(DslError::InvalidPattern {
                        op: "grep".to_string(),
                        message: format!("unsupported flag '{other}'"),
                    });
                }
            }
        }
        let regex = builder.build().map_err(|err| DslError::InvalidPattern {
            op: "grep".to_string(),
            message: err.to_string(),
        })?;

        let (matches, capped) = self
            .document
            .lines()
            .find_matches(&regex, Some(self.max_matches));
        if capped {
            log::debug!(
                "grep {pattern:?} stopped at {} matches",
                self.max_matches
            );
        }
        Ok(Value::List(matches.into_iter().map(Value::from).collect()))
    }

    fn lines(&self, start: f64, end: f64) -> Value {
        let index = self.document.lines();
        let start = if start.is_nan() || start < 1.0 { 1 } else { start as usize };
        let end = if end.is_nan() || end < 0.0 { 0 } else { end as usize };
        let end = end.min(index.len());

        let lines = (start..=end)
            .filter_map(|line_num| {
                let line = index.get(line_num)?;
                Some(Value::from(Match {
                    matched: line.to_string(),
                    line: line.to_string(),
                    line_num,
                    index: index.char_offset(line_num)?,
                    groups: Vec::new(),
                }))
            })
            .collect();
        Value::List(lines)
    }

    fn eval_seq(&self, op: &str, expr: &Expr, scope: &Scope<'_>) -> Result<Vec<Value>> {
        match self.eval(expr, scope)? {
            Value::List(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(DslError::type_error(
                op,
                format!("expected a list, got {}", other.type_name()),
            )),
        }
    }

    fn eval_string(&self, op: &str, expr: &Expr, scope: &Scope<'_>) -> Result<String> {
        match self.eval(expr, scope)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(Value::Number(n).to_string()),
            other => Err(DslError::type_error(
                op,
                format!("expected a string, got {}", other.type_name()),
            )),
        }
    }

    fn eval_number(&self, op: &str, expr: &Expr, scope: &Scope<'_>) -> Result<f64> {
        match self.eval(expr, scope)? {
            Value::Number(n) => Ok(n),
            Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
                DslError::type_error(op, format!("expected a number, got {s:?}"))
            }),
            other => Err(DslError::type_error(
                op,
                format!("expected a number, got {}", other.type_name()),
            )),
        }
    }
}

fn arity(op: &str, args: &[Expr], min: usize, max: usize, expected: &'static str) -> Result<()> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(DslError::Arity {
            op: op.to_string(),
            expected,
            got: args.len(),
        })
    }
}

/// Split `(lambda (p) body)` into its parameter name and body.
fn lambda_parts<'e>(op: &str, expr: &'e Expr) -> Result<(&'e str, &'e Expr)> {
    if let Expr::List(items) = expr {
        if let [head, Expr::List(params), body] = items.as_slice() {
            if let (Some(LAMBDA), [Expr::Symbol(param)]) = (head.as_symbol(), params.as_slice()) {
                return Ok((param.as_str(), body));
            }
        }
    }
    Err(DslError::LambdaShape {
        op: op.to_string(),
        found: expr.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nucleus_snapshot::render_file_section;
    use pretty_assertions::assert_eq;
    use std::time::SystemTime;

    fn document() -> SnapshotDocument {
        let mut text = String::from("snapshot header\n");
        text.push_str(&render_file_section(
            "src/a.ts",
            "export function foo() {}\nexport function bar(x) { return x; }\nconst Foo = 1;",
        ));
        text.push_str(&render_file_section("src/b.ts", "import { foo } from './a';\nfoo();"));
        SnapshotDocument::parse("snap.txt", SystemTime::UNIX_EPOCH, &text)
    }

    fn run(doc: &SnapshotDocument, source: &str) -> Result<Value> {
        Interpreter::new(doc).execute(source, &Bindings::new())
    }

    #[test]
    fn grep_returns_matches_with_groups() {
        let doc = document();
        let value = run(&doc, r#"(grep "function (\\w+)")"#).unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].field("groups"), Value::List(vec![Value::from("foo")]));
        assert_eq!(items[1].field("match"), Value::from("function bar"));
    }

    #[test]
    fn grep_flags() {
        let doc = document();
        let count = |src: &str| run(&doc, src).unwrap();
        assert_eq!(count(r#"(count (grep "foo"))"#), Value::Number(3.0));
        assert_eq!(count(r#"(count (grep "foo" "gi"))"#), Value::Number(4.0));

        let err = run(&doc, r#"(grep "foo" "q")"#).unwrap_err();
        assert_eq!(err.operator(), Some("grep"));
        assert!(err.to_string().contains("unsupported flag 'q'"));
    }

    #[test]
    fn grep_is_capped() {
        let doc = document();
        let value = Interpreter::new(&doc)
            .with_max_matches(2)
            .execute(r#"(grep "o")"#, &Bindings::new())
            .unwrap();
        assert_eq!(value.as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn map_and_filter_bind_the_parameter() {
        let doc = document();
        let names = run(
            &doc,
            r#"(map (grep "function (\\w+)") (lambda (m) (match m "function (\\w+)" 1)))"#,
        )
        .unwrap();
        assert_eq!(names, Value::List(vec![Value::from("foo"), Value::from("bar")]));

        let kept = run(
            &doc,
            r#"(filter (grep "export") (lambda (m) (match m "return")))"#,
        )
        .unwrap();
        assert_eq!(kept.as_list().map(<[Value]>::len), Some(1));
    }

    #[test]
    fn lambda_parameter_shadows_session_binding() {
        let doc = document();
        let mut bindings = Bindings::new();
        bindings.set("m", Value::from("outer"));
        let value = Interpreter::new(&doc)
            .execute(r#"(map (grep "bar") (lambda (m) (get m "lineNum")))"#, &bindings)
            .unwrap();
        assert_eq!(value, Value::List(vec![Value::Number(6.0)]));
        assert_eq!(bindings.get("m"), Some(&Value::from("outer")));
    }

    #[test]
    fn malformed_lambda_names_the_operator() {
        let doc = document();
        let err = run(&doc, r#"(map (grep "foo") (fn (m) m))"#).unwrap_err();
        assert!(matches!(err, DslError::LambdaShape { ref op, .. } if op == "map"));
        let err = run(&doc, r#"(filter (grep "foo") (lambda m m))"#).unwrap_err();
        assert_eq!(err.operator(), Some("filter"));
    }

    #[test]
    fn unknown_operator_is_reported() {
        let doc = document();
        let err = run(&doc, r#"(frobnicate "x")"#).unwrap_err();
        assert_eq!(
            err,
            DslError::UnknownOperator {
                op: "frobnicate".into()
            }
        );
        assert_eq!(err.to_string(), "Unknown operator: frobnicate");
    }

    #[test]
    fn first_last_take_on_edges() {
        let doc = document();
        assert_eq!(run(&doc, r#"(first (grep "zzz"))"#).unwrap(), Value::Null);
        assert_eq!(run(&doc, r#"(last (grep "zzz"))"#).unwrap(), Value::Null);
        let last = run(&doc, r#"(last (grep "foo"))"#).unwrap();
        assert_eq!(last.field("line"), Value::from("foo();"));
        assert_eq!(run(&doc, r#"(take (grep "foo") -1)"#).unwrap(), Value::List(vec![]));
        assert_eq!(
            run(&doc, r#"(count (take (grep "foo") 10))"#).unwrap(),
            Value::Number(3.0)
        );
    }

    #[test]
    fn sort_is_stable_and_numeric_when_possible() {
        let doc = document();
        let sorted = run(&doc, r#"(map (sort (grep "o") "lineNum") (lambda (m) (get m "lineNum")))"#)
            .unwrap();
        let nums: Vec<f64> = sorted
            .as_list()
            .unwrap()
            .iter()
            .filter_map(Value::as_number)
            .collect();
        assert!(nums.windows(2).all(|w| w[0] <= w[1]));

        let by_match = run(&doc, r#"(map (sort (grep "[fb][oa][or]") "match") (lambda (m) (get m "match")))"#)
            .unwrap();
        assert_eq!(by_match.as_list().unwrap()[0], Value::from("bar"));
    }

    #[test]
    fn match_on_strings_and_groups() {
        let doc = document();
        assert_eq!(
            run(&doc, r#"(match "version 12" "(\\d+)" 1)"#).unwrap(),
            Value::from("12")
        );
        assert_eq!(run(&doc, r#"(match "abc" "z")"#).unwrap(), Value::Null);
        assert_eq!(run(&doc, r#"(match "abc" "b" 4)"#).unwrap(), Value::Null);
        let err = run(&doc, r#"(match "abc" "(")"#).unwrap_err();
        assert!(matches!(err, DslError::InvalidPattern { ref op, .. } if op == "match"));
    }

    #[test]
    fn lines_files_get_sum_not() {
        let doc = document();
        let lines = run(&doc, "(lines 5 6)").unwrap();
        let lines = lines.as_list().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].field("line"), Value::from("export function foo() {}"));
        assert_eq!(run(&doc, "(count (lines 0 1000))").unwrap(), Value::from(doc.lines().len()));

        let files = run(&doc, "(get (files) \"path\")").unwrap();
        assert_eq!(files, Value::List(vec![Value::from("src/a.ts"), Value::from("src/b.ts")]));

        let total = run(&doc, r#"(sum (grep "foo") "lineNum")"#).unwrap();
        let expected: usize = doc
            .lines()
            .iter()
            .filter(|(_, l)| l.contains("foo"))
            .map(|(n, l)| n * l.matches("foo").count())
            .sum();
        assert_eq!(total, Value::from(expected));

        assert_eq!(run(&doc, "(not (grep \"zzz\"))").unwrap(), Value::Bool(false));
        assert_eq!(run(&doc, "(not (first (grep \"zzz\")))").unwrap(), Value::Bool(true));
    }

    #[test]
    fn symbols_resolve_or_pass_through() {
        let doc = document();
        let mut bindings = Bindings::new();
        bindings.record_result(1, Value::Number(2.0));
        let interp = Interpreter::new(&doc);
        assert_eq!(interp.execute("_1", &bindings).unwrap(), Value::Number(2.0));
        assert_eq!(interp.execute("RESULTS", &bindings).unwrap(), Value::Number(2.0));
        assert_eq!(interp.execute("lineNum", &bindings).unwrap(), Value::from("lineNum"));
        assert_eq!(
            interp.execute("(sort (grep \"foo\") lineNum)", &bindings).unwrap(),
            interp.execute("(sort (grep \"foo\") \"lineNum\")", &bindings).unwrap()
        );
    }

    #[test]
    fn arity_and_type_errors() {
        let doc = document();
        let err = run(&doc, "(count)").unwrap_err();
        assert!(matches!(err, DslError::Arity { ref op, got: 0, .. } if op == "count"));
        let err = run(&doc, "(take (grep \"foo\") \"many\")").unwrap_err();
        assert!(matches!(err, DslError::TypeError { ref op, .. } if op == "take"));
        let err = run(&doc, "(map 3 (lambda (x) x))").unwrap_err();
        assert_eq!(err.operator(), Some("map"));
        assert!(matches!(run(&doc, "()"), Err(DslError::ParseError { .. })));
    }
}
