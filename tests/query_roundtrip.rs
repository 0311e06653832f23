//! Integration tests for parsing and canonical rendering
//!
//! Exercises the public façade end to end: every construct of the query
//! language must be accepted, and rendering must produce text that
//! re-parses to an equivalent tree.

use lucerne::{parse, Node, Occur, RangeOp};

fn doc_query(input: &str) -> Node {
    let result = parse(input);
    assert!(
        result.is_success(),
        "parse of {:?} reported errors: {:?}",
        input,
        result.errors
    );
    match result.document {
        Node::Document(doc) => *doc.query.expect("document has a query"),
        other => panic!("expected document, got {}", other.kind()),
    }
}

/// parse(render(parse(s))) must equal parse(s), modulo positions.
fn assert_round_trip(input: &str) {
    let first = parse(input);
    assert!(
        first.is_success(),
        "parse of {:?} reported errors: {:?}",
        input,
        first.errors
    );
    let rendered = first.document.render();
    let second = parse(&rendered);
    assert!(
        second.is_success(),
        "render of {:?} produced unparseable text {:?}: {:?}",
        input,
        rendered,
        second.errors
    );
    assert!(
        first.document.equivalent(&second.document),
        "round trip of {:?} drifted: rendered {:?}, re-rendered {:?}",
        input,
        rendered,
        second.document.render()
    );
}

#[test]
fn accepts_every_surface_construct() {
    for input in [
        "hello",
        "status:active",
        "\"hello world\"",
        "foo*",
        "f?o*bar",
        "/ab+c/",
        "price:[1 TO 10]",
        "price:{1 TO 10}",
        "price:[1 TO 10}",
        "price:{1 TO 10]",
        "price:[* TO 10]",
        "price:[1 TO *]",
        "price:>5",
        "price:>=5",
        "price:<5",
        "price:<=5",
        "a AND b OR NOT c",
        "+a -b",
        "(a OR b) AND c",
        "a^2",
        "(a OR b)^3",
        "@include:name",
        "@include:\"with space\"",
        "*",
        "a\\:b",
        "foo\\ bar",
    ] {
        let result = parse(input);
        assert!(
            result.is_success(),
            "{:?} was rejected: {:?}",
            input,
            result.errors
        );
    }
}

#[test]
fn renders_simple_term_verbatim() {
    assert_eq!(parse("hello").document.render(), "hello");
}

#[test]
fn round_trips_the_full_surface() {
    for input in [
        "hello",
        "status:active",
        "title:\"hello world\"",
        "foo*",
        "f?o*bar",
        "name:/jo?hn/",
        "price:[100 TO 500]",
        "price:{1 TO 10}",
        "price:[1 TO 10}",
        "price:[* TO 10]",
        "age:>=30",
        "age:<18",
        "a AND b OR NOT c",
        "+a -b c",
        "(a OR b) AND c",
        "a^2 AND (b OR c)^3",
        "\"boosted phrase\"^1.5",
        "@include:name",
        "*",
        "status:*",
        "_missing_:deleted",
        "a\\:b",
        "foo\\ bar",
        "tags:(rust async tokio)",
        "status:(active OR pending)",
        "[1 TO 10]",
        ">5",
        "x:(a AND b) OR NOT (c d)",
    ] {
        assert_round_trip(input);
    }
}

#[test]
fn compound_query_round_trips() {
    let input = "title:\"hello world\" AND (status:active OR status:pending) \
                 AND price:[100 TO 500] AND NOT deleted:true";
    let result = parse(input);
    assert!(result.is_success());
    assert_round_trip(input);
}

#[test]
fn rendered_form_contains_original_fields_and_terms() {
    let rendered = parse("title:rust AND (status:active OR tags:(a b)) AND price:[1 TO 2]")
        .document
        .render();
    for needle in ["title", "rust", "status", "active", "tags", "a", "b", "price", "1", "2"] {
        assert!(
            rendered.contains(needle),
            "{:?} missing from {:?}",
            needle,
            rendered
        );
    }
}

#[test]
fn empty_input_parses_to_empty_document() {
    let result = parse("");
    assert!(result.is_success());
    match result.document {
        Node::Document(doc) => assert!(doc.query.is_none()),
        other => panic!("expected document, got {}", other.kind()),
    }
    assert_eq!(parse("").document.render(), "");
}

#[test]
fn unbalanced_paren_returns_document_with_errors() {
    let result = parse("(a AND b");
    assert!(!result.is_success());
    assert!(result.document.as_document().is_some());
    // The recovered tree still renders.
    assert_eq!(result.document.render(), "(a AND b)");
}

#[test]
fn a_document_is_always_returned() {
    for input in ["", ")", "((", "a AND", ":", "~", "\"open", "/open", "a ^ b"] {
        let result = parse(input);
        assert!(result.document.as_document().is_some(), "no document for {:?}", input);
    }
}

#[test]
fn exists_canonicalizes_to_star_form() {
    // `_exists_:f` and `f:*` are the same check; rendering picks `f:*`.
    assert_eq!(parse("_exists_:status").document.render(), "status:*");
    assert_eq!(parse("status:*").document.render(), "status:*");
    assert!(parse("_exists_:status")
        .document
        .equivalent(&parse("status:*").document));
}

#[test]
fn occurrence_modifiers_keep_three_clauses() {
    match doc_query("+a -b c") {
        Node::Boolean(boolean) => {
            let occurs: Vec<Occur> = boolean.clauses.iter().map(|c| c.occur).collect();
            assert_eq!(occurs, vec![Occur::Must, Occur::MustNot, Occur::Should]);
        }
        other => panic!("expected boolean, got {}", other.kind()),
    }
    assert_eq!(parse("+a -b c").document.render(), "+a -b c");
}

#[test]
fn inclusive_range_fields_are_exposed() {
    match doc_query("Age:[30 TO 40]") {
        Node::Range(range) => {
            assert_eq!(range.field.as_deref(), Some("Age"));
            assert_eq!(range.min.as_deref(), Some("30"));
            assert_eq!(range.max.as_deref(), Some("40"));
            assert!(range.min_inclusive && range.max_inclusive);
        }
        other => panic!("expected range, got {}", other.kind()),
    }
}

#[test]
fn shorthand_ranges_carry_their_operator() {
    match doc_query("price:>=100") {
        Node::Range(range) => assert_eq!(range.op, Some(RangeOp::Gte)),
        other => panic!("expected range, got {}", other.kind()),
    }
    assert_eq!(parse("price:>=100").document.render(), "price:>=100");
}

#[test]
fn escapes_survive_the_round_trip() {
    let result = parse("a\\:b");
    match result.document {
        Node::Document(ref doc) => match doc.query.as_deref() {
            Some(Node::Term(term)) => {
                assert_eq!(term.raw_term, "a\\:b");
                assert_eq!(term.unescaped_term, "a:b");
            }
            other => panic!("expected term, got {:?}", other.map(|n| n.kind())),
        },
        ref other => panic!("expected document, got {}", other.kind()),
    }
    assert_eq!(result.document.render(), "a\\:b");
}

#[test]
fn spans_nest_inside_parents() {
    fn check(node: &Node, parent: Option<lucerne::Span>) {
        if let Some(parent) = parent {
            let span = node.span();
            assert!(span.start_offset >= parent.start_offset);
            assert!(span.end_offset <= parent.end_offset);
        }
        let span = node.span();
        match node {
            Node::Document(n) => {
                if let Some(q) = &n.query {
                    check(q, Some(span));
                }
            }
            Node::Group(n) => {
                if let Some(q) = &n.query {
                    check(q, Some(span));
                }
            }
            Node::Boolean(n) => {
                for clause in &n.clauses {
                    if let Some(q) = &clause.query {
                        check(q, Some(span));
                    }
                }
            }
            Node::Field(n) => {
                if let Some(q) = &n.query {
                    check(q, Some(span));
                }
            }
            Node::Not(n) => {
                if let Some(q) = &n.query {
                    check(q, Some(span));
                }
            }
            _ => {}
        }
    }

    let result = parse("title:\"x y\" AND (a OR b:(c d)) AND NOT e:[1 TO 2]");
    assert!(result.is_success());
    check(&result.document, None);
}

#[test]
fn error_positions_are_line_and_column_aware() {
    let result = parse("a AND\nb AND ~");
    assert!(!result.is_success());
    let error = &result.errors[0];
    assert_eq!(error.line, 2);
    assert_eq!(error.column, 7);
}

#[test]
fn ast_serializes_to_json() {
    let result = parse("status:active");
    let json = serde_json::to_value(&result.document).unwrap();
    assert_eq!(json["type"], "document");
    assert_eq!(json["query"]["type"], "field");
    assert_eq!(json["query"]["field"], "status");
}
