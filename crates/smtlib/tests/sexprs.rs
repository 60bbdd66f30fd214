use num_bigint::BigInt;
use smtcheck_smtlib::{sexpr::SExpr, SmtLibError};

fn symbol(name: &str) -> SExpr {
    SExpr::Symbol(name.into())
}

#[test]
fn command_with_nested_lists() {
    let source = "(assert (> x 10))";

    let sexprs = smtcheck_smtlib::parse_sexprs(source).expect("valid source");

    let expected = vec![SExpr::List(vec![
        symbol("assert"),
        SExpr::List(vec![
            symbol(">"),
            symbol("x"),
            SExpr::Numeral(BigInt::from(10)),
        ]),
    ])];

    assert_eq!(expected, sexprs);
}

#[test]
fn comments_and_whitespace_are_skipped() {
    let source = "; a comment\n(check-sat) ; trailing\n\t(exit)\r\n";

    let sexprs = smtcheck_smtlib::parse_sexprs(source).expect("valid source");

    assert_eq!(
        vec![
            SExpr::List(vec![symbol("check-sat")]),
            SExpr::List(vec![symbol("exit")]),
        ],
        sexprs
    );
}

#[test]
fn literals() {
    let source = r#"(0 2.50 #xFF #b101 "say ""hi""" :named |quoted symbol|)"#;

    let sexprs = smtcheck_smtlib::parse_sexprs(source).expect("valid source");

    let SExpr::List(items) = &sexprs[0] else {
        panic!("expected a list");
    };

    assert_eq!(SExpr::Numeral(BigInt::from(0)), items[0]);
    assert_eq!("2.5", items[1].to_string());
    assert_eq!(SExpr::Hexadecimal("FF".into()), items[2]);
    assert_eq!(SExpr::Binary("101".into()), items[3]);
    assert_eq!(SExpr::String("say \"hi\"".into()), items[4]);
    assert_eq!(SExpr::Keyword("named".into()), items[5]);
    assert_eq!(symbol("quoted symbol"), items[6]);
}

#[test]
fn symbols_may_contain_punctuation() {
    let sexprs = smtcheck_smtlib::parse_sexprs("(<= x!1 |x|) (=> a b)").expect("valid source");

    assert_eq!(
        SExpr::List(vec![symbol("<="), symbol("x!1"), symbol("x")]),
        sexprs[0]
    );
    assert_eq!(
        SExpr::List(vec![symbol("=>"), symbol("a"), symbol("b")]),
        sexprs[1]
    );
}

#[test]
fn unbalanced_parentheses_are_syntax_errors() {
    let result = smtcheck_smtlib::parse_sexprs("(assert (> x 0)");

    assert!(matches!(result, Err(SmtLibError::Syntax(_))));
}

#[test]
fn syntax_errors_carry_a_location() {
    let error = smtcheck_smtlib::parse_sexprs("(check-sat)\n(assert ))")
        .expect_err("stray closing parenthesis");

    let SmtLibError::Syntax(error) = error else {
        panic!("expected a syntax error");
    };

    let pest::error::LineColLocation::Pos((line, _)) = error.line_col else {
        panic!("expected a position");
    };
    assert_eq!(2, line);
}

#[test]
fn numerals_with_leading_zeros_are_invalid() {
    assert!(matches!(
        smtcheck_smtlib::parse_sexprs("(assert (= x 007))"),
        Err(SmtLibError::InvalidLiteral(literal)) if literal == "007"
    ));
}

#[test]
fn empty_source_has_no_commands() {
    assert!(smtcheck_smtlib::parse_sexprs("  ; nothing here\n")
        .expect("valid source")
        .is_empty());
}

#[test]
fn deep_nesting_is_an_error() {
    let depth = 20_000;
    let source = format!("(assert {}p{})", "(not ".repeat(depth), ")".repeat(depth));

    assert!(matches!(
        smtcheck_smtlib::parse_sexprs(&source),
        Err(SmtLibError::NestingTooDeep {
            limit: smtcheck_smtlib::MAX_NESTING_DEPTH
        })
    ));
}

#[test]
fn parentheses_in_strings_and_comments_do_not_nest() {
    let opening = "(".repeat(smtcheck_smtlib::MAX_NESTING_DEPTH + 1);
    let source = format!("; {opening}\n(echo \"{opening}\") (echo |{opening}|)");

    let sexprs = smtcheck_smtlib::parse_sexprs(&source).expect("valid source");

    assert_eq!(2, sexprs.len());
}
