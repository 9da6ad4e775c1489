//! Integration tests for rule compilation
//!
//! Tests knowledge building, condition classification and compile errors.

use ember_engine::{GroupPlan, Knowledge, KnowledgeBuilder, RuleBuilder};
use ember_foundation::{ErrorKind, Type, Value};
use ember_memory::{Evaluator, FactTypeSchema};

fn declared() -> KnowledgeBuilder {
    Knowledge::builder()
        .declare(
            FactTypeSchema::new("Person")
                .with_field("id", Type::Int)
                .with_field("age", Type::Int),
        )
        .declare(
            FactTypeSchema::new("Account")
                .with_field("ownerId", Type::Int)
                .with_field("balance", Type::Int),
        )
}

fn adult(v: &[Value]) -> bool {
    v[0].as_int().is_some_and(|a| a > 18)
}

// =============================================================================
// Classification
// =============================================================================

#[test]
fn single_variable_conditions_become_alpha_bits() {
    let knowledge = declared()
        .rule(
            RuleBuilder::new("adults")
                .fact("$p", "Person")
                .when(["$p.age"], adult)
                .build(),
        )
        .build()
        .unwrap();

    let person = knowledge.layout(knowledge.type_id("Person").unwrap());
    assert_eq!(person.alpha().len(), 1);
    assert_eq!(person.active_fields().collect::<Vec<_>>(), vec!["age"]);

    let rule = knowledge.rule("adults").unwrap();
    assert!(matches!(rule.groups(), [GroupPlan::Loose { var: 0 }]));
}

#[test]
fn joined_variables_share_a_group() {
    let knowledge = declared()
        .rule(
            RuleBuilder::new("owners")
                .fact("$p", "Person")
                .fact("$a", "Account")
                .fact("$other", "Person")
                .join("$p.id", "$a.ownerId")
                .build(),
        )
        .build()
        .unwrap();

    let rule = knowledge.rule("owners").unwrap();
    assert_eq!(rule.groups().len(), 2);
    assert_eq!(rule.groups()[0].vars(), &[0, 1]);
    assert_eq!(rule.groups()[1].vars(), &[2]);
    assert_eq!(rule.var_index("$a"), Some(1));
}

#[test]
fn rules_are_ordered_by_salience() {
    let knowledge = declared()
        .rule(RuleBuilder::new("low").fact("$p", "Person").salience(-1).build())
        .rule(RuleBuilder::new("first").fact("$p", "Person").build())
        .rule(RuleBuilder::new("high").fact("$p", "Person").salience(5).build())
        .rule(RuleBuilder::new("second").fact("$p", "Person").build())
        .build()
        .unwrap();

    let names: Vec<_> = knowledge.rules().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["high", "first", "second", "low"]);
}

#[test]
fn rule_properties_are_kept() {
    let knowledge = declared()
        .rule(
            RuleBuilder::new("tagged")
                .fact("$p", "Person")
                .property("group", "audit")
                .build(),
        )
        .build()
        .unwrap();
    let rule = knowledge.rule("tagged").unwrap();
    assert_eq!(rule.properties().get("group"), Some("audit"));
}

// =============================================================================
// Compile Errors
// =============================================================================

fn compile_error(builder: KnowledgeBuilder) -> ErrorKind {
    builder.build().unwrap_err().kind
}

#[test]
fn unknown_types_and_fields() {
    let kind = compile_error(declared().rule(RuleBuilder::new("r").fact("$x", "Ghost").build()));
    assert!(matches!(kind, ErrorKind::UnknownFactType(name) if name == "Ghost"));

    let kind = compile_error(
        declared().rule(
            RuleBuilder::new("r")
                .fact("$p", "Person")
                .when(["$p.height"], adult)
                .build(),
        ),
    );
    assert!(matches!(kind, ErrorKind::UnknownField { .. }));
}

#[test]
fn unresolved_references() {
    for reference in ["$q.age", "age", "$p."] {
        let kind = compile_error(
            declared().rule(
                RuleBuilder::new("r")
                    .fact("$p", "Person")
                    .when([reference], adult)
                    .build(),
            ),
        );
        assert!(
            matches!(kind, ErrorKind::UnresolvedReference(_)),
            "{reference}"
        );
    }
}

#[test]
fn arity_mismatch_is_rejected() {
    let kind = compile_error(
        declared().rule(
            RuleBuilder::new("r")
                .fact("$p", "Person")
                .evaluator(Evaluator::new(2, |_| true), ["$p.age"])
                .build(),
        ),
    );
    assert!(matches!(kind, ErrorKind::Compile(_)));
}

#[test]
fn duplicates_are_rejected() {
    let kind = compile_error(
        declared().rule(
            RuleBuilder::new("r")
                .fact("$p", "Person")
                .fact("$p", "Account")
                .build(),
        ),
    );
    assert!(matches!(kind, ErrorKind::DuplicateDeclaration(_)));

    let kind = compile_error(
        declared()
            .rule(RuleBuilder::new("r").fact("$p", "Person").build())
            .rule(RuleBuilder::new("r").fact("$p", "Person").build()),
    );
    assert!(matches!(kind, ErrorKind::DuplicateDeclaration(_)));
}

#[test]
fn rules_need_fact_variables() {
    let kind = compile_error(declared().rule(RuleBuilder::new("empty").build()));
    assert!(matches!(kind, ErrorKind::Compile(_)));
}

#[test]
fn alpha_limit_is_a_compile_error() {
    let mut rule = RuleBuilder::new("wide").fact("$p", "Person");
    for _ in 0..65 {
        rule = rule.when(["$p.age"], adult);
    }
    let kind = compile_error(declared().rule(rule.build()));
    assert!(matches!(kind, ErrorKind::LimitExceeded(_)));
}
