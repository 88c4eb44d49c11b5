//! Integration tests for decorator checking

use cirrus_parse::parse_str;
use cirrus_types::{CheckError, CheckedProgram, Diagnostics, TypeChecker};

fn check(src: &str) -> Result<CheckedProgram, Diagnostics> {
    let program = parse_str("<test>", src).expect("parse failed");
    TypeChecker::new().check_program(&program)
}

fn single_error(src: &str) -> CheckError {
    let diags = check(src).expect_err("expected a diagnostic");
    assert_eq!(diags.len(), 1, "unexpected diagnostics: {diags}");
    diags.errors()[0].clone()
}

#[test]
fn decorator_on_wrong_target() {
    let err = single_error("@unique var string[] names = [\"a\"]");
    assert!(err.is_type_error());
    assert_eq!(
        err.to_string(),
        "@unique cannot be applied to a var 'names' (allowed on: input, output)"
    );

    let err = single_error("@existing(\"my-db\") input string db");
    assert!(err.is_type_error());
}

#[test]
fn unique_needs_an_array() {
    let err = single_error("@unique input string x");
    assert_eq!(
        err.to_string(),
        "@unique cannot be applied to 'x' of type string (expected array)"
    );
    assert!(check("@unique input string[] x").is_ok());
    assert!(check("@unique() input string[] x").is_ok());
    assert!(check("@unique input (string | number)[] x").is_ok());
}

#[test]
fn only_unique_accepts_empty_parens() {
    let err = single_error("@nonEmpty() input string x");
    assert_eq!(err.to_string(), "@nonEmpty does not take arguments");
}

#[test]
fn allowed_rules() {
    assert!(check(r#"@allowed(["dev", "prod"]) input string env = "dev""#).is_ok());
    assert!(check(r#"@allowed([1, 2, 3]) input number[] sizes = [1, 3]"#).is_ok());

    let err = single_error(r#"@allowed(["dev", "prod"]) input any env"#);
    assert_eq!(
        err.to_string(),
        "@allowed cannot be applied to 'env' of type any (expected string, number, array, object)"
    );

    let err = single_error(r#"@allowed(["dev", 2]) input string env"#);
    assert_eq!(
        err.to_string(),
        "@allowed value 2 is not compatible with 'env' of type string"
    );

    let err = single_error(r#"@allowed(["dev", "prod"]) input string env = "qa""#);
    assert!(matches!(err, CheckError::Validation { .. }));

    let err = single_error(r#"@allowed([1, 2]) input number[] sizes = [1, 5]"#);
    assert_eq!(
        err.to_string(),
        "@allowed on 'sizes': element at index 1 (5) is not one of the allowed values [1, 2]"
    );
}

#[test]
fn min_value_is_checked_at_evaluation_or_rejected_by_type() {
    let err = single_error("@minValue(10) input number x = 9");
    assert_eq!(
        err,
        CheckError::Validation {
            decorator: "minValue".into(),
            target: "x".into(),
            message: "value 9 is less than the minimum 10".into(),
        }
    );

    let err = single_error("@minValue(10) input string x");
    assert!(err.is_type_error());
    assert_eq!(
        err.to_string(),
        "@minValue cannot be applied to 'x' of type string (expected number, number[])"
    );

    let p = check("@minValue(10) input number x").unwrap();
    assert_eq!(p.deferred_checks().len(), 1);
}

#[test]
fn bound_arguments_are_range_checked() {
    let err = single_error("@maxValue(999999) input number x");
    assert_eq!(
        err.to_string(),
        "@maxValue argument 999999 is out of range (expected 0 to 999998)"
    );
    let err = single_error("schema vm {}\n@count(1000) resource vm a {}");
    assert_eq!(
        err.to_string(),
        "@count argument 1000 is out of range (expected 0 to 999)"
    );
}

#[test]
fn unique_uses_structural_equality() {
    let err = single_error("@unique input object[] envs = [{env: 'prod'}, {env: 'prod'}]");
    assert_eq!(
        err.to_string(),
        "@unique on 'envs': duplicate element { env: \"prod\" } at index 1 (first seen at index 0)"
    );
    assert!(check("@unique input object[] envs = [{env: 'prod'}, {env: 'dev'}]").is_ok());
}

#[test]
fn validate_names_index_and_value() {
    let err = single_error(r#"@validate(regex = "^env-[a-z]+$") input string[] envs = ["env-dev", "prod"]"#);
    let message = err.to_string();
    assert!(message.contains("index 1"), "{message}");
    assert!(message.contains("\"prod\""), "{message}");

    assert!(check(r#"@validate(preset = "kebab") input string name = "my-app""#).is_ok());
}

#[test]
fn validate_rejects_non_string_targets() {
    for ty in ["number", "any", "object"] {
        let err = single_error(&format!(r#"@validate(preset = "kebab") input {ty} x"#));
        assert!(err.is_type_error(), "{ty}: {err}");
    }
}

#[test]
fn validate_reads_parenthesised_arguments() {
    assert!(check(r#"@validate(regex = ("^a$")) input string x = "a""#).is_ok());
    let err = single_error(r#"@validate(preset = ("kebab"), message = ("bad name")) input string x = "A_b""#);
    assert!(err.to_string().contains("bad name"), "{err}");
}

#[test]
fn invalid_regex_is_rejected_before_evaluation() {
    let err = single_error(r#"@validate(regex = "([a-z") input string x"#);
    assert!(err.is_type_error());
}

#[test]
fn instance_only_decorators_reject_definitions() {
    for decorator in [r#"@tags("web")"#, r#"@provider("aws")"#, "@dependsOn(other)"] {
        let err = single_error(&format!("{decorator} component app {{}}"));
        assert!(
            err.to_string()
                .ends_with("cannot be applied to the definition of component 'app'; decorate a component instance instead"),
            "{err}"
        );
    }
}

#[test]
fn tags_on_instances() {
    let p = check(
        r#"
        component app {}
        @tags(["web", "public"])
        @provider(["aws", "aws"])
        component app web {}
        "#,
    )
    .unwrap();
    let web = p.instance("web").unwrap();
    assert_eq!(web.tags.len(), 2);
    assert_eq!(web.providers.len(), 1);
}

#[test]
fn parenthesised_tag_values_are_collected() {
    let p = check(
        r#"
        schema vm {}
        @tags({ env: ("prod") })
        @provider(("aws"))
        @existing(("i-0123abcd"))
        resource vm a {}
        "#,
    )
    .unwrap();
    let a = p.instance("a").unwrap();
    assert_eq!(a.tags.get("env"), Some(&Some("prod".to_string())));
    assert!(a.providers.contains("aws"));
    assert_eq!(a.existing.as_ref().unwrap().reference, "i-0123abcd");
}

#[test]
fn existing_requires_a_recognised_reference() {
    let err = single_error(
        r#"
        schema vm {}
        @existing("not a reference") resource vm a {}
        "#,
    );
    assert!(err.to_string().starts_with("@existing value \"not a reference\""));
    assert!(check("schema vm {}\n@existing(\"i-0123abcd\") resource vm a {}").is_ok());
}

#[test]
fn failures_in_one_declaration_do_not_mask_siblings() {
    let diags = check(
        r#"
        @unique input string a
        @nonEmpty input number b
        @sensitive input string c
        "#,
    )
    .unwrap_err();
    assert_eq!(diags.len(), 2);
    assert!(diags.errors().iter().all(CheckError::is_type_error));
}

#[test]
fn schema_property_decorators() {
    assert!(check(r#"schema db { @description("engine") string engine = "postgres" }"#).is_ok());
    let err = single_error(r#"schema db { @minLength(3) string engine = "postgres" }"#);
    assert_eq!(
        err.to_string(),
        "@minLength cannot be applied to a schema property 'engine' (allowed on: input, output)"
    );
}
