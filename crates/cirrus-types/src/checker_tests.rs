// Checker tests over parsed sources.

use super::checker::{CheckerConfig, TypeChecker};
use super::error::{CheckError, Diagnostics};
use super::program::{CheckedProgram, InstanceKind};
use super::types::Type;
use cirrus_ast::ast::{Decl, Expr, Lit, Program, VarDecl};
use cirrus_ast::span::Span;
use cirrus_parse::parse_str;

fn check(src: &str) -> Result<CheckedProgram, Diagnostics> {
    let program = parse_str("<test>", src).expect("parse failed");
    TypeChecker::new().check_program(&program)
}

fn errors(src: &str) -> Diagnostics {
    match check(src) {
        Ok(_) => panic!("expected errors for:\n{src}"),
        Err(d) => d,
    }
}

fn sp() -> Span {
    Span { start: 0, end: 0 }
}

// ============================================================================
// Declarations and inference
// ============================================================================

#[test]
fn untyped_var_infers_literal_types() {
    let p = check(
        r#"
        var name = "web"
        var size = 2 * 3
        var flags = [true, false]
        var mixed = [1, "a"]
        "#,
    )
    .unwrap();
    assert_eq!(p.lookup("name"), Some(&Type::string()));
    assert_eq!(p.lookup("size"), Some(&Type::number()));
    assert_eq!(p.lookup("flags"), Some(&Type::array(Type::boolean())));
    assert_eq!(
        p.lookup("mixed"),
        Some(&Type::array(Type::union([Type::number(), Type::string()])))
    );
}

#[test]
fn string_concatenation() {
    let p = check(r#"var label = "node-" + 3"#).unwrap();
    assert_eq!(p.lookup("label"), Some(&Type::string()));
}

#[test]
fn typed_var_mismatch() {
    let d = errors(r#"var number port = "80""#);
    assert!(d.mentions("var 'port': expected number, found string"));
}

#[test]
fn typed_vars_may_be_used_before_declaration() {
    let p = check(
        r#"
        var number a = b + 1
        var number b = 1
        "#,
    );
    assert!(p.is_ok());
}

#[test]
fn untyped_vars_are_not_visible_before_declaration() {
    let d = errors(
        r#"
        var a = b
        var b = 1
        "#,
    );
    assert!(matches!(&d.errors()[0], CheckError::NotFound { name, .. } if name == "b"));
}

#[test]
fn duplicate_declaration() {
    let d = errors(
        r#"
        input string region
        var region = "eu"
        "#,
    );
    assert!(matches!(
        &d.errors()[0],
        CheckError::DeclarationExists { name, .. } if name == "region"
    ));
}

#[test]
fn aliases_resolve_in_any_order() {
    let p = check(
        r#"
        type Regions = Region[]
        type Region = string
        input Regions regions = ["eu", "us"]
        "#,
    )
    .unwrap();
    assert_eq!(p.lookup("regions"), Some(&Type::array(Type::string())));
}

#[test]
fn alias_is_not_a_value() {
    let d = errors(
        r#"
        type Region = string
        var r = Region
        "#,
    );
    assert!(d.mentions("'Region' is a type, not a value"));
}

#[test]
fn unknown_alias_target() {
    let d = errors("type A = Missing");
    assert!(matches!(&d.errors()[0], CheckError::NotFound { name, .. } if name == "Missing"));
}

#[test]
fn object_literal_duplicate_key() {
    let d = errors(r#"var o = { a: 1, a: 2 }"#);
    assert!(d.mentions("duplicate key 'a'"));
}

#[test]
fn functions_check_arity_and_argument_types() {
    let p = check(
        r#"
        fun add(number a, number b) number { a + b }
        var number total = add(1, 2)
        "#,
    );
    assert!(p.is_ok());

    let d = errors(
        r#"
        fun add(number a, number b) number { a + b }
        var total = add(1)
        "#,
    );
    assert!(d.mentions("function expects 2 arguments, found 1"));

    let d = errors(
        r#"
        fun add(number a, number b) number { a + b }
        var total = add(1, "2")
        "#,
    );
    assert!(d.mentions("argument 2: expected number, found string"));
}

#[test]
fn function_return_type_is_inferred_from_body() {
    let p = check(r#"fun greet(string who) { "hello " + who }"#).unwrap();
    assert_eq!(
        p.lookup("greet"),
        Some(&Type::function(vec![Type::string()], Type::string()))
    );
}

#[test]
fn function_body_must_match_declared_return() {
    let d = errors(r#"fun f(number a) string { a }"#);
    assert!(d.mentions("body of fun 'f': expected string, found number"));
}

#[test]
fn operator_mismatch() {
    let d = errors(r#"var x = !1"#);
    assert!(d.mentions("operator ! expects boolean, found number"));
    let d = errors(r#"var x = true * 2"#);
    assert!(d.mentions("operator * cannot be applied to boolean and number"));
}

#[test]
fn expression_depth_is_limited() {
    let mut value = Expr::Lit(Lit::Int(1), sp());
    for _ in 0..10 {
        value = Expr::Paren {
            inner: Box::new(value),
            span: sp(),
        };
    }
    let program = Program {
        items: vec![Decl::Var(VarDecl {
            annotations: vec![],
            ty: None,
            name: cirrus_ast::ast::Ident {
                text: "deep".into(),
                span: sp(),
            },
            value,
            span: sp(),
        })],
        span: sp(),
    };
    let checker = TypeChecker::new().with_config(CheckerConfig {
        max_expr_depth: 4,
        ..CheckerConfig::default()
    });
    let d = checker.check_program(&program).unwrap_err();
    assert!(d.mentions("expression nesting exceeds depth limit of 4"));
}

// ============================================================================
// Schemas and resources
// ============================================================================

const VM: &str = r#"
    schema vm {
        string name = "vm"
        number size = 1
    }
"#;

#[test]
fn resource_properties_are_checked_against_schema() {
    let d = errors(&format!("{VM}\nresource vm a {{ size = \"large\" }}"));
    assert!(d.mentions("property 'size' of resource 'a': expected number, found string"));

    let d = errors(&format!("{VM}\nresource vm a {{ disk = 10 }}"));
    assert!(d.mentions("schema 'vm' has no property 'disk'"));

    let d = errors(&format!("{VM}\nresource vm a {{ size = 1\n size = 2 }}"));
    assert!(d.mentions("property 'size' of resource 'a' is initialised more than once"));
}

#[test]
fn required_schema_properties() {
    let d = errors(
        r#"
        schema db { string engine }
        resource db main {}
        "#,
    );
    assert!(d.mentions("resource 'main' is missing required property 'engine'"));
}

#[test]
fn schema_default_must_match_property_type() {
    let d = errors(r#"schema vm { number size = "big" }"#);
    assert!(d.mentions("default of property 'size' in schema 'vm': expected number, found string"));
}

#[test]
fn schema_collects_its_instances() {
    let p = check(&format!("{VM}\nresource vm a {{}}\nresource vm b {{}}")).unwrap();
    let Some(Type::Schema(schema)) = p.lookup("vm") else {
        panic!("expected schema");
    };
    let names: Vec<&str> = schema.instances.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn resource_of_non_schema() {
    let d = errors(
        r#"
        input number vm
        resource vm a {}
        "#,
    );
    assert!(d.mentions("resource 'a' names 'vm' which is number, not a schema"));
}

#[test]
fn property_reads_create_implicit_dependencies() {
    let p = check(&format!(
        "{VM}\nresource vm b {{ name = a.name }}\nresource vm c {{ name = vm.b.name }}\nresource vm a {{}}"
    ))
    .unwrap();
    let deps: Vec<&String> = p.dependencies("b").unwrap().iter().collect();
    assert_eq!(deps, vec!["a"]);
    let deps: Vec<&String> = p.dependencies("c").unwrap().iter().collect();
    assert_eq!(deps, vec!["b"]);
    assert_eq!(p.evaluation_order(), ["a", "b", "c"]);
}

#[test]
fn instance_metadata_is_recorded() {
    let p = check(&format!(
        "{VM}\n@tags({{ env: \"prod\" }})\n@provider(\"aws\")\n@count(3)\n@existing(\"arn:aws:ec2:us-east-1:123456789012:instance/i-1\")\nresource vm web {{}}"
    ))
    .unwrap();
    let web = p.instance("web").unwrap();
    assert_eq!(web.kind, InstanceKind::Resource { schema: "vm".into() });
    assert_eq!(web.tags.get("env"), Some(&Some("prod".to_string())));
    assert!(web.providers.contains("aws"));
    assert_eq!(web.count, Some(3));
    assert_eq!(
        web.existing.as_ref().map(|e| e.kind),
        Some(crate::decorators::ImportRef::Arn)
    );
}

// ============================================================================
// Components
// ============================================================================

const APP: &str = r#"
    schema bucket { string name = "b" }
    resource bucket logs {}
    component app {
        input string region = "eu"
        input number replicas
        resource bucket data { name = logs.name }
        output string id = data.name
    }
"#;

#[test]
fn component_instances_check_inputs() {
    let p = check(&format!("{APP}\ncomponent app web {{ replicas = 2 }}"));
    assert!(p.is_ok());

    let d = errors(&format!("{APP}\ncomponent app web {{}}"));
    assert!(d.mentions("component instance 'web' is missing required input 'replicas'"));

    let d = errors(&format!("{APP}\ncomponent app web {{ replicas = \"2\" }}"));
    assert!(d.mentions("input 'replicas' of component instance 'web': expected number, found string"));

    let d = errors(&format!("{APP}\ncomponent app web {{ replicas = 2\n zone = \"a\" }}"));
    assert!(d.mentions("component 'app' has no input 'zone'"));
}

#[test]
fn component_body_names_are_qualified() {
    let p = check(&format!("{APP}\ncomponent app web {{ replicas = 2 }}")).unwrap();
    assert!(p.instance("app.data").is_some());
    assert_eq!(p.component_order("app"), Some(&["app.data".to_string()][..]));
    let names: Vec<&str> = p
        .component_bindings("app")
        .unwrap()
        .map(|(n, _)| n)
        .collect();
    assert!(names.contains(&"region"));
    assert!(names.contains(&"data"));
}

#[test]
fn external_reads_make_instances_depend_on_globals() {
    let p = check(&format!("{APP}\ncomponent app web {{ replicas = 2 }}")).unwrap();
    assert!(p.dependencies("web").unwrap().contains("logs"));
    assert!(p.dependencies("app.data").unwrap().contains("logs"));
    assert_eq!(p.evaluation_order(), ["logs", "web"]);
}

#[test]
fn component_outputs_are_readable() {
    let p = check(&format!(
        "{APP}\nresource bucket mirror {{ name = web.id }}\ncomponent app web {{ replicas = 2 }}"
    ))
    .unwrap();
    assert!(p.dependencies("mirror").unwrap().contains("web"));

    let d = errors(&format!(
        "{APP}\nresource bucket mirror {{ name = web.missing }}\ncomponent app web {{ replicas = 2 }}"
    ));
    assert!(d.mentions("component app web has no output 'missing'"));
}

#[test]
fn nested_component_definitions_are_rejected() {
    let d = errors(
        r#"
        component outer {
            component inner {}
        }
        "#,
    );
    assert!(d.mentions("component definitions cannot be nested"));
}

#[test]
fn components_instantiating_each_other_form_a_cycle() {
    let d = errors(
        r#"
        component a { component b inner {} }
        component b { component a inner {} }
        "#,
    );
    assert!(d.errors().iter().any(CheckError::is_cycle));
}

// ============================================================================
// Decorator pipeline
// ============================================================================

#[test]
fn unknown_decorator() {
    let d = errors("@frobnicate input string x");
    assert!(d.mentions("unknown decorator @frobnicate"));
}

#[test]
fn shape_failure_stops_the_declaration_pipeline() {
    // the bad @minValue argument is reported; @unique's restriction is not
    let d = errors(r#"@minValue("ten") @unique input number x"#);
    assert_eq!(d.len(), 1);
    assert!(d.mentions("@minValue expects"));
}

#[test]
fn a_halt_is_local_to_its_own_annotation_list() {
    // the shape failure is in the second annotation of `a`'s list
    let d = errors(
        r#"
        @unique @minValue("ten") input string a
        @unique input string b
        component app {
            @unique input string a
        }
        "#,
    );
    assert_eq!(d.len(), 3, "{d}");
    assert!(d.mentions("@minValue expects"));
    assert!(d.mentions("@unique cannot be applied to 'b' of type string"));
    assert!(d.mentions("@unique cannot be applied to 'a' of type string"));
}

#[test]
fn decorators_on_aliases_are_rejected() {
    let d = errors(r#"@description("region") type Region = string"#);
    assert!(d.mentions("decorators cannot be applied to type alias 'Region'"));
}

#[test]
fn deferred_checks_are_collected() {
    let src = r#"
        @allowed(["dev", "prod"]) input string env = "qa"
        @nonEmpty input string name
    "#;
    let program = parse_str("<test>", src).unwrap();
    let checker = TypeChecker::new().with_config(CheckerConfig {
        validate_defaults: false,
        ..CheckerConfig::default()
    });
    let p = checker.check_program(&program).unwrap();
    let names: Vec<&str> = p.deferred_checks().iter().map(|c| c.decorator()).collect();
    assert_eq!(names, vec!["allowed", "nonEmpty"]);
    assert!(p.deferred_checks()[1].default_value().is_none());

    let d = p.validate_defaults().unwrap_err();
    assert_eq!(
        d.errors()[0].to_string(),
        "@allowed on 'env': value \"qa\" is not one of the allowed values [\"dev\", \"prod\"]"
    );
}

#[test]
fn check_is_repeatable() {
    let src = format!(
        "{VM}\n@dependsOn(vm.c) resource vm b {{}}\nresource vm c {{}}\n@minValue(1) input number n = 1"
    );
    let program = parse_str("<test>", &src).unwrap();
    let checker = TypeChecker::new();
    let first = checker.check_program(&program).unwrap();
    let second = checker.check_program(&program).unwrap();
    assert_eq!(first.evaluation_order(), second.evaluation_order());
    assert_eq!(first.deferred_checks().len(), second.deferred_checks().len());
}
