use cirrus_ast::ast::{Decl, Expr, Lit, TypeExpr};
use cirrus_parse::parse_str;

#[test]
fn schema_resource_and_forward_reference_parse() {
    let m = parse_str(
        "<mem>",
        r#"
        schema vm {
            string name = "default"
            number size
        }
        resource vm first {}
        @dependsOn([vm.first, vm.third])
        resource vm second { name = "b" }
        resource vm third {}
        "#,
    )
    .unwrap();
    assert_eq!(m.items.len(), 4);

    let Decl::Schema(schema) = &m.items[0] else {
        panic!("expected schema");
    };
    assert_eq!(schema.properties.len(), 2);
    assert!(schema.properties[0].default.is_some());
    assert!(schema.properties[1].default.is_none());

    let Decl::Resource(second) = &m.items[2] else {
        panic!("expected resource");
    };
    assert_eq!(second.schema.text, "vm");
    assert_eq!(second.name.text, "second");
    assert_eq!(second.annotations.len(), 1);
    assert_eq!(second.body[0].name.text, "name");
}

#[test]
fn component_definition_versus_instance() {
    let m = parse_str(
        "<mem>",
        r#"
        component app {
            input string region = "eu"
            output string id = region
        }
        component app web { region = "us" }
        "#,
    )
    .unwrap();
    let Decl::Component(def) = &m.items[0] else {
        panic!("expected component definition");
    };
    assert_eq!(def.body.len(), 2);
    let Decl::Instance(inst) = &m.items[1] else {
        panic!("expected component instance");
    };
    assert_eq!(inst.component.text, "app");
    assert_eq!(inst.name.text, "web");
}

#[test]
fn array_and_union_types() {
    let m = parse_str(
        "<mem>",
        "input string[] names\ntype Size = number | string\nvar (string | number)[] mixed = [1, 'a']",
    )
    .unwrap();
    let Decl::Input(input) = &m.items[0] else {
        panic!("expected input");
    };
    assert!(matches!(input.ty, TypeExpr::Array { .. }));
    let Decl::TypeAlias(alias) = &m.items[1] else {
        panic!("expected alias");
    };
    assert!(matches!(&alias.ty, TypeExpr::Union { variants, .. } if variants.len() == 2));
    let Decl::Var(var) = &m.items[2] else {
        panic!("expected var");
    };
    match &var.ty {
        Some(TypeExpr::Array { elem, .. }) => assert!(matches!(**elem, TypeExpr::Union { .. })),
        other => panic!("expected array of union, got {:?}", other),
    }
}

#[test]
fn untyped_var_and_object_literal() {
    let m = parse_str("<mem>", "var tags = { env: 'prod', type: \"web\" }").unwrap();
    let Decl::Var(var) = &m.items[0] else {
        panic!("expected var");
    };
    assert!(var.ty.is_none());
    match &var.value {
        Expr::Object { fields, .. } => {
            assert_eq!(fields[0].key.text, "env");
            assert_eq!(fields[1].key.text, "type");
        }
        other => panic!("expected object literal, got {:?}", other),
    }
}

#[test]
fn function_declaration() {
    let m = parse_str("<mem>", "fun add(number a, number b) number { a + b }").unwrap();
    let Decl::Fun(f) = &m.items[0] else {
        panic!("expected fun");
    };
    assert_eq!(f.params.len(), 2);
    assert!(f.ret.is_some());
    assert!(matches!(f.body, Expr::Binary { .. }));
}

#[test]
fn negative_literal_is_unary() {
    let m = parse_str("<mem>", "input number x = -3").unwrap();
    let Decl::Input(input) = &m.items[0] else {
        panic!("expected input");
    };
    match input.default.as_ref() {
        Some(Expr::Unary { expr, .. }) => assert!(matches!(**expr, Expr::Lit(Lit::Int(3), _))),
        other => panic!("expected unary minus, got {:?}", other),
    }
}
