//! Integration tests for dependency linking and evaluation order

use cirrus_parse::parse_str;
use cirrus_types::{CheckError, CheckedProgram, Diagnostics, TypeChecker};

fn check(src: &str) -> Result<CheckedProgram, Diagnostics> {
    let program = parse_str("<test>", src).expect("parse failed");
    TypeChecker::new().check_program(&program)
}

fn cycle_path(src: &str) -> Vec<String> {
    let diags = check(src).expect_err("expected a cycle");
    diags
        .errors()
        .iter()
        .find_map(|e| match e {
            CheckError::Cycle { path } => Some(path.clone()),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no cycle in: {diags}"))
}

#[test]
fn forward_references_resolve() {
    let p = check(
        r#"
        schema vm {}
        resource vm first {}
        @dependsOn([vm.first, vm.third])
        resource vm second {}
        resource vm third {}
        "#,
    )
    .unwrap();
    let deps: Vec<&str> = p
        .dependencies("second")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(deps, vec!["first", "third"]);
    assert_eq!(p.evaluation_order(), ["first", "third", "second"]);
}

#[test]
fn long_dependency_chains_are_ordered() {
    const N: usize = 20_000;
    let mut src = String::from("schema vm {}\n");
    for i in 0..N - 1 {
        src.push_str(&format!("@dependsOn(vm.r{}) resource vm r{} {{}}\n", i + 1, i));
    }
    src.push_str(&format!("resource vm r{} {{}}\n", N - 1));

    let p = check(&src).unwrap();
    let order = p.evaluation_order();
    assert_eq!(order.len(), N);
    assert_eq!(order[0], format!("r{}", N - 1));
    assert_eq!(order[N - 1], "r0");

    let cyclic = src.replace(
        &format!("resource vm r{} {{}}", N - 1),
        &format!("@dependsOn(vm.r0) resource vm r{} {{}}", N - 1),
    );
    assert_eq!(cycle_path(&cyclic).len(), N + 1);
}

#[test]
fn bare_and_qualified_references() {
    let p = check(
        r#"
        schema vm {}
        @dependsOn(b) resource vm a {}
        @dependsOn(vm.c) resource vm b {}
        resource vm c {}
        "#,
    )
    .unwrap();
    assert_eq!(p.evaluation_order(), ["c", "b", "a"]);
}

#[test]
fn cycle_detection_is_symmetric() {
    let forward = cycle_path(
        r#"
        schema vm {}
        @dependsOn(vm.third) resource vm second {}
        @dependsOn(vm.second) resource vm third {}
        "#,
    );
    assert_eq!(forward, vec!["second", "third", "second"]);

    let backward = cycle_path(
        r#"
        schema vm {}
        @dependsOn(vm.second) resource vm third {}
        @dependsOn(vm.third) resource vm second {}
        "#,
    );
    assert_eq!(backward, vec!["third", "second", "third"]);
}

#[test]
fn cycles_through_arrays_and_implicit_reads() {
    let path = cycle_path(
        r#"
        schema vm { string name = "x" }
        @dependsOn([vm.b, vm.c]) resource vm a {}
        resource vm b {}
        resource vm c { name = a.name }
        "#,
    );
    assert_eq!(path, vec!["a", "c", "a"]);
}

#[test]
fn self_dependency_is_a_cycle() {
    let path = cycle_path("schema vm {}\n@dependsOn(vm.a) resource vm a {}");
    assert_eq!(path, vec!["a", "a"]);
}

#[test]
fn unresolved_reference_is_a_type_error() {
    let diags = check(
        r#"
        schema vm {}
        @dependsOn(vm.missing) resource vm a {}
        "#,
    )
    .unwrap_err();
    assert_eq!(diags.len(), 1);
    assert!(diags.errors()[0].is_type_error());
    assert_eq!(
        diags.errors()[0].to_string(),
        "@dependsOn reference vm.missing is not declared"
    );
}

#[test]
fn reference_kind_must_match() {
    let diags = check(
        r#"
        schema vm {}
        schema db {}
        resource db main {}
        @dependsOn(vm.main) resource vm a {}
        "#,
    )
    .unwrap_err();
    assert_eq!(
        diags.errors()[0].to_string(),
        "@dependsOn reference vm.main does not name an instance of vm"
    );

    let diags = check(
        r#"
        schema vm {}
        input string region
        @dependsOn(region) resource vm a {}
        "#,
    )
    .unwrap_err();
    assert_eq!(
        diags.errors()[0].to_string(),
        "@dependsOn reference region does not name a resource or component instance"
    );
}

#[test]
fn component_instances_join_the_graph() {
    let p = check(
        r#"
        schema vm { string name = "x" }
        component app {
            input string name
            output string id = name
        }
        @dependsOn(app.web) resource vm edge {}
        component app web { name = db.name }
        resource vm db {}
        "#,
    )
    .unwrap();
    assert_eq!(p.evaluation_order(), ["db", "web", "edge"]);
}

#[test]
fn component_bodies_have_their_own_order() {
    let p = check(
        r#"
        schema vm { string name = "x" }
        component app {
            resource vm b { name = a.name }
            resource vm a {}
        }
        resource vm a {}
        component app web {}
        "#,
    )
    .unwrap();
    assert_eq!(
        p.component_order("app").unwrap(),
        ["app.a", "app.b"]
    );
    // body-local `a` shadows the global one
    assert_eq!(p.evaluation_order(), ["a", "web"]);
    assert!(!p.dependencies("web").unwrap().contains("a"));
}

#[test]
fn checking_twice_gives_identical_results() {
    let src = r#"
        schema vm { string name = "x" }
        resource vm b { name = a.name }
        resource vm a {}
        var label = "vm-" + 1
    "#;
    let program = parse_str("<test>", src).unwrap();
    let checker = TypeChecker::new();
    let first = checker.check_program(&program).unwrap();
    let second = checker.check_program(&program).unwrap();
    assert_eq!(first.evaluation_order(), second.evaluation_order());
    let first_types: Vec<_> = first.globals().map(|(n, t)| (n.to_string(), t.clone())).collect();
    let second_types: Vec<_> = second.globals().map(|(n, t)| (n.to_string(), t.clone())).collect();
    assert_eq!(first_types, second_types);
}
