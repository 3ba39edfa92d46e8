mod common;

use common::{PodMach, Scale, TubeWall};
use hyperloop_sim::{
    EvalError, ExecComp, Group, IndepVarComp, Problem, ProblemError, SetupError,
};

fn position(order: &[&str], name: &str) -> usize {
    order
        .iter()
        .position(|c| *c == name)
        .unwrap_or_else(|| panic!("{} not scheduled", name))
}

#[test]
fn test_execution_order_respects_connections() {
    let mut root = Group::new();
    root.add("c", Scale(1.0), &[]).unwrap();
    root.add("a", Scale(1.0), &[]).unwrap();
    root.add("d", Scale(1.0), &[]).unwrap();
    root.add("b", Scale(1.0), &[]).unwrap();
    root.connect("a.y", "b.x")
        .connect("b.y", "c.x")
        .connect("a.y", "d.x");

    let p = Problem::setup(root).unwrap();
    let order = p.execution_order();
    assert_eq!(order.len(), 4);
    assert!(position(&order, "a") < position(&order, "b"));
    assert!(position(&order, "b") < position(&order, "c"));
    assert!(position(&order, "a") < position(&order, "d"));

    let vars = p.variable_order();
    assert!(position(&vars, "a.y") < position(&vars, "b.x"));
    assert!(position(&vars, "b.y") < position(&vars, "c.x"));
}

#[test]
fn test_setup_is_deterministic() {
    fn build() -> Problem {
        let mut root = Group::new();
        root.add("z", Scale(2.0), &[]).unwrap();
        root.add("m", Scale(3.0), &[]).unwrap();
        root.add("a", Scale(4.0), &[]).unwrap();
        root.add("q", Scale(5.0), &[]).unwrap();
        root.connect("z.y", "a.x").connect("m.y", "q.x");
        Problem::setup(root).unwrap()
    }

    let mut first = build();
    let mut second = build();
    assert_eq!(first.execution_order(), second.execution_order());
    assert_eq!(first.variable_order(), second.variable_order());

    first.run_once().unwrap();
    second.run_once().unwrap();
    assert_eq!(first.variables(), second.variables());
}

#[test]
fn test_duplicate_connection_rejected() {
    let mut root = Group::new();
    root.add("a", Scale(1.0), &[]).unwrap();
    root.add("b", Scale(1.0), &[]).unwrap();
    root.add("c", Scale(1.0), &[]).unwrap();
    root.connect("a.y", "c.x").connect("b.y", "c.x");

    let errors = Problem::setup(root).err().unwrap();
    assert_eq!(
        errors.0,
        vec![SetupError::DuplicateConnection {
            target: "c.x".to_string(),
            existing: "a.y".to_string(),
        }]
    );
}

#[test]
fn test_connection_into_promoted_output_alias_is_duplicate() {
    let mut root = Group::new();
    root.add("des", IndepVarComp::new("x", 1.0), &["x"]).unwrap();
    root.add("s", Scale(1.0), &["x"]).unwrap();
    root.add("other", Scale(1.0), &[]).unwrap();
    root.connect("other.y", "s.x");

    let errors = Problem::setup(root).err().unwrap();
    assert!(matches!(
        &errors.0[..],
        [SetupError::DuplicateConnection { target, existing }]
            if target == "s.x" && existing == "des.x"
    ));
}

#[test]
fn test_connection_into_promoted_name_with_output_is_duplicate() {
    let mut root = Group::new();
    root.add("des", IndepVarComp::new("x", 1.0), &["x"]).unwrap();
    root.add("s", Scale(1.0), &["x"]).unwrap();
    root.add("o", Scale(1.0), &[]).unwrap();
    root.connect("o.y", "x");

    let errors = Problem::setup(root).err().unwrap();
    assert_eq!(
        errors.0,
        vec![SetupError::DuplicateConnection {
            target: "x".to_string(),
            existing: "des.x".to_string(),
        }]
    );
}

#[test]
fn test_promoted_parameter_name_is_not_a_source() {
    let mut root = Group::new();
    root.add("a", Scale(1.0), &["x"]).unwrap();
    root.add("b", Scale(1.0), &[]).unwrap();
    root.connect("x", "b.x");

    let errors = Problem::setup(root).err().unwrap();
    assert_eq!(
        errors.0,
        vec![SetupError::RoleMismatch {
            path: "x".to_string(),
            expected: "output",
        }]
    );
}

#[test]
fn test_role_mismatches_reported_together() {
    let mut root = Group::new();
    root.add("a", Scale(1.0), &[]).unwrap();
    root.add("b", Scale(1.0), &[]).unwrap();
    // output -> output, then parameter -> parameter
    root.connect("a.y", "b.y").connect("a.x", "b.x");

    let errors = Problem::setup(root).err().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(
        errors.0[0],
        SetupError::RoleMismatch {
            path: "b.y".to_string(),
            expected: "parameter",
        }
    );
    assert_eq!(
        errors.0[1],
        SetupError::RoleMismatch {
            path: "a.x".to_string(),
            expected: "output",
        }
    );
}

#[test]
fn test_unknown_names_reported_with_scope() {
    let mut sub = Group::new();
    sub.add("a", Scale(1.0), &[]).unwrap();
    sub.connect("a.missing", "a.x");

    let mut root = Group::new();
    root.add_group("sub", sub, &[]).unwrap();
    root.promote("sub", "nothing", "nothing");

    let errors = Problem::setup(root).err().unwrap();
    assert!(errors.iter().any(|e| matches!(
        e,
        SetupError::UnknownVariable { scope, path } if scope == "sub" && path == "a.missing"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        SetupError::UnknownVariable { scope, path } if scope == "<root>" && path == "sub.nothing"
    )));
}

#[test]
fn test_promotion_unifies_shared_parameter() {
    let mut pod = Group::new();
    pod.add("mach", PodMach, &["tube_temp"]).unwrap();
    let mut tube = Group::new();
    tube.add("wall", TubeWall, &["tube_temp"]).unwrap();

    let mut root = Group::new();
    root.add_group("pod", pod, &["tube_temp"]).unwrap();
    root.add_group("tube", tube, &["tube_temp"]).unwrap();

    let mut p = Problem::setup(root).unwrap();
    p.set("tube_temp", 320.0).unwrap();
    p.run_once().unwrap();

    // one logical value under every name
    for path in ["tube_temp", "pod.tube_temp", "pod.mach.tube_temp", "tube.wall.tube_temp"] {
        assert_eq!(p.get(path).unwrap(), 320.0, "{}", path);
    }
    let slot = p.handle("tube_temp").unwrap();
    assert_eq!(
        p.registry().aliases(slot),
        vec!["pod.mach.tube_temp", "tube.wall.tube_temp"]
    );

    let expected_mach = 300.0 / (1.4_f64 * 287.0 * 320.0).sqrt();
    assert!((p.get("pod.mach.mach").unwrap() - expected_mach).abs() < 1e-12);
    assert!((p.get("tube.wall.q_rad").unwrap() - 12.5 * (320.0 - 305.6)).abs() < 1e-9);

    // writing through an alias reaches every member
    p.set("tube.wall.tube_temp", 250.0).unwrap();
    assert_eq!(p.get("pod.mach.tube_temp").unwrap(), 250.0);
}

#[test]
fn test_promoted_output_feeds_promoted_parameter() {
    let mut root = Group::new();
    root.add("temp", ExecComp::new("tube_temp = ambient - 13.6").unwrap(), &["*"])
        .unwrap();
    root.add("wall", TubeWall, &["tube_temp"]).unwrap();

    let mut p = Problem::setup(root).unwrap();
    assert_eq!(p.execution_order(), vec!["temp", "wall"]);
    assert_eq!(
        p.set("tube_temp", 1.0),
        Err(ProblemError::NotSettable("tube_temp".to_string()))
    );

    p.set("ambient", 305.6).unwrap();
    p.run_once().unwrap();
    assert!((p.get("wall.tube_temp").unwrap() - 292.0).abs() < 1e-9);
}

#[test]
fn test_two_promoted_outputs_are_ambiguous() {
    let mut root = Group::new();
    root.add("a", Scale(1.0), &["y"]).unwrap();
    root.add("b", Scale(2.0), &["y"]).unwrap();

    let errors = Problem::setup(root).err().unwrap();
    assert_eq!(
        errors.0,
        vec![SetupError::AmbiguousPromotion {
            scope: "<root>".to_string(),
            name: "y".to_string(),
            outputs: vec!["a.y".to_string(), "b.y".to_string()],
        }]
    );
}

#[test]
fn test_wildcard_promotion_through_nested_groups() {
    let mut inner = Group::new();
    inner.add("s", Scale(2.0), &["*"]).unwrap();
    let mut outer = Group::new();
    outer.add_group("inner", inner, &["*"]).unwrap();
    let mut root = Group::new();
    root.add_group("outer", outer, &["*"]).unwrap();

    let mut p = Problem::setup(root).unwrap();
    p.set("x", 4.0).unwrap();
    p.run_once().unwrap();
    assert_eq!(p.get("y").unwrap(), 8.0);
    assert_eq!(p.get("outer.y").unwrap(), 8.0);
    assert_eq!(p.get("outer.inner.s.y").unwrap(), 8.0);
}

#[test]
fn test_connection_declared_inside_group_is_relative() {
    let mut sub = Group::new();
    sub.add("a", Scale(2.0), &[]).unwrap();
    sub.add("b", Scale(3.0), &[]).unwrap();
    sub.connect("a.y", "b.x");

    let mut root = Group::new();
    root.add_group("sub", sub, &[]).unwrap();
    root.add("after", Scale(1.0), &[]).unwrap();
    root.connect("sub.b.y", "after.x");

    let mut p = Problem::setup(root).unwrap();
    assert_eq!(p.execution_order(), vec!["sub.a", "sub.b", "after"]);
    p.set("sub.a.x", 1.0).unwrap();
    p.run_once().unwrap();
    assert_eq!(p.get("after.y").unwrap(), 6.0);
}

#[test]
fn test_cycle_names_its_variables() {
    let mut root = Group::new();
    root.add("a", Scale(1.0), &[]).unwrap();
    root.add("b", Scale(1.0), &[]).unwrap();
    root.connect("a.y", "b.x").connect("b.y", "a.x");

    let errors = Problem::setup(root).err().unwrap();
    let cycle = errors.cycle().unwrap();
    assert_eq!(cycle, ["a.x", "a.y", "b.x", "b.y"]);
    assert!(errors.to_string().contains("a.y -> b.x"));
}

#[test]
fn test_cycle_through_promotion() {
    let mut root = Group::new();
    root.add("f", ExecComp::new("u = v + 1").unwrap(), &["*"])
        .unwrap();
    root.add("g", ExecComp::new("v = u * 2").unwrap(), &["*"])
        .unwrap();

    let errors = Problem::setup(root).err().unwrap();
    let cycle = errors.cycle().unwrap();
    assert!(cycle.contains(&"f.u".to_string()) || cycle.contains(&"g.u".to_string()));
    assert_eq!(cycle.len(), 2);
}

#[test]
fn test_exec_comp_constraint_expression() {
    let mut root = Group::new();
    root.add("des", IndepVarComp::new("area", 1200.0).with("bypass_area", 0.5), &["*"])
        .unwrap();
    root.add(
        "con",
        ExecComp::new("c = ((area * 0.00065) - bypass_area) / bypass_area").unwrap(),
        &["*"],
    )
    .unwrap();

    let mut p = Problem::setup(root).unwrap();
    p.run_once().unwrap();
    let expected = (1200.0 * 0.00065 - 0.5) / 0.5;
    assert!((p.get("c").unwrap() - expected).abs() < 1e-12);
}

#[test]
fn test_compute_failure_propagates_outside_driver() {
    let mut root = Group::new();
    root.add("mach", PodMach, &[]).unwrap();
    let mut p = Problem::setup(root).unwrap();
    p.set("mach.tube_temp", -1.0).unwrap();

    match p.run_once() {
        Err(EvalError::Compute { component, .. }) => assert_eq!(component, "mach"),
        other => panic!("expected compute error, got {:?}", other),
    }
}
