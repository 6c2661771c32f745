use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use xapi::{Annotation, CallArgs, Entrypoint, Function, Parameter, Signature, Value, Xapi, XapiError};

type Log = Rc<RefCell<Vec<String>>>;

fn recording(log: &Log, signature: Signature) -> Entrypoint {
    let log = log.clone();
    let name = signature.name.clone().unwrap_or_default();
    Entrypoint::from_function(Function::new(signature, move |args: &CallArgs| {
        let mut line = name.clone();
        for value in &args.args {
            line.push_str(&format!(" {}", value));
        }
        for (key, value) in &args.kwargs {
            line.push_str(&format!(" {}={}", key, value));
        }
        log.borrow_mut().push(line);
        Ok(Value::from(name.as_str()))
    }))
    .unwrap()
}

fn run(app: &Xapi, argv: &[&str]) -> Result<Value, XapiError> {
    app.run_from(std::iter::once("prog").chain(argv.iter().copied()))
}

fn logging_effect(log: &Log) -> Entrypoint {
    recording(
        log,
        Signature::new("setup_logging")
            .param(Parameter::positional("log_level").default("WARNING")),
    )
}

#[test]
fn test_effects_run_in_registration_order_before_command() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .effect(logging_effect(&log))
        .effect(recording(&log, Signature::new("second")))
        .entrypoint(recording(&log, Signature::new("main")));

    assert_eq!(run(&app, &["main"]).unwrap(), Value::from("main"));
    assert_eq!(*log.borrow(), vec!["setup_logging", "second", "main"]);
}

#[test]
fn test_effect_flags_are_global() {
    let log: Log = Rc::default();
    let group = Entrypoint::group("stats")
        .subentrypoint(recording(&log, Signature::new("mean")))
        .unwrap();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .effect(logging_effect(&log))
        .entrypoint(group);

    run(&app, &["stats", "mean", "--log-level", "DEBUG"]).unwrap();
    run(&app, &["--log-level", "INFO", "stats", "mean"]).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            "setup_logging log_level=DEBUG",
            "mean",
            "setup_logging log_level=INFO",
            "mean",
        ]
    );
}

#[test]
fn test_parent_chain_runs_outermost_first() {
    let log: Log = Rc::default();
    let parent = recording(
        &log,
        Signature::new("repo").param(Parameter::positional("verbose").annotation(Annotation::Bool).default(false)),
    )
    .subentrypoint(recording(
        &log,
        Signature::new("clone").param(Parameter::positional("url").annotation(Annotation::Str)),
    ))
    .unwrap();
    let app = Xapi::new("prog").exit_on_error(false).entrypoint(parent);

    let result = run(&app, &["repo", "--verbose", "clone", "https://example.com/x.git"]).unwrap();
    assert_eq!(result, Value::from("clone"));
    assert_eq!(
        *log.borrow(),
        vec!["repo verbose=True", "clone https://example.com/x.git"]
    );
}

#[test]
fn test_no_subcommand_exits_5() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .effect(logging_effect(&log))
        .entrypoint(recording(&log, Signature::new("main")));

    let err = run(&app, &[]).unwrap_err();
    assert!(matches!(err, XapiError::EntrypointNotFound));
    assert_eq!(err.exit_code(), 5);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_group_without_callable_exits_20() {
    let log: Log = Rc::default();
    let group = Entrypoint::group("stats")
        .subentrypoint(recording(&log, Signature::new("mean")))
        .unwrap();
    let app = Xapi::new("prog").exit_on_error(false).entrypoint(group);

    let err = run(&app, &["stats"]).unwrap_err();
    assert!(matches!(err, XapiError::MissingCallable(ref name) if name == "stats"));
    assert_eq!(err.exit_code(), 20);
}

#[test]
fn test_conversion_failure_exits_10_without_running_body() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog").exit_on_error(false).entrypoint(recording(
        &log,
        Signature::new("square").param(Parameter::positional("x").annotation(Annotation::Int)),
    ));

    let err = run(&app, &["square", "four"]).unwrap_err();
    assert_eq!(err.exit_code(), 10);
    assert!(err.to_string().contains("four"));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_body_failure_exits_1() {
    let app = Xapi::new("prog").exit_on_error(false).entrypoint(
        Entrypoint::from_function(Function::new(Signature::new("fail"), |_| {
            anyhow::bail!("disk full")
        }))
        .unwrap(),
    );

    let err = run(&app, &["fail"]).unwrap_err();
    assert!(matches!(err, XapiError::Callable { .. }));
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("disk full"));
}

#[test]
fn test_unknown_keywords_harvested_into_collector() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog").exit_on_error(false).entrypoint(recording(
        &log,
        Signature::new("config")
            .param(Parameter::positional("name").annotation(Annotation::Str))
            .param(Parameter::kwargs("options")),
    ));

    run(&app, &["config", "db", "--pool-size", "8", "--readonly", "--tag=a", "--tag=b"]).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["config db pool_size=8 readonly= tag=[a, b]"]
    );
}

#[test]
fn test_collector_on_effect_tolerates_extras() {
    let received: Rc<RefCell<BTreeMap<String, Value>>> = Rc::default();
    let sink = received.clone();
    let effect = Entrypoint::from_function(Function::new(
        Signature::new("settings").param(Parameter::kwargs("overrides")),
        move |args| {
            *sink.borrow_mut() = args.extra::<Value>(&[])?;
            Ok(Value::None)
        },
    ))
    .unwrap();
    let log: Log = Rc::default();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .effect(effect)
        .entrypoint(recording(&log, Signature::new("main")));

    run(&app, &["main", "--theme", "dark"]).unwrap();
    assert_eq!(received.borrow().get("theme"), Some(&Value::from("dark")));
    assert_eq!(*log.borrow(), vec!["main"]);
}

#[test]
fn test_unknown_keywords_rejected_without_collector() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .entrypoint(recording(&log, Signature::new("main")));

    let err = run(&app, &["main", "--color", "red"]).unwrap_err();
    assert!(matches!(err, XapiError::UnrecognizedArguments(ref tokens) if tokens == &["--color"]));
    assert_eq!(err.exit_code(), 2);
    assert!(log.borrow().is_empty());
}

#[test]
fn test_sibling_collector_does_not_cover_strict_command() {
    let log: Log = Rc::default();
    let app = Xapi::new("prog")
        .exit_on_error(false)
        .entrypoint(recording(&log, Signature::new("loose").param(Parameter::kwargs("rest"))))
        .entrypoint(recording(&log, Signature::new("strict")));

    let err = run(&app, &["strict", "--color", "red"]).unwrap_err();
    assert!(matches!(err, XapiError::UnrecognizedArguments(_)));
    assert!(log.borrow().is_empty());
}

#[test]
fn test_required_argument_on_parent_is_rejected() {
    let log: Log = Rc::default();
    let parent = recording(
        &log,
        Signature::new("repo").param(Parameter::positional("path").annotation(Annotation::Str)),
    );
    let err = parent
        .subentrypoint(recording(&log, Signature::new("status")))
        .unwrap_err();
    assert!(matches!(err, XapiError::RequiredArgumentsOnParent { ref parent, ref argument } if parent == "repo" && argument == "path"));
}
