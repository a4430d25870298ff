mod common;

use common::{Buffer, Device, record};
use framegraph::{
    CyclePolicy, Graph, GraphError, GraphOptions, Handle, Hazard, HazardPolicy, Lifetime, TaskId,
    Usage,
};

#[test]
fn linear_chain_orders_and_scopes_lifetimes() {
    let mut graph = Graph::<Device>::new();

    let mut r1 = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r1 = Some(builder.create::<Buffer>("r1", "r1")),
        record,
    );
    let r1 = r1.unwrap();

    let mut r2 = None;
    graph.add_task(
        "t1",
        |_: &mut (), builder| {
            builder.read(r1);
            r2 = Some(builder.create::<Buffer>("r2", "r2"));
        },
        record,
    );
    let r2 = r2.unwrap();

    graph.add_task(
        "t2",
        |_: &mut (), builder| {
            builder.read(r2);
        },
        record,
    );

    let order = graph.compile().unwrap().order().collect::<Vec<_>>();
    assert_eq!(order, [TaskId::from(0), TaskId::from(1), TaskId::from(2)]);
    assert_eq!(graph.usage(r1.id()), Some(Usage { first: 0, last: 1 }));
    assert_eq!(graph.usage(r2.id()), Some(Usage { first: 1, last: 2 }));

    let mut device = Device::default();
    graph.execute(&mut device).unwrap();

    assert_eq!(
        device.events,
        [
            "realize r1",
            "run t0",
            "realize r2",
            "run t1",
            "derealize r1",
            "run t2",
            "derealize r2",
        ]
    );
}

#[test]
fn two_writers_are_serialized() {
    let mut graph = Graph::<Device>::new();

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("r", "r")),
        record,
    );
    let r = r.unwrap();

    graph.add_task(
        "t1",
        |_: &mut (), builder| {
            builder.write(r);
        },
        record,
    );

    let edges = graph.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, TaskId::from(0));
    assert_eq!(edges[0].to, TaskId::from(1));
    assert_eq!(edges[0].hazard, Hazard::WriteAfterWrite);

    let timeline = graph.compile().unwrap();
    assert_eq!(timeline.steps()[0].realize, [r.id()]);
    assert!(timeline.steps()[0].derealize.is_empty());
    assert_eq!(timeline.steps()[1].derealize, [r.id()]);
    assert_eq!(graph.usage(r.id()).map(|usage| usage.last), Some(1));

    let mut device = Device::default();
    let diagnostics = graph.execute(&mut device).unwrap();

    assert_eq!(device.events, ["realize r", "run t0", "run t1", "derealize r"]);
    assert_eq!(diagnostics.allocated, 1);
    assert_eq!(diagnostics.released, 1);
}

#[test]
fn created_but_unused_resource_is_never_realized() {
    let mut graph = Graph::<Device>::new();

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("idle", "idle")),
        record,
    );
    let r = r.unwrap();

    let timeline = graph.compile().unwrap();
    assert!(
        timeline
            .steps()
            .iter()
            .all(|step| step.realize.is_empty() && step.derealize.is_empty())
    );
    assert_eq!(graph.usage(r.id()), None);

    let mut device = Device::default();
    graph.execute(&mut device).unwrap();

    assert_eq!(device.events, ["run t0"]);
    assert!(!graph.is_realized(r.id()));
}

/// `a` creates `r` and reads `q`; `b` reads and writes `r` and writes `q`, so
/// `a` needs `b` through `q` while `b` needs `a` through `r`.
fn cyclic(graph: &mut Graph<Device>) {
    let mut r = None;
    let mut q = None;
    graph.add_task(
        "a",
        |_: &mut (), builder| {
            r = Some(builder.create::<Buffer>("r", "r"));
            let created = builder.create::<Buffer>("q", "q");
            q = Some(builder.read(created));
        },
        record,
    );
    let (r, q) = (r.unwrap(), q.unwrap());

    graph.add_task(
        "b",
        |_: &mut (), builder| {
            builder.read(r);
            builder.write(r);
            builder.write(q);
        },
        record,
    );

    graph.add_task("free", |_: &mut (), _| {}, record);
}

#[test]
fn cycle_keeps_partial_order() {
    let mut graph = Graph::<Device>::new();
    cyclic(&mut graph);
    let count = graph.task_count();

    let timeline = graph.compile().unwrap();
    let order = timeline.order().collect::<Vec<_>>();
    assert!(order.len() < count);
    assert_eq!(order, [TaskId::from(2)]);

    let cycle = timeline.cycle().unwrap();
    assert_eq!(cycle.unscheduled, [TaskId::from(0), TaskId::from(1)]);
    assert_eq!(cycle.components, [vec![TaskId::from(0), TaskId::from(1)]]);

    let mut device = Device::default();
    graph.execute(&mut device).unwrap();
    assert_eq!(device.events, ["run free"]);
}

#[test]
fn cycle_fails_under_strict_policy() {
    let options = GraphOptions::new().cycles(CyclePolicy::Strict);
    let mut graph = Graph::<Device>::with_options(options);
    cyclic(&mut graph);

    match graph.compile() {
        Err(GraphError::Cycle {
            scheduled,
            total,
            stuck,
        }) => {
            assert_eq!(scheduled, 1);
            assert_eq!(total, 3);
            assert_eq!(stuck, ["a", "b"]);
        }
        other => panic!("expected a cycle error, got {:?}", other.map(|_| ())),
    }

    assert!(graph.is_dirty());
    assert!(matches!(
        graph.execute(&mut Device::default()),
        Err(GraphError::NotCompiled)
    ));
}

#[test]
fn rejected_compile_keeps_previous_schedule() {
    let options = GraphOptions::new().cycles(CyclePolicy::Strict);
    let mut graph = Graph::<Device>::with_options(options);

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("r", "r")),
        record,
    );
    let r = r.unwrap();
    graph.add_task(
        "t1",
        |_: &mut (), builder| {
            builder.read(r);
        },
        record,
    );

    let before = graph.compile().unwrap().clone();
    let edges = before.edges().to_vec();

    cyclic(&mut graph);
    assert!(matches!(graph.compile(), Err(GraphError::Cycle { .. })));

    let timeline = graph.timeline().unwrap();
    assert_eq!(timeline, &before);
    assert_eq!(timeline.steps()[0].realize, [r.id()]);
    assert_eq!(graph.usage(r.id()), Some(Usage { first: 0, last: 1 }));

    let report = graph.report().unwrap();
    assert_eq!(report.order, [TaskId::from(0), TaskId::from(1)]);
    assert_eq!(report.resources[r.id().index()].first, Some(0));
    assert_eq!(report.resources[r.id().index()].last, Some(1));
    assert_eq!(report.edges, edges);
    // resources declared by the rejected tasks were never scheduled
    assert!(report.resources[1..].iter().all(|entry| entry.first.is_none()));
}

#[test]
fn adding_after_compile_requires_recompile() {
    let mut graph = Graph::<Device>::new();
    graph.add_task("t0", |_: &mut (), _| {}, record);
    graph.compile().unwrap();
    assert!(!graph.is_dirty());

    graph.add_task("t1", |_: &mut (), _| {}, record);
    assert!(graph.is_dirty());

    let mut device = Device::default();
    assert!(matches!(
        graph.execute(&mut device),
        Err(GraphError::NotCompiled)
    ));
    assert!(device.events.is_empty());

    graph.compile().unwrap();
    graph.execute(&mut device).unwrap();
    assert_eq!(device.events, ["run t0", "run t1"]);
}

#[test]
fn compile_is_idempotent() {
    let mut graph = Graph::<Device>::new();
    cyclic(&mut graph);

    let first = graph.compile().unwrap().clone();
    let second = graph.compile().unwrap().clone();
    assert_eq!(first, second);
}

#[test]
fn external_resource_bypasses_allocator() {
    let mut graph = Graph::<Device>::new();

    let mut target = None;
    graph.add_task(
        "draw",
        |_: &mut (), builder| {
            target = Some(builder.create_external::<Buffer>(
                "swapchain",
                "swapchain",
                String::from("image 0"),
            ))
        },
        record,
    );
    let target = target.unwrap();

    graph.add_task(
        "present",
        |_: &mut (), builder| {
            builder.read(target);
        },
        move |_, task| {
            let image = task.get(target).cloned().unwrap_or_default();
            task.ctx.events.push(format!("present {image}"));
            Ok(())
        },
    );

    graph.compile().unwrap();
    assert_eq!(graph.lifetime_of(target.id()), Lifetime::External);

    let mut device = Device::default();
    let diagnostics = graph.execute(&mut device).unwrap();

    assert_eq!(device.events, ["run draw", "present image 0"]);
    assert_eq!(diagnostics.allocated, 0);
    assert_eq!(diagnostics.released, 0);
    assert_eq!(graph.get(target).map(String::as_str), Some("image 0"));

    graph.set_external(target, String::from("image 1")).unwrap();
    graph.execute(&mut device).unwrap();
    assert_eq!(device.events.last().map(String::as_str), Some("present image 1"));
}

#[test]
fn external_without_backing_object_still_runs() {
    let mut graph = Graph::<Device>::new();

    let mut target = None;
    graph.add_task(
        "draw",
        |_: &mut (), builder| {
            target = Some(builder.create_with_lifetime::<Buffer>(
                "swapchain",
                "swapchain",
                Lifetime::External,
            ))
        },
        record,
    );
    let target = target.unwrap();

    graph.add_task(
        "present",
        |_: &mut (), builder| {
            builder.read(target);
        },
        move |_, task| {
            assert!(task.get(target).is_none());
            Ok(())
        },
    );

    graph.compile().unwrap();
    let diagnostics = graph.execute(&mut Device::default()).unwrap();
    assert_eq!(diagnostics.steps, 2);
}

#[test]
fn persistent_resource_survives_until_teardown() {
    let mut graph = Graph::<Device>::new();

    let mut history = None;
    graph.add_task(
        "accumulate",
        |_: &mut (), builder| {
            let handle =
                builder.create_with_lifetime::<Buffer>("history", "history", Lifetime::Persistent);
            history = Some(builder.write(handle));
        },
        record,
    );
    let history = history.unwrap();

    graph.compile().unwrap();

    let mut device = Device::default();
    graph.execute(&mut device).unwrap();
    graph.execute(&mut device).unwrap();

    assert_eq!(device.allocations, 1);
    assert_eq!(device.releases, 0);
    assert!(graph.is_realized(history.id()));

    assert_eq!(graph.teardown(&mut device), 1);
    assert_eq!(device.releases, 1);
    assert!(!graph.is_realized(history.id()));
}

#[test]
fn transient_resources_are_fresh_each_execution() {
    let mut graph = Graph::<Device>::new();

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("r", "r")),
        record,
    );
    let r = r.unwrap();
    graph.add_task(
        "t1",
        |_: &mut (), builder| {
            builder.read(r);
        },
        record,
    );

    graph.compile().unwrap();

    let mut device = Device::default();
    for _ in 0..3 {
        graph.execute(&mut device).unwrap();
    }

    assert_eq!(device.allocations, 3);
    assert_eq!(device.releases, 3);
    assert_eq!(graph.teardown(&mut device), 0);
}

#[test]
fn realize_failure_aborts_execution() {
    let mut graph = Graph::<Device>::new();

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("ok", "ok")),
        record,
    );
    let r = r.unwrap();

    let mut bad = None;
    graph.add_task(
        "t1",
        |_: &mut (), builder| {
            builder.read(r);
            bad = Some(builder.create::<Buffer>("broken", "broken"));
        },
        record,
    );
    let bad = bad.unwrap();
    graph.add_task(
        "t2",
        |_: &mut (), builder| {
            builder.read(bad);
        },
        record,
    );

    graph.compile().unwrap();

    let mut device = Device {
        fail: Some("broken"),
        ..Device::default()
    };

    let err = graph.execute(&mut device).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(&err, GraphError::Realize(name, _) if name == "broken"));
    assert_eq!(device.events, ["realize ok", "run t0"]);

    // "ok" was realized before the failure and is still held
    assert!(graph.is_realized(r.id()));
    assert_eq!(graph.teardown(&mut device), 1);
}

#[test]
fn task_error_aborts_execution() {
    let mut graph = Graph::<Device>::new();
    graph.add_task(
        "t0",
        |_: &mut (), _| {},
        |_, _| anyhow::bail!("device lost"),
    );
    graph.add_task("t1", |_: &mut (), _| {}, record);

    graph.compile().unwrap();

    let mut device = Device::default();
    let err = graph.execute(&mut device).unwrap_err();

    assert!(matches!(
        &err,
        GraphError::Task(name, source) if name == "t0" && source.to_string() == "device lost"
    ));
    assert!(device.events.is_empty());
}

#[test]
fn task_panic_is_reported_as_error() {
    let mut graph = Graph::<Device>::new();
    graph.add_task("boom", |_: &mut (), _| {}, |_, _| panic!("bad shader"));

    graph.compile().unwrap();

    let err = graph.execute(&mut Device::default()).unwrap_err();
    let GraphError::Task(name, source) = &err else {
        panic!("expected a task error, got {err:?}");
    };
    assert_eq!(name, "boom");
    assert!(source.to_string().contains("bad shader"));
}

#[test]
fn full_hazards_order_reader_before_later_writer() {
    fn declare(graph: &mut Graph<Device>) {
        let mut r = None;
        graph.add_task(
            "produce",
            |_: &mut (), builder| r = Some(builder.create::<Buffer>("r", "r")),
            record,
        );
        let r = r.unwrap();
        graph.add_task(
            "consume",
            |_: &mut (), builder| {
                builder.read(r);
            },
            record,
        );
        graph.add_task(
            "overwrite",
            |_: &mut (), builder| {
                builder.write(r);
            },
            record,
        );
    }

    let mut ordered = Graph::<Device>::new();
    declare(&mut ordered);
    let order = ordered.compile().unwrap().order().collect::<Vec<_>>();
    assert_eq!(order, [TaskId::from(0), TaskId::from(2), TaskId::from(1)]);

    let mut full = Graph::<Device>::with_options(GraphOptions::new().hazards(HazardPolicy::Full));
    declare(&mut full);
    let order = full.compile().unwrap().order().collect::<Vec<_>>();
    assert_eq!(order, [TaskId::from(0), TaskId::from(1), TaskId::from(2)]);
    assert!(
        full.edges()
            .iter()
            .any(|edge| edge.hazard == Hazard::WriteAfterRead
                && edge.from == TaskId::from(1)
                && edge.to == TaskId::from(2))
    );
}

#[test]
fn undeclared_access_is_refused() {
    let mut graph = Graph::<Device>::new();

    let mut r = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| r = Some(builder.create::<Buffer>("r", "r")),
        record,
    );
    let r = r.unwrap();

    graph.add_task(
        "reader",
        |_: &mut (), builder| {
            builder.read(r);
        },
        move |_, task| {
            assert!(task.get(r).is_some());
            assert!(task.get_mut(r).is_none());
            Ok(())
        },
    );
    graph.add_task(
        "stranger",
        |_: &mut (), _| {},
        move |_, task| {
            assert!(task.get(r).is_none());
            Ok(())
        },
    );

    graph.compile().unwrap();
    graph.execute(&mut Device::default()).unwrap();
}

#[test]
fn payload_is_kept_from_setup() {
    #[derive(Default)]
    struct Blit {
        src: Option<Handle<Buffer>>,
        passes: u32,
    }

    let mut graph = Graph::<Device>::new();
    let mut src = None;
    graph.add_task(
        "t0",
        |_: &mut (), builder| src = Some(builder.create::<Buffer>("src", "src")),
        record,
    );
    let src = src.unwrap();

    let blit = graph.add_task(
        "blit",
        |data: &mut Blit, builder| {
            data.src = Some(builder.read(src));
            data.passes = 2;
        },
        |data, task| {
            for _ in 0..data.passes {
                task.ctx.events.push("blit".into());
            }
            Ok(())
        },
    );

    assert_eq!(graph.task_data(blit).passes, 2);
    assert_eq!(graph.task_data(blit).src, Some(src));
    assert_eq!(graph.task_reads(blit.id()), [src.id()]);
    assert_eq!(graph.readers(src.id()), [blit.id()]);
    assert_eq!(graph.task_name(blit.id()), "blit");

    graph.compile().unwrap();
    let mut device = Device::default();
    graph.execute(&mut device).unwrap();
    assert_eq!(device.events, ["realize src", "run t0", "blit", "blit", "derealize src"]);
}
