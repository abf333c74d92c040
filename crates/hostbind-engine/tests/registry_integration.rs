//! Integration tests for method collection and wrapper synthesis

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{bridge, TestComputer, TestLuaContext};
use hostbind_engine::{ArgumentDescriptor, BindError, MethodDeclaration, MethodSource, WrapperStyle};
use hostbind_sdk::{HostValue, TargetRef, Value, ValueType};

trait Gauge: Send + Sync {
    fn level(&self) -> i64;
}

struct Cistern {
    level: i64,
}

impl Gauge for Cistern {
    fn level(&self) -> i64 {
        self.level
    }
}

fn cistern(level: i64) -> TargetRef {
    let value = Arc::new(Cistern { level });
    let gauge: Arc<dyn Gauge> = value.clone();
    TargetRef::builder(value).view(gauge).build()
}

#[test]
fn test_view_methods_reach_target() {
    let bridge = bridge();
    bridge.registry().register_source(MethodSource::on_view::<dyn Gauge>().method(
        MethodDeclaration::new("getLevel").returns(ValueType::Integer),
        |gauge, _| Ok(vec![Value::Int(gauge.level())]),
    ));

    let peripheral = bridge.wrap_peripheral(cistern(12)).unwrap();
    let result = peripheral
        .call_method(&TestComputer::new("main"), &TestLuaContext::new(), 0, vec![])
        .unwrap();
    assert_eq!(result, vec![HostValue::Number(12.0)]);

    // A class without the view sees nothing
    let plain = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 1 })).unwrap();
    assert!(plain.method_names().is_empty());
}

#[test]
fn test_closest_declaration_wins() {
    let bridge = bridge();
    // Registered first, but declared further from the concrete type
    bridge.registry().register_source(
        MethodSource::on_view::<dyn Gauge>()
            .method(MethodDeclaration::new("describe"), |_, _| {
                Ok(vec![Value::from("gauge")])
            })
            .method(MethodDeclaration::new("viewOnly"), |_, _| Ok(vec![])),
    );
    bridge.registry().register_source(
        MethodSource::on::<Cistern>().method(MethodDeclaration::new("describe"), |_, _| {
            Ok(vec![Value::from("cistern")])
        }),
    );

    let peripheral = bridge.wrap_peripheral(cistern(0)).unwrap();
    assert_eq!(
        peripheral.method_names(),
        &["describe".to_string(), "viewOnly".to_string()]
    );
    let result = peripheral
        .call_method(&TestComputer::new("main"), &TestLuaContext::new(), 0, vec![])
        .unwrap();
    assert_eq!(result, vec![HostValue::from("cistern")]);
}

#[test]
fn test_aliases_share_one_executor() {
    let bridge = bridge();
    bridge.registry().register_source(MethodSource::on::<Cistern>().method(
        MethodDeclaration::new("getLevel")
            .alias("level")
            .returns(ValueType::Integer),
        |cistern, _| Ok(vec![Value::Int(cistern.level)]),
    ));

    let peripheral = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 3 })).unwrap();
    assert_eq!(
        peripheral.method_names(),
        &["getLevel".to_string(), "level".to_string()]
    );
    let methods = peripheral.wrapper_type().methods();
    let a = methods.get(0).unwrap();
    let b = methods.get(1).unwrap();
    assert!(Arc::ptr_eq(a, b));
}

#[test]
fn test_invalid_declarations_are_isolated() {
    let bridge = bridge();
    let adapter = bridge.registry().register_source(
        MethodSource::on::<Cistern>()
            .method(
                MethodDeclaration::new("bad")
                    .arg(ArgumentDescriptor::variadic("rest", ValueType::Any))
                    .arg(ArgumentDescriptor::required("tail", ValueType::Integer)),
                |_, _| Ok(vec![]),
            )
            .method(MethodDeclaration::new(""), |_, _| Ok(vec![]))
            .method(MethodDeclaration::new("good"), |_, _| Ok(vec![Value::Bool(true)])),
    );
    assert_eq!(adapter.executors().len(), 1);
    assert_eq!(adapter.rejected().len(), 2);
    assert!(adapter
        .rejected()
        .iter()
        .all(|e| matches!(e, BindError::InvalidDeclaration { .. })));

    let peripheral = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 0 })).unwrap();
    assert_eq!(peripheral.method_names(), &["good".to_string()]);
}

#[test]
fn test_new_registration_yields_new_wrapper_type() {
    let bridge = bridge();
    bridge.registry().register_source(
        MethodSource::on::<Cistern>().method(MethodDeclaration::new("first"), |_, _| Ok(vec![])),
    );
    let before = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 0 })).unwrap();

    bridge.registry().register_source(
        MethodSource::on::<Cistern>().method(MethodDeclaration::new("second"), |_, _| Ok(vec![])),
    );
    let after = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 0 })).unwrap();

    assert_eq!(before.method_names(), &["first".to_string()]);
    assert_eq!(
        after.method_names(),
        &["first".to_string(), "second".to_string()]
    );
    assert!(!Arc::ptr_eq(before.wrapper_type(), after.wrapper_type()));

    // The superseded type is dropped from the cache but still serves `before`
    assert_eq!(bridge.synthesizer().generated_count(), 2);
    assert_eq!(bridge.synthesizer().cached_types(), 1);
    let result = before
        .call_method(&TestComputer::new("main"), &TestLuaContext::new(), 0, vec![])
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_registration_races_lookups() {
    let bridge = Arc::new(bridge());
    let names: Vec<String> = (0..8).map(|i| format!("m{}", i)).collect();
    let barrier = Arc::new(Barrier::new(names.len() * 2));

    let mut workers = Vec::new();
    for name in names.clone() {
        let registrar = bridge.clone();
        let gate = barrier.clone();
        workers.push(thread::spawn(move || {
            gate.wait();
            registrar.registry().register_source(
                MethodSource::on::<Cistern>().method(MethodDeclaration::new(name), |_, _| Ok(vec![])),
            );
        }));
        let reader = bridge.clone();
        let gate = barrier.clone();
        workers.push(thread::spawn(move || {
            gate.wait();
            for _ in 0..50 {
                reader.wrapper_type(&TargetRef::new(Cistern { level: 0 }), WrapperStyle::Peripheral);
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    // Whatever interleaving happened, the settled registry sees every adapter
    let peripheral = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 0 })).unwrap();
    assert_eq!(peripheral.method_names(), names.as_slice());
    assert_eq!(peripheral.wrapper_type().key().revision(), bridge.registry().revision());
}

#[test]
fn test_styles_get_distinct_types() {
    let bridge = bridge();
    bridge.registry().register_source(
        MethodSource::on::<Cistern>().method(MethodDeclaration::new("ping"), |_, _| Ok(vec![])),
    );
    let target = TargetRef::new(Cistern { level: 0 });

    let peripheral = bridge.wrapper_type(&target, WrapperStyle::Peripheral);
    let environment = bridge.wrapper_type(&target, WrapperStyle::Environment);
    let object = bridge.wrapper_type(&target, WrapperStyle::Object);
    assert_ne!(peripheral.id(), environment.id());
    assert_ne!(environment.id(), object.id());
    assert!(peripheral.callbacks().is_empty());
    assert_eq!(object.callbacks().len(), 1);
    assert_eq!(bridge.synthesizer().generated_count(), 3);
}

#[test]
fn test_concurrent_synthesis_builds_once() {
    let bridge = Arc::new(bridge());
    bridge.registry().register_source(
        MethodSource::on::<Cistern>().method(MethodDeclaration::new("ping"), |_, _| Ok(vec![])),
    );

    let barrier = Arc::new(Barrier::new(8));
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let bridge = bridge.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let target = TargetRef::new(Cistern { level: i });
                barrier.wait();
                bridge.wrapper_type(&target, WrapperStyle::Object)
            })
        })
        .collect();
    let types: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert_eq!(bridge.synthesizer().generated_count(), 1);
    assert!(types.iter().all(|t| Arc::ptr_eq(t, &types[0])));
}

#[test]
fn test_tables_cross_the_peripheral_boundary() {
    let bridge = bridge();
    bridge.registry().register_source(MethodSource::on::<Cistern>().method(
        MethodDeclaration::new("inspect")
            .arg(ArgumentDescriptor::required("items", ValueType::Table))
            .returns(ValueType::Table),
        |_, inv| {
            let count = inv.args()[0].as_list().map_or(0, |items| items.len());
            let mut summary = std::collections::BTreeMap::new();
            summary.insert("count".to_string(), Value::Int(count as i64));
            Ok(vec![Value::Map(summary)])
        },
    ));
    let peripheral = bridge.wrap_peripheral(TargetRef::new(Cistern { level: 0 })).unwrap();

    let items = HostValue::Table(vec![
        (HostValue::Number(1.0), HostValue::from("a")),
        (HostValue::Number(2.0), HostValue::from("b")),
    ]);
    let result = peripheral
        .call_method(&TestComputer::new("main"), &TestLuaContext::new(), 0, vec![items])
        .unwrap();
    assert_eq!(
        result,
        vec![HostValue::Table(vec![(
            HostValue::from("count"),
            HostValue::Number(2.0)
        )])]
    );
}
