#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use sprout::{Container, Inject, TypeDescriptor};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA(Arc<CAAAA>);
struct CAAAA(Arc<CAAAAA>);
struct CAAAAA;

macro_rules! chain {
    ($container:ident, $scope:ident) => {{
        $container
            .register_descriptor(TypeDescriptor::<CAAAAA>::injectable().$scope().constructor(|| Ok(CAAAAA)))
            .unwrap();
        $container
            .register_descriptor(
                TypeDescriptor::<CAAAA>::injectable()
                    .$scope()
                    .constructor(|Inject(caaaaa): Inject<CAAAAA>| Ok(CAAAA(caaaaa))),
            )
            .unwrap();
        $container
            .register_descriptor(
                TypeDescriptor::<CAAA>::injectable()
                    .$scope()
                    .constructor(|Inject(caaaa): Inject<CAAAA>| Ok(CAAA(caaaa))),
            )
            .unwrap();
        $container
            .register_descriptor(
                TypeDescriptor::<CAA>::injectable()
                    .$scope()
                    .constructor(|Inject(caaa): Inject<CAAA>| Ok(CAA(caaa))),
            )
            .unwrap();
        $container
            .register_descriptor(
                TypeDescriptor::<CA>::injectable()
                    .$scope()
                    .constructor(|Inject(caa): Inject<CAA>| Ok(CA(caa))),
            )
            .unwrap();
        $container
            .register_descriptor(TypeDescriptor::<C>::injectable().$scope().constructor(|Inject(ca): Inject<CA>| Ok(C(ca))))
            .unwrap();
        $container
            .register_descriptor(TypeDescriptor::<B>::injectable().$scope().constructor(|| Ok(B(2))))
            .unwrap();
        $container
            .register_descriptor(
                TypeDescriptor::<A>::injectable()
                    .$scope()
                    .constructor(|Inject(b): Inject<B>, Inject(c): Inject<C>| Ok(A(b, c))),
            )
            .unwrap();
    }};
}

#[inline]
fn singleton_container() -> Container {
    let container = Container::new();
    chain!(container, singleton);
    container
}

#[inline]
fn prototype_container() -> Container {
    let container = Container::new();
    chain!(container, prototype);
    container
}

#[inline]
fn container_get(container: &Container) {
    let _ = container.get::<A>().unwrap();
}

#[inline]
fn container_shutdown(container: &Container) {
    let _ = container.get::<A>().unwrap();

    container.shutdown().unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let singletons = singleton_container();
    let prototypes = prototype_container();

    c.bench_function("container_register", |b| b.iter(singleton_container))
        .bench_function("container_get_prototype", |b| b.iter(|| container_get(&prototypes)))
        .bench_function("container_get_singleton_cached", |b| {
            container_get(&singletons);
            b.iter(|| container_get(&singletons))
        })
        .bench_function("container_get_singleton_cold", |b| {
            b.iter(|| {
                singletons.clear_singletons();
                container_get(&singletons)
            })
        })
        .bench_function("container_shutdown", |b| b.iter(|| container_shutdown(&singleton_container())));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
