use RustedODE::numerical::ODE::ode_config::OdeMethod;
use RustedODE::numerical::ODE::ode_problems::Problem;
use RustedODE::somelinalg::linear_solvers::LinSolKind;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_explicit(c: &mut Criterion) {
    let prob = Problem::van_der_pol_cycle();
    let mut group = c.benchmark_group("explicit");
    for method in [OdeMethod::Dopri5, OdeMethod::Dopri8, OdeMethod::Fehlberg7] {
        group.bench_function(method.to_string(), |b| {
            b.iter(|| black_box(prob.solve(method, false, false)))
        });
    }
    group.finish();
}

fn bench_radau5(c: &mut Criterion) {
    let prob = Problem::van_der_pol(1e-6);
    let mut group = c.benchmark_group("radau5 stiff Van der Pol");
    for kind in [LinSolKind::Dense, LinSolKind::Sparse] {
        group.bench_function(kind.to_string(), |b| {
            b.iter(|| {
                let res = prob.config(OdeMethod::Radau5, false).and_then(|mut conf| {
                    conf.lin_sol = kind;
                    prob.solve_with(conf, false)
                });
                black_box(res)
            })
        });
    }
    group.finish();
}

fn bench_bweuler(c: &mut Criterion) {
    let prob = Problem::hw_eq11();
    c.bench_function("bweuler hw_eq11", |b| {
        b.iter(|| black_box(prob.solve(OdeMethod::BwEuler, true, false)))
    });
}

criterion_group!(benches, bench_explicit, bench_radau5, bench_bweuler);
criterion_main!(benches);
