use crate::Utils::logger::init_logger;
use crate::numerical::ODE::ode_api::{dopri5_simple, solve};
use crate::numerical::ODE::ode_config::{Config, OdeMethod};
use crate::numerical::ODE::ode_problems::{Problem, convergence_rate};
use crate::numerical::ODE::ode_solver::Solver;
use nalgebra::DVector;
use strum::IntoEnumIterator;

fn report(name: &str, y: &DVector<f64>, y_ref: Option<DVector<f64>>) {
    match y_ref {
        Some(y_ref) => println!(
            "{}: y = {:?}, error = {:e}",
            name,
            y.as_slice(),
            (y - y_ref).amax()
        ),
        None => println!("{}: y = {:?}", name, y.as_slice()),
    }
}

pub fn ode_examples(example: usize) {
    let _ = init_logger("info", None);
    match example {
        // Backward-Euler with fixed steps on Hairer-Wanner eq. (1.1)
        0 => {
            let prob = Problem::hw_eq11();
            match prob.solve(OdeMethod::BwEuler, true, false) {
                Ok((y, stat)) => {
                    report(&prob.name, &y, prob.analytic(prob.xf));
                    stat.print();
                }
                Err(e) => println!("{}", e),
            }
        }
        // stiff Van der Pol with Radau5, step history saved into csv
        1 => {
            let prob = Problem::van_der_pol(1e-6);
            let run = || -> Result<(), Box<dyn std::error::Error>> {
                let mut conf = prob.config(OdeMethod::Radau5, false)?;
                conf.set_step_out(true);
                conf.verbose = false;
                let mut solver = Solver::new(conf, prob.system(false))?;
                let mut y = prob.y0.clone();
                solver.solve(&mut y, prob.x0, prob.xf)?;
                report(&prob.name, &y, prob.y_ref.clone());
                solver.stat.print();
                solver.out.save_csv("van_der_pol_radau5.csv")?;
                Ok(())
            };
            if let Err(e) = run() {
                println!("{}", e);
            }
        }
        // Robertson chemical kinetics: stiff, conserves y0 + y1 + y2
        2 => {
            let prob = Problem::robertson();
            match prob.solve(OdeMethod::Radau5, false, false) {
                Ok((y, stat)) => {
                    report(&prob.name, &y, None);
                    println!("sum - 1 = {:e}", y.sum() - 1.0);
                    stat.print();
                }
                Err(e) => println!("{}", e),
            }
        }
        // every method on the same smooth problem
        3 => {
            let prob = Problem::simple_ndim2();
            for method in OdeMethod::iter() {
                let fixed = matches!(
                    method,
                    OdeMethod::FwEuler
                        | OdeMethod::BwEuler
                        | OdeMethod::Rk2
                        | OdeMethod::Rk3
                        | OdeMethod::Heun3
                        | OdeMethod::Rk4
                        | OdeMethod::Rk4_38
                );
                let res = prob.config(method, fixed).and_then(|mut conf| {
                    if fixed {
                        conf.set_fixed_h(0.01)?;
                    }
                    conf.nmax_ss = 100_000;
                    prob.solve_with(conf, false)
                });
                match res {
                    Ok((y, stat)) => println!(
                        "{:>10}: error = {:e}, nfeval = {}, nsteps = {}",
                        method.to_string(),
                        (&y - prob.analytic(prob.xf).unwrap_or_else(|| y.clone())).amax(),
                        stat.nfeval,
                        stat.nsteps
                    ),
                    Err(e) => println!("{:>10}: {}", method.to_string(), e),
                }
            }
        }
        // convergence orders of the fixed-step explicit methods
        4 => {
            let prob = Problem::simple_ndim2();
            let hs = [0.2, 0.1, 0.05, 0.025];
            for method in [OdeMethod::FwEuler, OdeMethod::Rk2, OdeMethod::Rk3, OdeMethod::Rk4] {
                match prob.convergence_errors(method, &hs) {
                    Ok(errs) => println!(
                        "{:>8}: errors = {:?}, rate = {:.3}",
                        method.to_string(),
                        errs,
                        convergence_rate(&hs, &errs)
                    ),
                    Err(e) => println!("{}", e),
                }
            }
        }
        // dense output of the Van der Pol limit cycle
        5 => {
            let mut y = DVector::from_vec(vec![2.0, 0.0]);
            let res = solve(
                "dopri5",
                Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                    f[0] = y[1];
                    f[1] = (1.0 - y[0] * y[0]) * y[1] - y[0];
                }),
                None,
                &mut y,
                2.0,
                0.1,
                1e-6,
                1e-6,
                false,
                false,
                false,
                true,
            );
            match res {
                Ok((stat, out)) => {
                    for (x, y) in out.dense_x.iter().zip(out.dense_y.iter()) {
                        println!("x = {:.2}, y = {:?}", x, y.as_slice());
                    }
                    stat.print();
                }
                Err(e) => println!("{}", e),
            }
        }
        // configuration from a task document
        6 => {
            let doc = "solver method: radau5 lin_sol: dense verbose: false\n\
                       tolerance atol: 1e-6 rtol: 1e-6\n\
                       output dense_dx: 0.25";
            let prob = Problem::hw_eq11();
            match Config::from_task_str(doc).and_then(|conf| prob.solve_with(conf, false)) {
                Ok((y, stat)) => {
                    report(&prob.name, &y, prob.analytic(prob.xf));
                    stat.print();
                }
                Err(e) => println!("{}", e),
            }
        }
        _ => {
            let mut y = DVector::from_vec(vec![1.0]);
            let res = dopri5_simple(
                Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                    f[0] = -y[0];
                }),
                &mut y,
                1.0,
                1e-8,
            );
            match res {
                Ok(()) => println!("y(1) = {}, exp(-1) = {}", y[0], (-1.0f64).exp()),
                Err(e) => println!("{}", e),
            }
        }
    }
}
