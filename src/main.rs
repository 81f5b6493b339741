#![allow(non_snake_case)]
use RustedODE::Examples::ode_examples::ode_examples;

fn main() {
    let example = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<usize>().ok())
        .unwrap_or(1);
    ode_examples(example);
}
