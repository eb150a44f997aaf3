use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use livepy::driver::Driver;
use livepy::interpreter::Interpreter;
use livepy::run_state::RunState;
use livepy::watch::ChangeEvent;
use livepy::{diff, parser, propagate};

const CHAINS: usize = 200;

/// `CHAINS` independent dependency chains of three statements each, plus a
/// helper function used by every chain.
fn script(seed: i64) -> String {
    let mut source = String::from("def step(v):\n    return v * 2 + 1\n\n");
    for chain in 0..CHAINS {
        let start = if chain == CHAINS / 2 { seed } else { chain as i64 };
        source.push_str(&format!("a{chain} = {start}\n"));
        source.push_str(&format!("b{chain} = step(a{chain})\n"));
        source.push_str(&format!("c{chain} = [b{chain}, a{chain}]\n"));
    }
    source
}

fn bench_incremental(c: &mut Criterion) {
    let before = script(-1);
    let after = script(-2);
    let prev = parser::parse(&before).expect("parse before").statements;
    let next = parser::parse(&after).expect("parse after").statements;

    c.bench_function("parse_script", |b| {
        b.iter(|| black_box(parser::parse(black_box(&after)).expect("parse")))
    });

    c.bench_function("diff_single_edit", |b| {
        b.iter(|| black_box(diff::diff(black_box(&prev), black_box(&next))))
    });

    let changed = diff::diff(&prev, &next);
    c.bench_function("expand_single_edit", |b| {
        b.iter(|| black_box(propagate::expand(black_box(&next), black_box(&changed))))
    });

    c.bench_function("cycle_single_edit", |b| {
        b.iter_batched(
            || {
                let mut driver = Driver::new(Interpreter::buffered(), |_: &RunState| {});
                driver.on_change(&ChangeEvent::new("bench.py", before.as_str()));
                driver
            },
            |mut driver| black_box(driver.on_change(&ChangeEvent::new("bench.py", after.as_str()))),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_incremental);
criterion_main!(benches);
