// Library `log` records reach a `tracing_subscriber` fmt subscriber through
// its log bridge. Kept in its own test binary: the subscriber is global.

use melody_ga::config::EvolutionConfig;
use melody_ga::evolution::{Evolver, GenerationReport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn evolution_records_reach_the_subscriber() {
    let captured = Captured::default();
    let writer = captured.clone();
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_target(false)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .try_init()
        .unwrap();

    let config = EvolutionConfig {
        population_size: 30,
        generations: 3,
        elitism_count: 2,
        ..Default::default()
    };
    let mut evolver = Evolver::new(config, StdRng::seed_from_u64(1)).unwrap();
    evolver.run(&mut |_: &GenerationReport| {}).unwrap();

    let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("evolving 30 melodies"), "{output}");
    assert!(output.contains("generation 0:"), "{output}");
    assert!(output.contains("finished after 3 generations"), "{output}");
}
