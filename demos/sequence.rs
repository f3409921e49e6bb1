/// Many-to-one RNN: classify whether a binary sequence holds more ones than zeros.
///
/// Architecture: 1 → RLayer(6) → NLayer(2), MSE, SGD lr = 0.01, batch 4.
///
/// Run with:
///   RUST_LOG=info cargo run --example sequence --release

use rand::Rng;
use scnn::{train_loop, Input, Layer, Model, Sample, TrainConfig};

const STEPS: usize = 5;

fn random_series(rng: &mut impl Rng) -> (Sample, Vec<f64>) {
    let bits: Vec<f64> = (0..STEPS).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect();
    let ones = bits.iter().filter(|&&b| b == 1.0).count();
    let target = if ones * 2 > STEPS { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
    let steps = bits.into_iter().map(|b| Input::Flat(vec![b])).collect::<Vec<_>>();
    (Sample::Series(steps), target)
}

fn main() -> scnn::Result<()> {
    env_logger::init();

    let mut model = Model::new(0.01, vec![
        Layer::input(1),
        Layer::recurrent(6),
        Layer::dense(2),
    ])?;
    print!("{}", model.structure_description());

    let mut rng = rand::thread_rng();
    let (train_inputs, train_targets): (Vec<_>, Vec<_>) =
        (0..400).map(|_| random_series(&mut rng)).unzip();
    let (test_inputs, test_targets): (Vec<_>, Vec<_>) =
        (0..100).map(|_| random_series(&mut rng)).unzip();

    let config = TrainConfig::new(30, 4).shuffled();
    train_loop(
        &mut model,
        &train_inputs,
        &train_targets,
        Some((test_inputs.as_slice(), test_targets.as_slice())),
        &config,
    )?;

    let report = model.test(&test_inputs, &test_targets)?;
    println!(
        "test: {}/{} correct ({:.1}%)",
        report.correct_count,
        report.test_samples,
        report.accuracy() * 100.0
    );
    Ok(())
}
