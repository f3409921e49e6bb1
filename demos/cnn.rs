/// Small CNN on synthetic 8x8 images: a vertical bar vs. a horizontal bar.
///
/// Architecture: InLayer(8x8x1) → CLayer(3, 4) → ALayer(2) → FLayer → NLayer(2)
///
/// Run with:
///   RUST_LOG=info cargo run --example cnn --release

use std::sync::mpsc;
use std::thread;

use rand::Rng;
use scnn::{train_loop, EpochStats, Input, Layer, Model, Sample, TrainConfig};

const SIDE: usize = 8;

/// Column-major 8x8 image with one bright bar plus a little noise.
fn bar_image(rng: &mut impl Rng, vertical: bool) -> Vec<f64> {
    let at = rng.gen_range(1..SIDE - 1);
    let mut pixels = vec![0.0; SIDE * SIDE];
    for c in 0..SIDE {
        for r in 0..SIDE {
            let lit = if vertical { c == at } else { r == at };
            let noise = rng.gen_range(0.0..0.1);
            pixels[c * SIDE + r] = if lit { 1.0 - noise } else { noise };
        }
    }
    pixels
}

fn dataset(rng: &mut impl Rng, n: usize) -> (Vec<Sample>, Vec<Vec<f64>>) {
    (0..n)
        .map(|i| {
            let vertical = i % 2 == 0;
            let target = if vertical { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
            (Sample::Single(Input::Flat(bar_image(rng, vertical))), target)
        })
        .unzip()
}

fn main() -> scnn::Result<()> {
    env_logger::init();

    let mut model = Model::new(0.01, vec![
        Layer::input_maps(SIDE, SIDE, 1),
        Layer::conv(3, 4),
        Layer::pool(2),
        Layer::flatten(),
        Layer::dense(2),
    ])?;
    print!("{}", model.structure_description());

    let mut rng = rand::thread_rng();
    let (train_inputs, train_targets) = dataset(&mut rng, 200);
    let (test_inputs, test_targets) = dataset(&mut rng, 50);

    // Train on a worker thread and report progress over a channel.
    let (tx, rx) = mpsc::channel::<EpochStats>();
    let worker = thread::spawn(move || -> scnn::Result<Model> {
        let mut config = TrainConfig::new(10, 8).shuffled();
        config.progress_tx = Some(tx);
        train_loop(
            &mut model,
            &train_inputs,
            &train_targets,
            Some((test_inputs.as_slice(), test_targets.as_slice())),
            &config,
        )?;
        Ok(model)
    });

    for stats in rx {
        println!(
            "epoch {}/{}: loss {:.5}, test accuracy {:.1}%",
            stats.epoch,
            stats.total_epochs,
            stats.train_loss,
            stats.test_accuracy.unwrap_or(0.0) * 100.0
        );
    }

    let model = match worker.join() {
        Ok(result) => result?,
        Err(_) => {
            eprintln!("training thread panicked");
            return Ok(());
        }
    };
    println!("trained model is {} bytes serialized", model.serialize()?.len());
    Ok(())
}
