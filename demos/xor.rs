/// XOR with a small feed-forward network.
///
/// Architecture: 2 → 3 (tanh) → 1 (sigmoid), MSE, SGD lr = 0.5, batch 1.
///
/// Run with:
///   RUST_LOG=info cargo run --example xor --release

use scnn::{
    layers::DenseLayer, train_loop, ActivationFunction, Layer, Model, Sample, TrainConfig,
};

fn main() -> scnn::Result<()> {
    env_logger::init();

    let mut model = Model::new(0.5, vec![
        Layer::input(2),
        Layer::Dense(DenseLayer::with_activation(3, ActivationFunction::Tanh)),
        Layer::Dense(DenseLayer::with_activation(1, ActivationFunction::Sigmoid)),
    ])?;
    print!("{}", model.structure_description());

    let inputs: Vec<Sample> = vec![
        vec![1.0, 0.0].into(),
        vec![1.0, 1.0].into(),
        vec![0.0, 1.0].into(),
        vec![0.0, 0.0].into(),
    ];
    let targets = vec![
        vec![1.0],
        vec![0.0],
        vec![1.0],
        vec![0.0],
    ];

    let config = TrainConfig::new(2000, 1).shuffled();
    let loss = train_loop(&mut model, &inputs, &targets, None, &config)?;
    println!("final loss = {loss:.6}");

    for sample in &inputs {
        let output = model.predict(sample)?;
        println!("Input: {:?} -> Output: {:.4}", sample, output[0]);
    }

    println!("serialized: {}", model.serialize()?);
    Ok(())
}
