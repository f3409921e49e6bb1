use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::seq::SliceRandom;

use crate::error::{NetError, Result};
use crate::network::model::{Model, Sample};
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

/// Held-out samples and targets evaluated with [`Model::test`] after each epoch.
pub type TestSet<'a> = (&'a [Sample], &'a [Vec<f64>]);

/// Trains `model` for `config.epochs` epochs and returns the mean training
/// loss of the **last completed epoch**.
///
/// # Arguments
/// - `model`         — modified in place
/// - `train_inputs`  — training samples
/// - `train_targets` — corresponding targets, same length as `train_inputs`
/// - `test_set`      — optional held-out set scored after every epoch
/// - `config`        — hyperparameters, optional progress channel, optional stop flag
///
/// # Early termination
/// The loop breaks early if:
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set to `true`.
pub fn train_loop(
    model: &mut Model,
    train_inputs: &[Sample],
    train_targets: &[Vec<f64>],
    test_set: Option<TestSet<'_>>,
    config: &TrainConfig,
) -> Result<f64> {
    if train_inputs.is_empty() {
        return Err(NetError::InvalidConfig("train_inputs must not be empty".to_string()));
    }
    if train_inputs.len() != train_targets.len() {
        return Err(NetError::InvalidConfig(format!(
            "{} train inputs but {} targets",
            train_inputs.len(),
            train_targets.len()
        )));
    }
    if config.batch_size == 0 {
        return Err(NetError::InvalidConfig("batch_size must be at least 1".to_string()));
    }

    let mut order: Vec<usize> = (0..train_inputs.len()).collect();
    let mut rng = rand::thread_rng();
    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            log::info!("stop requested before epoch {epoch}");
            break;
        }

        let t_start = Instant::now();

        if config.shuffle {
            order.shuffle(&mut rng);
        }
        let train_loss = model.train_order(train_inputs, train_targets, &order, config.batch_size)?;
        last_train_loss = train_loss;

        let test_accuracy = match test_set {
            Some((inputs, targets)) => Some(model.test(inputs, targets)?.accuracy()),
            None => None,
        };

        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        match test_accuracy {
            Some(acc) => log::info!(
                "epoch {epoch}/{}: loss {train_loss:.6}, test accuracy {:.2}% ({elapsed_ms} ms)",
                config.epochs,
                acc * 100.0
            ),
            None => log::info!(
                "epoch {epoch}/{}: loss {train_loss:.6} ({elapsed_ms} ms)",
                config.epochs
            ),
        }

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            test_accuracy,
            elapsed_ms,
        };

        if let Some(ref tx) = config.progress_tx {
            // If the receiver has been dropped, stop training.
            if tx.send(stats).is_err() {
                log::debug!("progress receiver dropped, stopping after epoch {epoch}");
                break;
            }
        }
    }

    Ok(last_train_loss)
}

fn stop_requested(config: &TrainConfig) -> bool {
    config
        .stop_flag
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}
