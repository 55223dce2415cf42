use rand::seq::SliceRandom;

use crate::callbacks::{CallbackList, Logs};
use crate::error::{CallbackError, Result};
use crate::model::{ModelHandle, Trainable};
use crate::train::dataset::Dataset;
use crate::train::train_config::TrainConfig;

/// Outcome of a [`fit`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub epochs_run: usize,
    /// An observer raised the stop flag before `config.epochs` was reached.
    pub stopped_early: bool,
    /// Logs of the last completed epoch, as passed to `on_train_end`.
    pub last_logs: Logs,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `model` for up to `config.epochs` epochs, firing every lifecycle hook
/// on `callbacks`.
///
/// Epochs are numbered from 1. Each epoch log carries `loss` (mean over the
/// training samples), `accuracy` for binary cross-entropy runs, and `val_loss` /
/// `val_accuracy` when `val` is given. The model's stop flag is cleared on entry
/// and checked after every `on_epoch_end`.
///
/// The first callback error aborts the run; `on_train_end` is not fired in that case.
pub fn fit(
    model: &mut Trainable,
    callbacks: &mut CallbackList,
    train: &Dataset,
    val: Option<&Dataset>,
    config: &TrainConfig,
) -> Result<FitSummary> {
    if train.is_empty() {
        return Err(CallbackError::Config("training set is empty".into()));
    }
    if train.inputs.len() != train.labels.len() {
        return Err(CallbackError::Config("training inputs and labels differ in length".into()));
    }
    if config.batch_size == 0 {
        return Err(CallbackError::Config("batch_size must be at least 1".into()));
    }
    let (inputs, outputs) = (model.network.input_size(), model.network.output_size());
    train.check_widths(inputs, outputs)?;
    if let Some(val) = val {
        val.check_widths(inputs, outputs)?;
    }

    let span = tracing::info_span!("fit", epochs = config.epochs, callbacks = callbacks.len());
    let _guard = span.enter();

    model.set_stop_training(false);
    model.train();
    callbacks.on_train_begin(model, &Logs::new())?;

    let mut last_logs = Logs::new();
    let mut epochs_run = 0;
    let mut stopped_early = false;

    for epoch in 1..=config.epochs {
        model.train();
        callbacks.on_epoch_begin(model, epoch, &Logs::new())?;

        let train_loss = run_one_epoch(model, callbacks, train, config)?;

        let mut logs = Logs::new().with("loss", train_loss);
        if model.loss.reports_accuracy() {
            logs.insert("accuracy", compute_accuracy(model, train));
        }

        if let Some(val) = val {
            model.eval();
            let val_loss = evaluate(model, callbacks, val)?;
            logs.insert("val_loss", val_loss);
            if model.loss.reports_accuracy() {
                logs.insert("val_accuracy", compute_accuracy(model, val));
            }
        }

        tracing::debug!(epoch, loss = train_loss, val_loss = ?logs.get("val_loss"), "epoch finished");
        callbacks.on_epoch_end(model, epoch, &logs)?;
        epochs_run = epoch;
        last_logs = logs;

        if model.stop_training() {
            stopped_early = epoch < config.epochs;
            tracing::info!(epoch, "stop requested by an observer");
            break;
        }
    }

    callbacks.on_train_end(model, &last_logs)?;

    Ok(FitSummary {
        epochs_run,
        stopped_early,
        last_logs,
    })
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One full pass of mini-batch SGD. Returns the mean loss over all samples.
fn run_one_epoch(
    model: &mut Trainable,
    callbacks: &mut CallbackList,
    data: &Dataset,
    config: &TrainConfig,
) -> Result<f64> {
    let n = data.len();
    let mut total_loss = 0.0;

    let mut indices: Vec<usize> = (0..n).collect();
    if config.shuffle {
        indices.shuffle(&mut rand::thread_rng());
    }

    for (batch, chunk) in indices.chunks(config.batch_size).enumerate() {
        callbacks.on_batch_begin(model, batch, &Logs::new())?;
        callbacks.on_train_batch_begin(model, batch, &Logs::new())?;

        let inputs: Vec<&Vec<f64>> = chunk.iter().map(|&i| &data.inputs[i]).collect();
        let labels: Vec<&Vec<f64>> = chunk.iter().map(|&i| &data.labels[i]).collect();
        let batch_loss = model.train_batch(&inputs, &labels);
        total_loss += batch_loss;

        let logs = Logs::new().with("loss", batch_loss / chunk.len() as f64);
        callbacks.on_train_batch_end(model, batch, &logs)?;
        callbacks.on_batch_end(model, batch, &logs)?;
    }

    Ok(total_loss / n as f64)
}

/// Mean loss over `data` without parameter updates, one test batch per sample.
fn evaluate(model: &mut Trainable, callbacks: &mut CallbackList, data: &Dataset) -> Result<f64> {
    callbacks.on_test_begin(model, &Logs::new())?;

    let mut total = 0.0;
    for (batch, (input, label)) in data.inputs.iter().zip(&data.labels).enumerate() {
        callbacks.on_test_batch_begin(model, batch, &Logs::new())?;
        let output = model.predict(input);
        let loss = model.loss.loss(&output, label);
        total += loss;
        callbacks.on_test_batch_end(model, batch, &Logs::new().with("loss", loss))?;
    }

    let mean = if data.is_empty() { 0.0 } else { total / data.len() as f64 };
    callbacks.on_test_end(model, &Logs::new().with("loss", mean))?;
    Ok(mean)
}

/// Fraction of samples classified correctly: thresholded at 0.5 for a single
/// output, argmax match otherwise.
fn compute_accuracy(model: &mut Trainable, data: &Dataset) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let correct = data
        .inputs
        .iter()
        .zip(&data.labels)
        .filter(|(input, label)| {
            let output = model.predict(input);
            if output.len() == 1 {
                (output[0] >= 0.5) == (label.first().copied().unwrap_or(0.0) >= 0.5)
            } else {
                argmax(&output) == argmax(label)
            }
        })
        .count();
    correct as f64 / data.len() as f64
}

/// Index of the maximum element in a slice.
fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::callbacks::Callback;
    use crate::loss::loss_type::LossType;
    use crate::network::network::Network;
    use crate::optim::sgd::Sgd;

    fn xor_model(loss: LossType) -> Trainable {
        let network = Network::new(vec![(4, 2, ActivationFunction::Tanh), (1, 4, ActivationFunction::Sigmoid)]);
        Trainable::new(network, Sgd::new(0.5), loss)
    }

    /// Records hook names and can raise the stop flag at a given epoch.
    struct Trace {
        seen: Rc<RefCell<Vec<String>>>,
        stop_at: Option<usize>,
        epoch_logs: Rc<RefCell<Vec<Vec<String>>>>,
    }

    impl Callback for Trace {
        fn name(&self) -> &str {
            "trace"
        }

        fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push("train_begin".into());
            Ok(())
        }

        fn on_train_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push("train_end".into());
            Ok(())
        }

        fn on_epoch_begin(&mut self, _model: &mut dyn ModelHandle, epoch: usize, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push(format!("epoch_begin:{epoch}"));
            Ok(())
        }

        fn on_epoch_end(&mut self, model: &mut dyn ModelHandle, epoch: usize, logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push(format!("epoch_end:{epoch}"));
            self.epoch_logs.borrow_mut().push(logs.keys().map(str::to_string).collect());
            if self.stop_at == Some(epoch) {
                model.set_stop_training(true);
            }
            Ok(())
        }

        fn on_batch_begin(&mut self, _model: &mut dyn ModelHandle, batch: usize, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push(format!("batch_begin:{batch}"));
            Ok(())
        }

        fn on_train_batch_end(&mut self, _model: &mut dyn ModelHandle, batch: usize, logs: &Logs) -> Result<()> {
            assert!(logs.get("loss").is_some());
            self.seen.borrow_mut().push(format!("train_batch_end:{batch}"));
            Ok(())
        }

        fn on_test_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push("test_begin".into());
            Ok(())
        }

        fn on_test_end(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push("test_end".into());
            Ok(())
        }
    }

    fn trace(stop_at: Option<usize>) -> (Trace, Rc<RefCell<Vec<String>>>, Rc<RefCell<Vec<Vec<String>>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let epoch_logs = Rc::new(RefCell::new(Vec::new()));
        let t = Trace { seen: Rc::clone(&seen), stop_at, epoch_logs: Rc::clone(&epoch_logs) };
        (t, seen, epoch_logs)
    }

    #[test]
    fn hooks_fire_in_lifecycle_order() {
        let (t, seen, _) = trace(None);
        let mut callbacks = CallbackList::new().with(t);
        let mut model = xor_model(LossType::Mse);
        let config = TrainConfig { epochs: 1, batch_size: 2, shuffle: false };

        fit(&mut model, &mut callbacks, &Dataset::xor(), Some(&Dataset::xor()), &config).unwrap();

        assert_eq!(
            *seen.borrow(),
            [
                "train_begin",
                "epoch_begin:1",
                "batch_begin:0",
                "train_batch_end:0",
                "batch_begin:1",
                "train_batch_end:1",
                "test_begin",
                "test_end",
                "epoch_end:1",
                "train_end",
            ]
        );
    }

    #[test]
    fn epoch_logs_include_validation_and_accuracy() {
        let (t, _, epoch_logs) = trace(None);
        let mut callbacks = CallbackList::new().with(t);
        let mut model = xor_model(LossType::BinaryCrossEntropy);

        let summary = fit(&mut model, &mut callbacks, &Dataset::xor(), Some(&Dataset::xor()), &TrainConfig::new(2, 4)).unwrap();

        assert_eq!(summary.epochs_run, 2);
        assert!(!summary.stopped_early);
        assert_eq!(epoch_logs.borrow()[1], ["loss", "accuracy", "val_loss", "val_accuracy"]);
        let acc = summary.last_logs.get("accuracy").unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn mse_runs_without_validation_only_log_loss() {
        let (t, _, epoch_logs) = trace(None);
        let mut callbacks = CallbackList::new().with(t);
        let mut model = xor_model(LossType::Mse);

        fit(&mut model, &mut callbacks, &Dataset::xor(), None, &TrainConfig::new(1, 1)).unwrap();

        assert_eq!(epoch_logs.borrow()[0], ["loss"]);
    }

    #[test]
    fn stop_flag_ends_training_after_the_current_epoch() {
        let (t, seen, _) = trace(Some(2));
        let mut callbacks = CallbackList::new().with(t);
        let mut model = xor_model(LossType::Mse);

        let summary = fit(&mut model, &mut callbacks, &Dataset::xor(), None, &TrainConfig::new(10, 4)).unwrap();

        assert_eq!(summary.epochs_run, 2);
        assert!(summary.stopped_early);
        let ends = seen.borrow().iter().filter(|s| *s == "train_end").count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn stale_stop_flag_is_cleared_on_entry() {
        let mut callbacks = CallbackList::new();
        let mut model = xor_model(LossType::Mse);
        model.set_stop_training(true);

        let summary = fit(&mut model, &mut callbacks, &Dataset::xor(), None, &TrainConfig::new(3, 4)).unwrap();
        assert_eq!(summary.epochs_run, 3);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut model = xor_model(LossType::Mse);
        let result = fit(&mut model, &mut CallbackList::new(), &Dataset::xor(), None, &TrainConfig::new(1, 0));
        assert!(matches!(result, Err(CallbackError::Config(_))));
    }

    #[test]
    fn wrong_input_width_is_rejected_before_any_hook() {
        let (t, seen, _) = trace(None);
        let mut callbacks = CallbackList::new().with(t);
        let mut model = xor_model(LossType::Mse);
        let wide = Dataset::new(vec![vec![0.0, 1.0, 1.0]], vec![vec![1.0]]).unwrap();

        let result = fit(&mut model, &mut callbacks, &wide, None, &TrainConfig::new(1, 1));

        assert!(matches!(result, Err(CallbackError::ShapeMismatch { .. })));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn validation_label_width_is_checked() {
        let mut model = xor_model(LossType::Mse);
        let val = Dataset::new(vec![vec![0.0, 1.0]], vec![vec![1.0, 0.0]]).unwrap();

        let result = fit(&mut model, &mut CallbackList::new(), &Dataset::xor(), Some(&val), &TrainConfig::new(1, 4));
        assert!(matches!(result, Err(CallbackError::ShapeMismatch { .. })));
    }

    #[test]
    fn argmax_picks_the_largest_entry() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
        assert_eq!(argmax(&[]), 0);
    }
}
