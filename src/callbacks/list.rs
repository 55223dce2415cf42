use crate::callbacks::{Callback, Logs};
use crate::error::Result;
use crate::model::ModelHandle;

/// Ordered observers; each hook is forwarded to every callback in insertion order.
///
/// The first failing callback aborts the dispatch and its error is returned.
#[derive(Default)]
pub struct CallbackList {
    callbacks: Vec<Box<dyn Callback>>,
}

macro_rules! dispatch {
    ($(#[$doc:meta])* $hook:ident()) => {
        $(#[$doc])*
        pub fn $hook(&mut self, model: &mut dyn ModelHandle, logs: &Logs) -> Result<()> {
            for cb in &mut self.callbacks {
                cb.$hook(model, logs)?;
            }
            Ok(())
        }
    };
    ($(#[$doc:meta])* $hook:ident(index)) => {
        $(#[$doc])*
        pub fn $hook(&mut self, model: &mut dyn ModelHandle, index: usize, logs: &Logs) -> Result<()> {
            for cb in &mut self.callbacks {
                cb.$hook(model, index, logs)?;
            }
            Ok(())
        }
    };
}

impl CallbackList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, callback: impl Callback + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn push_boxed(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    pub fn with(mut self, callback: impl Callback + 'static) -> Self {
        self.push(callback);
        self
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    dispatch!(
        /// Fires once, before the first epoch.
        on_train_begin()
    );
    dispatch!(
        /// Fires once, after the last epoch or after an early stop.
        on_train_end()
    );
    dispatch!(on_epoch_begin(index));
    dispatch!(on_epoch_end(index));
    dispatch!(on_batch_begin(index));
    dispatch!(on_batch_end(index));
    dispatch!(on_train_batch_begin(index));
    dispatch!(on_train_batch_end(index));
    dispatch!(on_test_begin());
    dispatch!(on_test_end());
    dispatch!(on_test_batch_begin(index));
    dispatch!(on_test_batch_end(index));
}

impl FromIterator<Box<dyn Callback>> for CallbackList {
    fn from_iter<I: IntoIterator<Item = Box<dyn Callback>>>(iter: I) -> Self {
        Self {
            callbacks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::error::CallbackError;
    use crate::testing::RecordingModel;

    struct Tracer {
        name: &'static str,
        seen: Rc<RefCell<Vec<String>>>,
        fail_on_epoch_end: bool,
    }

    impl Callback for Tracer {
        fn name(&self) -> &str {
            self.name
        }

        fn on_train_begin(&mut self, _model: &mut dyn ModelHandle, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push(format!("{}:train_begin", self.name));
            Ok(())
        }

        fn on_epoch_end(&mut self, _model: &mut dyn ModelHandle, epoch: usize, _logs: &Logs) -> Result<()> {
            self.seen.borrow_mut().push(format!("{}:epoch_end:{epoch}", self.name));
            if self.fail_on_epoch_end {
                return Err(CallbackError::Config("boom".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn dispatches_in_insertion_order_and_stops_on_error() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let tracer = |name, fail| Tracer { name, seen: Rc::clone(&seen), fail_on_epoch_end: fail };
        let mut list = CallbackList::new()
            .with(tracer("a", false))
            .with(tracer("b", true))
            .with(tracer("c", false));
        let mut model = RecordingModel::default();

        list.on_train_begin(&mut model, &Logs::new()).unwrap();
        assert!(list.on_epoch_end(&mut model, 1, &Logs::new()).is_err());
        // hooks a callback does not override are silent no-ops
        list.on_test_batch_end(&mut model, 0, &Logs::new()).unwrap();

        assert_eq!(
            *seen.borrow(),
            ["a:train_begin", "b:train_begin", "c:train_begin", "a:epoch_end:1", "b:epoch_end:1"]
        );
        assert_eq!(list.names(), ["a", "b", "c"]);
    }
}
