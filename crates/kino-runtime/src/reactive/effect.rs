//! Side effects that re-run when the cells they read change

use super::tracking::{self, Subscriber};
use std::fmt;

/// Handle to a running effect.
///
/// The effect keeps re-running on changes while the handle is alive.
/// [`Effect::dispose`] or dropping the handle deactivates it; cells discard
/// the inactive subscriber on their next notification. Dependencies are
/// never retired while the effect is live, so a branch it stopped taking can
/// still trigger a re-run.
#[must_use = "dropping an Effect stops it; call detach() to keep it running"]
pub struct Effect {
    subscriber: Option<Subscriber>,
}

impl Effect {
    /// Stop re-running. Idempotent.
    pub fn dispose(&self) {
        if let Some(subscriber) = &self.subscriber {
            subscriber.deactivate();
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscriber.as_ref().is_some_and(Subscriber::is_active)
    }

    /// Keep the effect running for as long as the cells it reads exist
    pub fn detach(mut self) {
        self.subscriber = None;
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("active", &self.is_active()).finish()
    }
}

/// Run `f` now and again whenever a cell it read changes.
///
/// During each run the effect is the active tracking context, so every cell
/// it reads subscribes it. A failure of the first run is logged and returned;
/// failures of later runs are logged by the notifying cell.
pub fn effect<F>(f: F) -> anyhow::Result<Effect>
where
    F: Fn() -> anyhow::Result<()> + 'static,
{
    let subscriber = Subscriber::new_cyclic("effect", move |me| {
        move || {
            let _guard = tracking::enter(me.upgrade());
            f()
        }
    });

    if let Err(e) = subscriber.notify() {
        tracing::error!(error = %e, "Effect failed on first run");
        subscriber.deactivate();
        return Err(e);
    }

    Ok(Effect {
        subscriber: Some(subscriber),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{untracked, Computed, Signal};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_runs_immediately_and_on_change() {
        let volume = Signal::new(0.5_f64);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (v, s) = (volume.clone(), seen.clone());
        let _effect = effect(move || {
            s.borrow_mut().push(v.get());
            Ok(())
        })
        .unwrap();

        volume.set(0.8);
        volume.set(0.8);
        assert_eq!(*seen.borrow(), vec![0.5, 0.8]);
    }

    #[test]
    fn test_reads_once_subscribe_once() {
        let muted = Signal::new(false);
        let m = muted.clone();
        let _effect = effect(move || {
            let _ = m.get();
            let _ = m.get();
            Ok(())
        })
        .unwrap();
        assert_eq!(muted.subscriber_count(), 1);
    }

    #[test]
    fn test_nested_reads_do_not_leak_outward() {
        let outer_src = Signal::new(1);
        let inner_src = Signal::new(1);
        let outer_runs = Rc::new(Cell::new(0));

        let inner = inner_src.clone();
        let derived = Computed::new(move || inner.get() * 2);

        let (o, d, runs) = (outer_src.clone(), derived.clone(), outer_runs.clone());
        let _effect = effect(move || {
            runs.set(runs.get() + 1);
            let _ = o.get();
            let _ = d.get();
            Ok(())
        })
        .unwrap();

        // The effect subscribed to the derivation, not to its source
        assert_eq!(inner_src.subscriber_count(), 1);
        assert_eq!(derived.subscriber_count(), 1);

        inner_src.set(2);
        assert_eq!(outer_runs.get(), 2);
        outer_src.set(2);
        assert_eq!(outer_runs.get(), 3);
    }

    #[test]
    fn test_first_run_error_is_returned_and_context_restored() {
        let source = Signal::new(0);
        let s = source.clone();
        let result = effect(move || {
            let _ = s.get();
            Err(anyhow::anyhow!("render failed"))
        });

        assert!(result.is_err());
        assert!(tracking::current().is_none());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_dispose_stops_reruns() {
        let rate = Signal::new(1.0_f64);
        let runs = Rc::new(Cell::new(0));
        let (r, n) = (rate.clone(), runs.clone());
        let handle = effect(move || {
            n.set(n.get() + 1);
            let _ = r.get();
            Ok(())
        })
        .unwrap();

        rate.set(2.0);
        handle.dispose();
        rate.set(3.0);
        assert_eq!(runs.get(), 2);
        assert!(!handle.is_active());
    }

    #[test]
    fn test_stale_branch_still_triggers() {
        let use_a = Signal::new(true);
        let a = Signal::new(0);
        let b = Signal::new(0);
        let runs = Rc::new(Cell::new(0));

        let (flag, a2, b2, n) = (use_a.clone(), a.clone(), b.clone(), runs.clone());
        let _effect = effect(move || {
            n.set(n.get() + 1);
            if flag.get() {
                let _ = a2.get();
            } else {
                let _ = b2.get();
            }
            Ok(())
        })
        .unwrap();

        use_a.set(false);
        assert_eq!(runs.get(), 2);
        // `a` is no longer read but its subscription was never retired
        a.set(1);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_untracked_read_inside_effect() {
        let source = Signal::new(1);
        let s = source.clone();
        let _effect = effect(move || {
            let _ = untracked(|| s.get());
            Ok(())
        })
        .unwrap();
        assert_eq!(source.subscriber_count(), 0);
    }
}
