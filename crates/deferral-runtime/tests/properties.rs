//! properties.rs - property tests for unwind ordering and exactly-once execution

use deferral_runtime::{Binding, Failure, Runtime};
use proptest::prelude::*;

/// Registration plan: for each action, whether it fails
fn plan() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 0..24)
}

proptest! {
    #[test]
    fn prop_every_action_runs_once_in_reverse(plan in plan(), body_fails in any::<bool>()) {
        let runtime = Runtime::new();
        let ran = Binding::new(Vec::new());

        let result: Result<usize, Failure> = runtime.call("prop", |frame| {
            for (i, fails) in plan.iter().copied().enumerate() {
                let ran = ran.clone();
                frame.defer(format!("action {}", i), move |_| {
                    ran.modify(|v| v.push(i));
                    if fails {
                        Err(Failure::raise(format!("action {} failed", i)))
                    } else {
                        Ok(())
                    }
                })?;
            }
            if body_fails {
                Err(Failure::raise("body failed"))
            } else {
                Ok(plan.len())
            }
        });

        let expected: Vec<usize> = (0..plan.len()).rev().collect();
        prop_assert_eq!(ran.get(), expected);

        // the earliest-registered failing action runs last, so it wins
        match plan.iter().position(|fails| *fails) {
            Some(first) => {
                let message = result.unwrap_err().message;
                prop_assert_eq!(message, format!("action {} failed", first));
            }
            None if body_fails => {
                prop_assert_eq!(result.unwrap_err().message, "body failed");
            }
            None => prop_assert_eq!(result, Ok(plan.len())),
        }
    }

    #[test]
    fn prop_value_capture_is_a_snapshot(initial in any::<i64>(), later in any::<i64>()) {
        let runtime = Runtime::new();
        let seen = Binding::new(None);

        runtime.call("snapshot", |frame| {
            let source = Binding::new(initial);
            let s = seen.clone();
            frame.defer_with("read", [source.get()], move |args, _| {
                s.set(args[0].as_int());
                Ok(())
            })?;
            source.set(later);
            Ok(())
        }).unwrap();

        prop_assert_eq!(seen.get(), Some(initial));
    }
}
