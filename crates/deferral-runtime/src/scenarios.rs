//! Built-in scenarios
//!
//! Small invocations that exercise each deferred-call rule: capture modes,
//! named versus unnamed results, results returned by reference, cleanup on
//! failure and failure masking. The CLI runs them; the tests pin their output.

use crate::binding::Binding;
use crate::error::Failure;
use crate::runtime::Runtime;
use crate::shared::SharedTable;
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::thread;
use thiserror::Error;

/// A runnable demonstration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Capture,
    Unnamed,
    Named,
    Reference,
    Shadowed,
    Loop,
    Lookup,
    Release,
    Masking,
}

/// Scenario name not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scenario '{0}'")]
pub struct UnknownScenario(pub String);

/// Output of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub name: &'static str,
    /// Lines printed by the body and its deferred actions, in execution order
    pub transcript: Vec<String>,
    /// Value the caller received
    pub returned: Option<Value>,
    /// Failure the caller received
    pub failure: Option<Failure>,
}

impl Scenario {
    pub const ALL: [Scenario; 9] = [
        Scenario::Capture,
        Scenario::Unnamed,
        Scenario::Named,
        Scenario::Reference,
        Scenario::Shadowed,
        Scenario::Loop,
        Scenario::Lookup,
        Scenario::Release,
        Scenario::Masking,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Capture => "capture",
            Scenario::Unnamed => "unnamed",
            Scenario::Named => "named",
            Scenario::Reference => "reference",
            Scenario::Shadowed => "shadowed",
            Scenario::Loop => "loop",
            Scenario::Lookup => "lookup",
            Scenario::Release => "release",
            Scenario::Masking => "masking",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Scenario::Capture => {
                "value capture snapshots at registration, environment capture reads at execution"
            }
            Scenario::Unnamed => "deferred writes to a local cannot change an unnamed result",
            Scenario::Named => "deferred writes to a named result reach the caller",
            Scenario::Reference => "a result returned by reference observes deferred writes",
            Scenario::Shadowed => "an action that captured the named result by value mutates only its copy",
            Scenario::Loop => "actions registered in a loop run in reverse",
            Scenario::Lookup => "lock, then defer the unlock, across threads",
            Scenario::Release => "a registered release runs even when the body fails",
            Scenario::Masking => "the last failure raised during unwind is the one the caller sees",
        }
    }

    /// Run against `runtime`
    pub fn run(&self, runtime: &Runtime) -> ScenarioReport {
        let out = Transcript::default();
        let outcome = match self {
            Scenario::Capture => capture(runtime, &out),
            Scenario::Unnamed => unnamed(runtime, &out),
            Scenario::Named => named(runtime, &out),
            Scenario::Reference => reference(runtime, &out),
            Scenario::Shadowed => shadowed(runtime, &out),
            Scenario::Loop => deferred_loop(runtime, &out),
            Scenario::Lookup => lookup(runtime, &out),
            Scenario::Release => release(runtime, &out),
            Scenario::Masking => masking(runtime, &out),
        };

        let (returned, failure) = match outcome {
            Ok(value) => (value, None),
            Err(failure) => (None, Some(failure)),
        };
        ScenarioReport {
            name: self.name(),
            transcript: out.lines(),
            returned,
            failure,
        }
    }
}

impl ScenarioReport {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

/// Lines printed during a scenario
#[derive(Clone, Default)]
struct Transcript(Binding<Vec<String>>);

impl Transcript {
    fn say(&self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        self.0.modify(|lines| lines.push(line));
    }

    fn lines(&self) -> Vec<String> {
        self.0.get()
    }
}

fn render_args(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

type Outcome = Result<Option<Value>, Failure>;

fn capture(runtime: &Runtime, out: &Transcript) -> Outcome {
    runtime.call("capture", |frame| {
        let a = Binding::new(1i64);

        let o = out.clone();
        let args = [Value::from("1: a ="), Value::from(a.get())];
        frame.defer_with("print", args, move |args, _| {
            o.say(render_args(args));
            Ok(())
        })?;

        let o = out.clone();
        frame.defer_with("closure with argument", [a.get()], move |args, _| {
            o.say(format!("2: a = {}", render_args(args)));
            Ok(())
        })?;

        let (o, a3) = (out.clone(), a.clone());
        frame.defer("closure", move |_| {
            o.say(format!("3: a = {}", a3.get()));
            Ok(())
        })?;

        a.update(|n| n + 1);
        Ok(())
    })?;
    Ok(None)
}

/// Two environment-capturing increments of `a`
fn register_increments<'a, T>(
    frame: &mut crate::frame::InvocationFrame<'a, T>,
    a: &Binding<i64>,
    out: &Transcript,
) -> Result<(), Failure> {
    for label in ["defer1", "defer2"] {
        let (a, o) = (a.clone(), out.clone());
        frame.defer(label, move |_| {
            let n = a.update(|n| n + 1);
            o.say(format!("{}: {}", label, n));
            Ok(())
        })?;
    }
    Ok(())
}

fn unnamed(runtime: &Runtime, out: &Transcript) -> Outcome {
    let returned = runtime.call("unnamed", |frame| {
        let a = Binding::new(0i64);
        register_increments(frame, &a, out)?;
        Ok(a.get())
    })?;
    Ok(Some(Value::from(returned)))
}

fn named(runtime: &Runtime, out: &Transcript) -> Outcome {
    let returned = runtime.call_named("named", 0i64, |frame, a| {
        register_increments(frame, a, out)?;
        Ok(a.get())
    })?;
    Ok(Some(Value::from(returned)))
}

fn reference(runtime: &Runtime, out: &Transcript) -> Outcome {
    let i = runtime.call("reference", |frame| {
        let i = Binding::new(0i64);
        for label in ["defer2", "defer1"] {
            let (i, o) = (i.clone(), out.clone());
            frame.defer(label, move |_| {
                let n = i.update(|n| n + 1);
                o.say(format!("{}: {}", label, n));
                Ok(())
            })?;
        }
        Ok(i)
    })?;
    Ok(Some(Value::from(i.get())))
}

fn shadowed(runtime: &Runtime, out: &Transcript) -> Outcome {
    let returned = runtime.call_named("shadowed", 0i64, |frame, r| {
        let o = out.clone();
        frame.defer_with("add five to copy", [r.get()], move |args, _| {
            let own = args.first().and_then(Value::as_int).unwrap_or_default() + 5;
            o.say(format!("r = {}", own));
            Ok(())
        })?;
        out.say(format!("r = {}", r.get()));
        Ok(1)
    })?;
    Ok(Some(Value::from(returned)))
}

fn deferred_loop(runtime: &Runtime, out: &Transcript) -> Outcome {
    runtime.call("loop", |frame| {
        for item in ["a", "b", "c"] {
            let o = out.clone();
            frame.defer_with("pp", [item], move |args, _| {
                o.say(render_args(args));
                Ok(())
            })?;
        }
        Ok(())
    })?;
    Ok(None)
}

fn lookup(runtime: &Runtime, out: &Transcript) -> Outcome {
    const WORKERS: i64 = 4;
    let table = SharedTable::new();

    let written: Result<(), Failure> = thread::scope(|s| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let table = &table;
                s.spawn(move || table.insert(runtime, format!("worker-{}", worker), worker * worker))
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| Failure::raise("worker thread panicked"))??;
        }
        Ok(())
    });
    written?;

    for worker in 0..WORKERS {
        let key = format!("worker-{}", worker);
        let value = table.lookup(runtime, &key)?;
        out.say(format!("{} = {}", key, Value::from(value)));
    }
    Ok(Some(Value::from(table.len() as i64)))
}

fn release(runtime: &Runtime, out: &Transcript) -> Outcome {
    runtime.call("release", |frame| {
        out.say("acquire handle");
        let o = out.clone();
        frame.defer("release handle", move |scope| {
            match scope.in_flight() {
                Some(failure) => {
                    o.say(format!("release handle while failing: {}", failure.message))
                }
                None => o.say("release handle"),
            }
            Ok(())
        })?;
        out.say("read from handle");
        Err(Failure::raise("read: connection reset"))
    })
}

fn masking(runtime: &Runtime, out: &Transcript) -> Outcome {
    runtime.call("masking", |frame| {
        for label in ["first", "second"] {
            let o = out.clone();
            frame.defer(label, move |_| {
                o.say(format!("{} cleanup fails", label));
                Err(Failure::raise(format!("{} cleanup failed", label)))
            })?;
        }
        Ok(Some(Value::from(0)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
        assert_eq!(
            "nope".parse::<Scenario>(),
            Err(UnknownScenario("nope".to_string()))
        );
    }

    #[test]
    fn test_report_json_shape() {
        let report = Scenario::Masking.run(&Runtime::new());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["name"], "masking");
        assert_eq!(json["returned"], serde_json::Value::Null);
        assert_eq!(json["failure"]["origin"], "action");
        assert_eq!(json["failure"]["label"], "first");
        assert_eq!(json["failure"]["kind"], "raised");
    }

    #[test]
    fn test_every_scenario_has_a_summary() {
        for scenario in Scenario::ALL {
            assert!(!scenario.summary().is_empty());
        }
    }
}
