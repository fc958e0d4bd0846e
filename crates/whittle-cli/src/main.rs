use std::{env, fs, process::ExitCode};

use whittle::{ExecutionTracer, SliceConfig, Slicer, SourceModule, TraceEvent, replay};

const USAGE: &str = "usage: whittle <source> <trace.json> [--verbose] [--json] [--no-write]";

fn main() -> ExitCode {
    let mut positional: Vec<String> = Vec::new();
    let mut verbose = false;
    let mut json = false;
    let mut no_write = false;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--verbose" => verbose = true,
            "--json" => json = true,
            "--no-write" => no_write = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return ExitCode::SUCCESS;
            }
            flag if flag.starts_with('-') => {
                eprintln!("error: unknown flag '{flag}'\n{USAGE}");
                return ExitCode::FAILURE;
            }
            _ => positional.push(arg),
        }
    }
    let [source_path, trace_path] = positional.as_slice() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(source_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {source_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let trace = match fs::read_to_string(trace_path) {
        Ok(trace) => trace,
        Err(err) => {
            eprintln!("error: cannot read {trace_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut events: Vec<TraceEvent> = match serde_json::from_str(&trace) {
        Ok(events) => events,
        Err(err) => {
            eprintln!("error: invalid trace file {trace_path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    if no_write {
        events.retain(|event| !matches!(event, TraceEvent::EndExecution));
    }

    let module = match SourceModule::parse(source, source_path) {
        Ok(module) => module,
        Err(err) => {
            eprintln!("error:\n{err}");
            return ExitCode::FAILURE;
        }
    };
    let mut slicer = Slicer::new(module, SliceConfig::default());

    if let Err(err) = replay(&events, &mut slicer) {
        eprintln!("error:\n{err}");
        return ExitCode::FAILURE;
    }
    // traces without an explicit end-of-execution event still produce a slice
    if slicer.outcome().is_none() && !no_write {
        if let Err(err) = slicer.on_end_execution() {
            eprintln!("error:\n{err}");
            return ExitCode::FAILURE;
        }
    }
    let outcome = if no_write {
        match slicer.finish() {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("error:\n{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match slicer.outcome() {
            Some(outcome) => outcome.clone(),
            None => {
                eprintln!("error: trace produced no slice");
                return ExitCode::FAILURE;
            }
        }
    };

    if verbose {
        eprintln!("{}", slicer.report());
    }
    if json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(out) => println!("{out}"),
            Err(err) => {
                eprintln!("error: cannot serialize result: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        eprintln!("kept {} lines: {:?}", outcome.keep.len(), outcome.keep);
        match (&outcome.output_path, no_write) {
            (Some(path), false) => eprintln!("sliced file written to {}", path.display()),
            (Some(path), true) => eprintln!("skipped writing {}", path.display()),
            (None, _) => eprintln!("no sliced file: input does not carry the original extension"),
        }
    }
    ExitCode::SUCCESS
}
