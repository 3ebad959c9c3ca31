//! holder-cli - Tool for inspecting matrix, table and sidecar files.

use std::env;
use std::process;

use sim_holders::matrix::{Matrix, MatrixLoader};
use sim_holders::mdoc::{MDocument, MNode};
use sim_holders::table::{parse_date, ColumnSidecar, InputOptions, InputReader};
use sim_holders::{Element, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let args: Vec<String> = env::args().collect();

    // Global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "matrix" | "m" => {
            let Some(path) = positional(&filtered_args[1..]) else {
                usage("holder-cli matrix <file> [--fixed <exp>] [--json]");
            };
            let json = has_flag(&filtered_args, "--json");
            match option_value(&filtered_args, "--fixed") {
                Some(exp) => match exp.parse::<i32>() {
                    Ok(exp) => cmd_matrix::<i32>(path, exp, json),
                    Err(_) => usage("--fixed expects an integer exponent"),
                },
                None => cmd_matrix::<f64>(path, 0, json),
            }
        }

        "table" | "t" => {
            let Some(path) = positional(&filtered_args[1..]) else {
                usage("holder-cli table <file> [--time|--smooth] [--at <t>]... [--json]");
            };
            let options = InputOptions::default()
                .time(has_flag(&filtered_args, "--time"))
                .smooth(has_flag(&filtered_args, "--smooth"));
            let mut at = Vec::new();
            for value in option_values(&filtered_args, "--at") {
                match value.parse::<f64>() {
                    Ok(t) => at.push(t),
                    Err(_) => usage("--at expects a number"),
                }
            }
            cmd_table(path, options, &at, has_flag(&filtered_args, "--json"))
        }

        "columns" | "c" => {
            let Some(path) = positional(&filtered_args[1..]) else {
                usage("holder-cli columns <file.columns>");
            };
            cmd_columns(path)
        }

        "doc" | "mfile" => {
            let Some(path) = positional(&filtered_args[1..]) else {
                usage("holder-cli doc <file> [key]...");
            };
            let keys: Vec<&str> = filtered_args[2..]
                .iter()
                .copied()
                .filter(|a| !a.starts_with("--"))
                .collect();
            cmd_doc(path, &keys)
        }

        "date" | "d" => {
            let Some(text) = filtered_args.get(1) else {
                usage("holder-cli date <iso-8601>");
            };
            parse_date(text).map(|seconds| println!("{}", seconds))
        }

        "version" | "-V" | "--version" => {
            println!(
                "holder-cli {} (built {} {})",
                env!("CARGO_PKG_VERSION"),
                env!("HOLDER_BUILD_DATE"),
                env!("HOLDER_BUILD_TIME"),
            );
            Ok(())
        }

        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_help() {
    println!("holder-cli - matrix and table inspection");
    println!();
    println!("USAGE:");
    println!("    holder-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    m, matrix  <file> [--fixed <exp>]       Show matrix shape and nonzero entries");
    println!("    t, table   <file> [--time|--smooth]     Show discovered schema and rows");
    println!("               [--at <t>]...                Sample at the given instants");
    println!("    c, columns <file.columns>               Dump a column sidecar");
    println!("    doc        <file> [key]...              Show an M document or one subtree");
    println!("    d, date    <iso-8601>                   Convert a date to epoch seconds");
    println!("    version                                 Show version and build date");
    println!("    h, help                                 Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    --json           JSON output (matrix, table)");
    println!();
    println!("EXAMPLES:");
    println!("    holder-cli matrix weights.txt");
    println!("    holder-cli matrix weights.txt --fixed -4 --json");
    println!("    holder-cli table drive.csv --smooth --at 0.5 --at 1.25");
    println!("    holder-cli columns trace.tsv.columns");
    println!("    holder-cli doc params.n2a layer weights");
    println!("    holder-cli date 1969-07-20T20:17");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
    println!("    - A table file of '-' reads standard input");
}

fn usage(text: &str) -> ! {
    eprintln!("Usage: {}", text);
    process::exit(1);
}

fn has_flag(args: &[&str], flag: &str) -> bool {
    args.iter().any(|&a| a == flag)
}

fn option_value<'a>(args: &[&'a str], name: &str) -> Option<&'a str> {
    option_values(args, name).next()
}

fn option_values<'a, 'b>(args: &'b [&'a str], name: &'b str) -> impl Iterator<Item = &'a str> + 'b {
    args.windows(2).filter(move |w| w[0] == name).map(|w| w[1])
}

/// First argument that is neither a flag nor a flag's value.
fn positional<'a>(args: &[&'a str]) -> Option<&'a str> {
    let mut skip = false;
    for &arg in args {
        if skip {
            skip = false;
            continue;
        }
        match arg {
            "--fixed" | "--at" => skip = true,
            "-" => return Some(arg),
            _ if arg.starts_with("--") => {}
            _ => return Some(arg),
        }
    }
    None
}

fn cmd_matrix<T: Element>(path: &str, exponent: i32, json: bool) -> Result<()> {
    info!("Loading matrix: {}", path);
    let matrix: Matrix<T> = MatrixLoader::try_load(path, exponent)?;
    let entries: Vec<(usize, usize, f64)> = matrix
        .nonzeros()
        .map(|(r, c, v)| (r, c, v.to_f64(exponent)))
        .collect();
    debug!("{} nonzero entries", entries.len());

    let kind = if matrix.is_sparse() { "sparse" } else { "dense" };
    if json {
        let nonzeros: Vec<serde_json::Value> = entries
            .iter()
            .map(|&(r, c, v)| serde_json::json!([r, c, v]))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": path,
                "element": T::NAME,
                "storage": kind,
                "rows": matrix.rows(),
                "columns": matrix.columns(),
                "nonzeros": nonzeros,
            }))
            .map_err(|e| sim_holders::Error::other(e.to_string()))?
        );
        return Ok(());
    }

    println!("Matrix: {}", path);
    println!("Element: {}", T::NAME);
    println!("Storage: {}", kind);
    println!("Shape: {} x {}", matrix.rows(), matrix.columns());
    println!("Nonzeros: {}", entries.len());
    for (r, c, v) in entries {
        println!("  ({}, {}) = {}", r, c, v);
    }
    Ok(())
}

fn cmd_table(path: &str, options: InputOptions, at: &[f64], json: bool) -> Result<()> {
    info!("Opening table: {}", path);
    let mut reader = InputReader::open(path, options)?;

    let mut samples: Vec<(f64, Vec<f64>)> = Vec::new();
    if at.is_empty() {
        // Prime the look-ahead, then step row by row.
        reader.row(f64::NEG_INFINITY);
        while let Some(t) = reader.next_time() {
            let values = reader.row(t).as_slice().to_vec();
            samples.push((t, values));
        }
    } else {
        for &t in at {
            let values = reader.row(t).as_slice().to_vec();
            samples.push((t, values));
        }
    }
    debug!("{} samples", samples.len());

    let names: Vec<(usize, String)> = reader
        .schema()
        .iter()
        .map(|(slot, name)| (slot, name.to_string()))
        .collect();
    let key = if reader.options().time { "t" } else { "row" };

    if json {
        let rows: Vec<serde_json::Value> = samples
            .iter()
            .map(|(t, values)| serde_json::json!({ key: t, "values": values }))
            .collect();
        let columns: Vec<serde_json::Value> = names
            .iter()
            .map(|(slot, name)| serde_json::json!({ "index": slot, "name": name }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": path,
                "delimiter": reader.delimiter().map(|d| d.to_string()),
                "width": reader.columns(),
                "time_column": reader.time_column(),
                "columns": columns,
                "rows": rows,
            }))
            .map_err(|e| sim_holders::Error::other(e.to_string()))?
        );
        return Ok(());
    }

    println!("Table: {}", path);
    println!("Delimiter: {}", describe_delimiter(reader.delimiter()));
    println!("Width: {}", reader.columns());
    if let Some(slot) = reader.time_column() {
        println!("Time column: {}", slot);
    }
    if !names.is_empty() {
        println!("Columns:");
        for (slot, name) in &names {
            println!("  {}: {}", slot, name);
        }
    }
    println!("Rows:");
    for (t, values) in &samples {
        let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        println!("  {} = {}: {}", key, t, cells.join(" "));
    }
    Ok(())
}

fn cmd_columns(path: &str) -> Result<()> {
    let sidecar = ColumnSidecar::read(path)?;
    println!("Sidecar: {}", path);
    for column in &sidecar.columns {
        println!("  {}: {}", column.index, column.name);
        for (k, v) in column.mode.iter() {
            println!("      {} = {}", k, v);
        }
    }
    Ok(())
}

fn cmd_doc(path: &str, keys: &[&str]) -> Result<()> {
    info!("Opening document: {}", path);
    let doc = MDocument::open(path)?;
    let Some(node) = doc.root().get(keys) else {
        return Err(sim_holders::Error::other(format!("no node at {}", keys.join("."))));
    };
    debug!("{} children", node.len());

    if keys.is_empty() {
        print!("{}", node.render());
        return Ok(());
    }
    if let Some(value) = node.value() {
        println!("{}", value);
    }
    if !node.is_empty() {
        // Render the subtree as its own document, minus the version line.
        let mut subtree = MNode::new();
        for (key, child) in node.iter() {
            *subtree.entry(&[key]) = child.clone();
        }
        let text = subtree.render();
        print!("{}", text.split_once('\n').map_or("", |(_, rest)| rest));
    }
    Ok(())
}

fn describe_delimiter(delimiter: Option<char>) -> &'static str {
    match delimiter {
        Some('\t') => "tab",
        Some(',') => "comma",
        Some(' ') => "space",
        Some(_) => "other",
        None => "none (empty input)",
    }
}
