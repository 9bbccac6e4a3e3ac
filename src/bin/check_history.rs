use std::env;
use std::process::ExitCode;
use watchdeck_lib::history_parser::read_history_file;
use watchdeck_lib::models::parse_watch_date;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: check_history <history.csv>");
        return ExitCode::FAILURE;
    }

    let path = &args[1];
    println!("Reading file: {}", path);

    let records = match read_history_file(path) {
        Ok(records) => records,
        Err(e) => {
            println!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Found {} records", records.len());

    let mut problems = 0;
    for (index, record) in records.iter().enumerate() {
        let mut issues = Vec::new();
        if record.title.is_empty() {
            issues.push("no title");
        }
        if record.year == 0 {
            issues.push("no release year");
        }
        if record.rating == 0.0 {
            issues.push("no rating");
        }
        if parse_watch_date(&record.watched_date).is_none() {
            issues.push("no usable watch date");
        }

        if !issues.is_empty() {
            problems += 1;
            println!("  record {}: '{}': {}", index + 1, record.title, issues.join(", "));
        }
    }

    let rewatches = records.iter().filter(|r| r.rewatch).count();
    println!("{} rewatches, {} records with problems", rewatches, problems);
    if problems == 0 {
        println!("Looks good! Ready for `watchdeck import`.");
    }
    ExitCode::SUCCESS
}
