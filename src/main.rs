use std::{
    fs::File,
    io::{self, Write},
    time::UNIX_EPOCH,
};

use backup_storage::{fs::DEFAULT_PART_SIZE, util, FSError, ObjectStorage, Storage};
use clap::{Arg, ArgMatches, Command};
use tracing::{error, info, span, Level};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().json().with_writer(io::stderr).init();

    let span = span!(Level::INFO, "main", context = "main");
    let _e = span.enter();
    info!("called");

    let name = || Arg::new("NAME").required(true).index(1);
    let file = || Arg::new("FILE").index(2);

    let matches = Command::new("backup-storage")
        .arg(Arg::new("LOCATION").required(true).index(1))
        .arg(Arg::new("part-size").long("part-size").value_name("BYTES"))
        .subcommand_required(true)
        .subcommand(Command::new("list"))
        .subcommand(Command::new("upload").arg(name()).arg(file()))
        .subcommand(Command::new("download").arg(name()).arg(file()))
        .subcommand(Command::new("delete").arg(name()))
        .get_matches();

    if let Err(err) = run(&matches).await {
        error!(error_message=%err, error_group="run");
        std::process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> Result<(), FSError> {
    let location = matches
        .get_one::<String>("LOCATION")
        .map(String::as_str)
        .unwrap_or_default();
    let (bucket, prefix) = util::object::parse_location(location)?;

    let part_size = match matches.get_one::<String>("part-size") {
        Some(value) => util::object::parse_part_size(value)?,
        None => DEFAULT_PART_SIZE,
    };
    info!(bucket = bucket, prefix = prefix, part_size = part_size, "args");

    let config = aws_config::load_from_env().await;
    let client = aws_sdk_s3::Client::new(&config);
    let storage = ObjectStorage::with_part_size(Box::new(client), bucket, prefix, part_size)?;

    let Some((command, args)) = matches.subcommand() else {
        return Ok(());
    };
    let command = command.to_string();
    let args = args.clone();

    // The storage blocks on SDK futures, so keep it off the async workers.
    tokio::task::spawn_blocking(move || execute(&storage, &command, &args))
        .await
        .map_err(|err| FSError::Io(io::Error::other(err)))?
}

fn execute(storage: &dyn Storage, command: &str, args: &ArgMatches) -> Result<(), FSError> {
    let name = args
        .try_get_one::<String>("NAME")
        .ok()
        .flatten()
        .map(String::as_str)
        .unwrap_or_default();
    let file = args.try_get_one::<String>("FILE").ok().flatten();

    match command {
        "list" => {
            let mut out = io::stdout().lock();
            for entry in storage.list()? {
                let secs = entry
                    .mod_time()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                writeln!(
                    out,
                    "{} {:>12} {:>10} {}",
                    if entry.is_dir() { 'd' } else { '-' },
                    entry.size(),
                    secs,
                    entry.name()
                )?;
            }
            Ok(())
        }
        "upload" => match file {
            Some(path) => storage.upload(name, &mut File::open(path)?),
            None => storage.upload(name, &mut io::stdin().lock()),
        },
        "download" => match file {
            Some(path) => storage.download(name, &mut File::create(path)?),
            None => storage.download(name, &mut io::stdout().lock()),
        },
        "delete" => storage.delete(name),
        _ => Ok(()),
    }
}
