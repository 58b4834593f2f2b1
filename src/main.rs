use std::io::Write;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use keyvalue::cli::commands;
use keyvalue::cli::{AuthAction, Cli, Commands};

fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Generate { count, ref captcha } => {
            commands::generate::execute(&cli, count, captcha.as_deref())
        }
        Commands::Store {
            ref data,
            ttl,
            ref schema,
        } => commands::store::execute(&cli, data, ttl, schema.as_deref()),
        Commands::Get { raw } => commands::get::execute(&cli, raw),
        Commands::Delete { force, show } => commands::delete::execute(&cli, force, show),
        Commands::Patch {
            version,
            ref set,
            ref remove,
            ttl,
        } => commands::patch::execute(&cli, version, set, remove, ttl),
        Commands::PatchDemo { ref demo } => commands::patch_demo::execute(&cli, demo),
        Commands::Batch { ref file } => commands::batch::execute(&cli, file),
        Commands::BatchDemo => commands::batch::execute_demo(&cli),
        Commands::History { ref action } => commands::history::execute(&cli, action),
        Commands::Encrypt { ref action } => commands::encrypt::execute(&cli, action),
        Commands::Secret { ref action } => commands::secret::execute(&cli, action),
        Commands::Lifecycle => commands::lifecycle::execute(&cli),
        Commands::Cleanup { force, yes } => commands::cleanup::execute(&cli, force, yes),
        Commands::Ip { ref action } => commands::ip::execute(&cli, action),
        Commands::Signal { ref mode } => commands::signal::execute(&cli, mode),
        Commands::Clipboard { ref action } => commands::clipboard::execute(&cli, action),
        Commands::Auth { ref action } => match action {
            AuthAction::Keyring { delete } => commands::auth::execute_keyring(&cli, *delete),
        },
        Commands::Completions { ref shell } => commands::completions::execute(shell),
    };

    if let Err(e) = result {
        keyvalue::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
