use clap::{Arg, ArgAction, ArgMatches, Command};
use poesync::{
    API_KEY_ENV, CollectionCatalog, Driver, MockService, Orchestrator, PROJECT_ID_ENV,
    PoEditorClient, SETTINGS_FILE, SyncConfig, SyncOptions, SyncState, SyncSummary,
    TranslationService,
};
use poesync_tables::{LocaleString, TableCollection, init_collection, load_collection};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Pace of the frame-driven mode
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

fn cli() -> Command {
    Command::new("poesync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Synchronize POEditor translations into local string tables")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Settings file")
                .default_value(SETTINGS_FILE)
                .global(true),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .help("POEditor API token")
                .env(API_KEY_ENV)
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new("project")
                .long("project")
                .short('p')
                .help("POEditor project id")
                .env(PROJECT_ID_ENV)
                .global(true),
        )
        .arg(
            Arg::new("collection")
                .long("collection")
                .help("String table collection name")
                .global(true),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .help("Directory holding string table collections")
                .global(true),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("POEditor API endpoint")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show debug logs")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("projects").about("List projects visible to the API token"))
        .subcommand(
            Command::new("sync")
                .about("Pull every available locale into the local string tables")
                .arg(
                    Arg::new("locale")
                        .long("locale")
                        .short('l')
                        .help("Only synchronize this locale (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .help("How the run is driven")
                        .value_parser(["poll", "frames"])
                        .default_value("poll"),
                )
                .arg(
                    Arg::new("attempts")
                        .long("attempts")
                        .help("Export attempts per locale (transport failures only)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Exit with an error when any locale fails")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("mock")
                        .long("mock")
                        .short('m')
                        .help("Use the mock service instead of POEditor")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the summary as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about("Create a local collection with empty tables")
                .arg(
                    Arg::new("locales")
                        .help("Locale codes, in display order")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Render one entry through the positional formatter")
                .arg(Arg::new("locale").required(true).index(1))
                .arg(Arg::new("key").required(true).index(2))
                .arg(Arg::new("args").num_args(0..).index(3)),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the settings file")
                .subcommand_required(true)
                .subcommand(Command::new("save").about("Write the current settings to the settings file")),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let settings_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
    let config = resolve_config(&matches, &settings_path)?;

    match matches.subcommand() {
        Some(("projects", _)) => list_projects(&config),
        Some(("sync", sub)) => sync(&config, sub),
        Some(("init", sub)) => init(&config, sub),
        Some(("show", sub)) => show(&config, sub),
        Some(("config", sub)) => match sub.subcommand() {
            Some(("save", _)) => {
                config.save(&settings_path)?;
                println!("✅ Settings saved to {}", settings_path.display());
                Ok(())
            }
            _ => Err("Unknown config command".into()),
        },
        _ => Err("Unknown command".into()),
    }
}

/// Settings file, then environment and flags on top
fn resolve_config(
    matches: &ArgMatches,
    settings_path: &std::path::Path,
) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let mut config = SyncConfig::load(settings_path)?;

    if let Some(key) = matches.get_one::<String>("api-key") {
        config.api_key = Some(key.clone());
    }
    if let Some(project) = matches.get_one::<String>("project") {
        config.project_id = Some(project.clone());
    }
    if let Some(collection) = matches.get_one::<String>("collection") {
        config.table_collection = collection.clone();
    }
    if let Some(store) = matches.get_one::<String>("store") {
        config.store_dir = PathBuf::from(store);
    }
    if let Some(url) = matches.get_one::<String>("base-url") {
        config.base_url = Some(url.clone());
    }
    Ok(config)
}

fn build_client(config: &SyncConfig) -> Result<PoEditorClient, Box<dyn std::error::Error>> {
    let Some(api_key) = config.api_key.clone() else {
        eprintln!("❌ {API_KEY_ENV} environment variable not set");
        eprintln!("   Set it with: export {API_KEY_ENV}=your_api_token");
        eprintln!("   Or use --mock to run against the mock service");
        return Err("Missing API key".into());
    };
    let client = PoEditorClient::new(api_key)?;
    Ok(match &config.base_url {
        Some(url) => client.with_base_url(url),
        None => client,
    })
}

fn list_projects(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let projects = runtime.block_on(client.list_projects())?;

    if projects.is_empty() {
        println!("No projects visible to this API token");
    }
    for project in projects {
        println!("{:>8}  {}", project.id, project.name);
    }
    Ok(())
}

/// Seed the mock with the first declared locale, as if it were the source language
fn mock_service(strings: &TableCollection) -> MockService {
    let seed = strings
        .available_locales()
        .first()
        .and_then(|locale| strings.table(locale))
        .map(|table| {
            table
                .entries()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    MockService::new().with_seed_entries(seed)
}

fn sync(config: &SyncConfig, sub: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let use_mock = sub.get_flag("mock");
    let mut config = config.clone();
    if let Some(attempts) = sub.get_one::<u32>("attempts") {
        config.export_attempts = *attempts;
    }
    if use_mock && config.project_id.is_none() {
        config.project_id = Some("mock".to_string());
    }
    if !use_mock {
        config.validate()?;
    }

    let mut strings = load_collection(&config.store_dir, &config.table_collection)?;
    let catalog = CollectionCatalog::new(config.store_dir.clone(), &config.table_collection);
    let service: Box<dyn TranslationService> = if use_mock {
        Box::new(mock_service(&strings))
    } else {
        Box::new(build_client(&config)?)
    };

    let locales: Vec<String> = sub
        .get_many::<String>("locale")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let options = SyncOptions::new(config.project_id.as_deref().unwrap_or_default())?
        .with_retry(config.retry_policy())
        .with_locale_filter(locales);

    info!(
        collection = %config.table_collection,
        store = %config.store_dir.display(),
        "Loaded string tables"
    );

    let orchestrator = Orchestrator::new(service.as_ref(), &catalog, &mut strings, options);
    let driver = Driver::new(orchestrator)?;
    let mode = sub.get_one::<String>("mode").map(String::as_str);
    let summary = match mode {
        Some("frames") => {
            let mut last = SyncState::Idle;
            driver.run_host_loop(|state| {
                if *state != last {
                    eprintln!("⏳ {state}");
                    last = state.clone();
                }
                std::thread::sleep(FRAME_INTERVAL);
            })?
        }
        _ => driver.run_polling(config.poll_interval())?,
    };

    print_summary(&summary, sub.get_flag("json"))?;

    if sub.get_flag("strict") && !summary.is_clean() {
        return Err(format!("{} locale(s) failed", summary.failed()).into());
    }
    Ok(())
}

fn print_summary(summary: &SyncSummary, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn init(config: &SyncConfig, sub: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let locales: Vec<String> = sub
        .get_many::<String>("locales")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let strings = init_collection(&config.store_dir, &config.table_collection, &locales)?;

    println!(
        "✅ Collection '{}' ready with locales: {}",
        strings.name(),
        strings.available_locales().join(", ")
    );
    Ok(())
}

fn show(config: &SyncConfig, sub: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let locale = sub
        .get_one::<String>("locale")
        .ok_or("Missing locale")?;
    let key = sub.get_one::<String>("key").ok_or("Missing key")?;
    let args: Vec<String> = sub
        .get_many::<String>("args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let strings = load_collection(&config.store_dir, &config.table_collection)?;
    let text = LocaleString::new(key, args);
    let _printer = text.subscribe(|rendered| println!("{rendered}"));
    text.refresh(&strings, locale);
    Ok(())
}
