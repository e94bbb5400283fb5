use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use fxa_broker::broker::{Account, Broker, Hook, VariantRegistry};
use fxa_broker::channel::{ChannelError, MemoryWindow};
use fxa_broker::config::BrokerConfig;
use fxa_broker::verification::{
    LogReporter, ResetPasswordVerification, ResumeToken, ResumeTokenModel,
    populate_from_resume_token,
};
use serde_json::{Map, Value};
use std::sync::Arc;

const DEFAULT_PAGE: &str = "http://127.0.0.1:3030/";

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let log_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) if path.ends_with(".json") => BrokerConfig::load_from_json(path),
        Some(path) => BrokerConfig::load_from_file(path),
        None => Ok(BrokerConfig::default()),
    }
    .map_err(|e| anyhow::anyhow!("{}", e))
    .context("failed to load configuration")?;

    match matches.subcommand() {
        Some(("variants", _)) => {
            let registry = config.build_registry()?;
            for type_name in registry.types() {
                let variant = registry.get(&type_name)?;
                println!(
                    "{:<24} parent={:<20} channel={:?}",
                    type_name,
                    variant.parent().unwrap_or("-"),
                    variant.channel()
                );
            }
        }
        Some(("describe", sub)) => describe(&config, sub)?,
        Some(("dispatch", sub)) => dispatch(&config, sub).await?,
        Some(("config", sub)) => match sub.subcommand() {
            Some(("validate", _)) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(errors) => {
                    for error in &errors {
                        eprintln!("error: {}", error);
                    }
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
            },
            _ => println!("{}", BrokerConfig::generate_sample_config()),
        },
        Some(("check-reset-link", sub)) => check_reset_link(sub)?,
        Some(("resume-token", sub)) => resume_token(sub)?,
        _ => {
            build_cli().print_help()?;
            println!();
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    Command::new("fxa-broker")
        .about("Inspect and exercise Firefox Accounts auth brokers")
        .version(clap::crate_version!())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .env("FXA_BROKER_CONFIG")
                .help("Configuration file (TOML, or JSON with a .json extension)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log channel traffic to stderr"),
        )
        .subcommand(Command::new("variants").about("List registered broker types"))
        .subcommand(
            Command::new("describe")
                .about("Show the tables of one broker type")
                .arg(Arg::new("type").required(true)),
        )
        .subcommand(
            Command::new("dispatch")
                .about("Run one hook and print the messages and transition it produces")
                .arg(Arg::new("type").required(true))
                .arg(Arg::new("hook").required(true))
                .arg(Arg::new("email").long("email").default_value("user@example.com"))
                .arg(Arg::new("uid").long("uid"))
                .arg(
                    Arg::new("customize-sync")
                        .long("customize-sync")
                        .value_parser(clap::value_parser!(bool)),
                )
                .arg(Arg::new("verified").long("verified").action(ArgAction::SetTrue))
                .arg(Arg::new("signed-in").long("signed-in").action(ArgAction::SetTrue))
                .arg(Arg::new("page").long("page").default_value(DEFAULT_PAGE)),
        )
        .subcommand(
            Command::new("config")
                .about("Configuration management")
                .subcommand(Command::new("sample").about("Print a sample configuration"))
                .subcommand(Command::new("validate").about("Validate the loaded configuration")),
        )
        .subcommand(
            Command::new("check-reset-link")
                .about("Validate the parameters of a reset password link")
                .arg(Arg::new("url").required(true)),
        )
        .subcommand(
            Command::new("resume-token")
                .about("Decode a resume token")
                .arg(Arg::new("token").required(true))
                .arg(
                    Arg::new("fields")
                        .long("fields")
                        .value_delimiter(',')
                        .help("Only keep these fields"),
                ),
        )
}

fn describe(config: &BrokerConfig, matches: &ArgMatches) -> Result<()> {
    let registry: VariantRegistry = config.build_registry()?;
    let type_name = required(matches, "type")?;
    let variant = registry.get(type_name)?;

    println!("type:    {}", variant.type_name());
    println!("parent:  {}", variant.parent().unwrap_or("-"));
    println!("channel: {:?}", variant.channel());
    println!();
    println!("commands:");
    for (command, wire) in variant.commands() {
        println!("    {:<18} {}", command.as_str(), wire);
    }
    println!();
    println!("capabilities:");
    for (name, value) in variant.capabilities().iter() {
        println!("    {:<42} {}", name, value);
    }
    println!();
    println!("hooks:");
    for (hook, behavior) in variant.behaviors().iter() {
        let effects: Vec<String> = variant
            .side_effects(hook)
            .iter()
            .map(|e| format!("{:?}", e))
            .collect();
        println!(
            "    {:<36} {:<50} {}",
            hook.as_str(),
            serde_json::to_string(behavior)?,
            effects.join(", ")
        );
    }
    Ok(())
}

async fn dispatch(config: &BrokerConfig, matches: &ArgMatches) -> Result<()> {
    let registry = config.build_registry()?;
    let type_name = required(matches, "type")?;
    let hook: Hook = required(matches, "hook")?.parse()?;
    let page = required(matches, "page")?;

    let mut account =
        Account::new(required(matches, "email")?).verified(matches.get_flag("verified"));
    if let Some(uid) = matches.get_one::<String>("uid") {
        account = account.with_uid(uid);
    }
    if let Some(customize_sync) = matches.get_one::<bool>("customize-sync") {
        account = account.with_customize_sync(*customize_sync);
    }

    let window = Arc::new(MemoryWindow::new(page));
    let broker = Broker::from_registry(
        &registry,
        type_name,
        window.clone(),
        config.channel_options(),
    )?;
    broker.on_error(Arc::new(|e: &ChannelError| eprintln!("channel error: {}", e)));

    let behavior = broker.dispatch(hook, &account).await?;
    for message in window.sent_messages() {
        println!("sent: {}", serde_json::to_string(&message)?);
    }
    println!("behavior: {}", serde_json::to_string(behavior.as_ref())?);
    println!(
        "transition: {}",
        serde_json::to_string(&behavior.evaluate(matches.get_flag("signed-in")))?
    );
    Ok(())
}

fn check_reset_link(matches: &ArgMatches) -> Result<()> {
    let url = url::Url::parse(required(matches, "url")?)?;
    let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let info = ResetPasswordVerification::from_query(&params);
    match info.validate() {
        Ok(()) => println!("Reset link for {} is valid", info.email.unwrap_or_default()),
        Err(e) => anyhow::bail!("Reset link is invalid: {}", e),
    }
    Ok(())
}

/// Model holding whatever fields were asked for on the command line
struct FieldSelection<'a> {
    fields: Vec<&'a str>,
    values: Map<String, Value>,
}

impl ResumeTokenModel for FieldSelection<'_> {
    fn resume_token_fields(&self) -> &[&str] {
        &self.fields
    }

    fn get_value(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set_values(&mut self, values: Map<String, Value>) {
        self.values.extend(values);
    }
}

fn resume_token(matches: &ArgMatches) -> Result<()> {
    let token = ResumeToken::try_from_stringified(required(matches, "token")?)?;
    let output = match matches.get_many::<String>("fields") {
        Some(fields) => {
            let mut selection = FieldSelection {
                fields: fields.map(String::as_str).collect(),
                values: Map::new(),
            };
            populate_from_resume_token(&mut selection, &token, &LogReporter);
            Value::Object(selection.values)
        }
        None => serde_json::to_value(&token)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>", name))
}
