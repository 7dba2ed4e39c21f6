mod cli;

use std::path::Path;
use std::sync::Arc;

use layerconf_core::{
    AdminSession, ConfigEntry, ConfigValue, DefaultValue, EmptyTree, GlobalTree, JsonFileStore,
    Resolver, ResolverOptions, Schema,
};

const NAMESPACE: &str = "layerconf";

fn demo_schema() -> Schema {
    Schema::new()
        .with(
            "backend",
            ConfigEntry::String {
                default: Some(DefaultValue::Static("https://api.example.com".into())),
            },
        )
        .with(
            "theme",
            ConfigEntry::StringEnum {
                members: vec!["light".to_owned(), "dark".to_owned(), "system".to_owned()],
                default: Some(DefaultValue::Static("system".into())),
            },
        )
        .with(
            "page_size",
            ConfigEntry::Number {
                min: Some(1.0),
                max: Some(100.0),
                default: Some(DefaultValue::Static(25.0.into())),
            },
        )
        .with(
            "beta_banner",
            ConfigEntry::Boolean {
                default: Some(DefaultValue::Static(false.into())),
            },
        )
        .with(
            "proxy",
            ConfigEntry::Custom {
                parser: Arc::new(|raw| {
                    let host = raw
                        .get("host")
                        .and_then(serde_json::Value::as_str)
                        .ok_or_else(|| anyhow::anyhow!("proxy needs a string 'host'"))?;
                    let port = raw
                        .get("port")
                        .and_then(serde_json::Value::as_u64)
                        .ok_or_else(|| anyhow::anyhow!("proxy needs a numeric 'port'"))?;
                    Ok(ConfigValue::Json(
                        serde_json::json!({ "host": host, "port": port }),
                    ))
                }),
                default: Some(DefaultValue::Static(ConfigValue::Json(serde_json::json!({
                    "host": "localhost",
                    "port": 3128,
                })))),
            },
        )
}

fn load_tree(path: &str) -> anyhow::Result<Arc<dyn GlobalTree>> {
    if !Path::new(path).exists() {
        tracing::debug!(path, "no globals file, resolving from overrides and defaults");
        return Ok(Arc::new(EmptyTree));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("failed to read globals '{path}': {err}"))?;
    let tree: serde_json::Value = serde_json::from_str(&content)
        .map_err(|err| anyhow::anyhow!("failed to parse globals '{path}': {err}"))?;
    Ok(Arc::new(tree))
}

/// CLI values arrive as text; anything that decodes as JSON is passed
/// structurally, the rest as a plain string.
fn decode_value(value: &str) -> ConfigValue {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(decoded) => ConfigValue::Json(decoded),
        Err(_) => ConfigValue::String(value.to_owned()),
    }
}

fn print_fields(session: &AdminSession) -> layerconf_core::Result<()> {
    for field in session.fields()? {
        let mut notes = vec![format!("source: {:?}", field.source)];
        if field.is_from_storage {
            notes.push("overridden".to_owned());
        }
        if field.is_editing {
            notes.push("editing".to_owned());
        }
        println!(
            "- {} = {} (type: {}, {})",
            field.path,
            field.value,
            field.kind.as_str(),
            notes.join(", ")
        );
    }
    Ok(())
}

fn run(args: cli::Cli) -> anyhow::Result<()> {
    let resolver = Arc::new(Resolver::new(
        ResolverOptions::new(demo_schema())
            .namespace(NAMESPACE)
            .store(Arc::new(JsonFileStore::open(&args.overrides)))
            .tree(load_tree(&args.globals)?)
            .local_override(!args.no_local_override),
    )?);

    match args.command {
        cli::Command::List => {
            let session = AdminSession::new(resolver);
            print_fields(&session)?;
        }
        cli::Command::Get { key } => {
            let (value, source) = resolver.resolve_with_source(&key)?;
            println!("{value} (source: {source:?})");
        }
        cli::Command::Set { key, value } => {
            let session = AdminSession::new(Arc::clone(&resolver));
            session.stage(&key, decode_value(&value))?;
            session.submit()?;
            let (value, source) = resolver.resolve_with_source(&key)?;
            println!("{key} = {value} (source: {source:?})");
        }
        cli::Command::Unset { key } => {
            resolver.unset(&key)?;
            let (value, source) = resolver.resolve_with_source(&key)?;
            println!("{key} = {value} (source: {source:?})");
        }
        cli::Command::Reset => {
            let session = AdminSession::new(resolver);
            session.reset()?;
            println!("All overrides removed.");
            print_fields(&session)?;
        }
    }

    Ok(())
}

fn main() {
    layerconf_core::logging::init_tracing("warn");

    let args = cli::Cli::parse_args();
    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
