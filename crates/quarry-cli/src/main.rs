#![forbid(unsafe_code)]

use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use quarry_config::RegistryConfig;
use quarry_engine::{Descriptor, NullMonitor, Registry, Repository};
use quarry_util::maven::Coordinate;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type CliResult = Result<(), Box<dyn Error>>;

/// Configuration picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG: &str = "quarry.toml";

#[derive(Debug, Parser)]
#[command(name = "quarry", about = "Resolve Maven artifacts and their descriptors")]
#[command(version)]
struct Cli {
    /// Path to a quarry.toml (defaults to ./quarry.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a descriptor and print its effective model
    Resolve {
        /// group:artifact[:classifier]:version, where version may be a range,
        /// a {regex}, RELEASE, LATEST or SNAPSHOT
        coordinate: String,
    },
    /// List published versions of an artifact
    Versions {
        /// group:artifact
        coordinate: String,
        /// Only list versions matching this range or {regex}
        filter: Option<String>,
    },
    /// List the registered repositories in search order
    Repos,
    /// Download the artifact's binary file and print its path
    Fetch {
        /// group:artifact[:classifier]:version
        coordinate: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(cli);
    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging unavailable: {e}");
    }
}

fn run(cli: Cli) -> CliResult {
    let config = load_config(cli.config.as_deref(), Path::new(DEFAULT_CONFIG))?;
    let registry = Registry::with_http(&config)?;

    match cli.command {
        Command::Resolve { coordinate } => cmd_resolve(&registry, &coordinate),
        Command::Versions { coordinate, filter } => {
            cmd_versions(&registry, &coordinate, filter.as_deref())
        }
        Command::Repos => cmd_repos(&registry),
        Command::Fetch { coordinate } => cmd_fetch(&registry, &coordinate),
    }
}

/// The explicit configuration, else `fallback` if it exists, else defaults.
fn load_config(explicit: Option<&Path>, fallback: &Path) -> Result<RegistryConfig, Box<dyn Error>> {
    match explicit {
        Some(path) => Ok(RegistryConfig::from_path(path)?),
        None if fallback.is_file() => Ok(RegistryConfig::from_path(fallback)?),
        None => Ok(RegistryConfig::default()),
    }
}

fn resolve(registry: &Registry, raw: &str) -> Result<std::sync::Arc<Descriptor>, Box<dyn Error>> {
    let coordinate = Coordinate::parse(raw)?;
    registry
        .try_resolve(&NullMonitor, None, &coordinate)
        .map_err(|e| format!("cannot resolve {coordinate}: {e}").into())
}

fn cmd_resolve(registry: &Registry, raw: &str) -> CliResult {
    let descriptor = resolve(registry, raw)?;
    print!("{}", render_descriptor(&descriptor));
    Ok(())
}

fn cmd_versions(registry: &Registry, raw: &str, filter: Option<&str>) -> CliResult {
    let coordinate = Coordinate::parse(raw)?;
    let filter = filter.unwrap_or_else(|| coordinate.version());
    let versions = registry.list_versions(&NullMonitor, &coordinate, filter)?;
    if versions.is_empty() {
        return Err(format!("no versions of {} found", coordinate.id()).into());
    }
    for version in versions {
        println!("{version}");
    }
    Ok(())
}

fn cmd_repos(registry: &Registry) -> CliResult {
    let mut all = registry.repositories();
    all.push(std::sync::Arc::clone(registry.local_repository()));
    for repo in &all {
        println!("{}", render_repository(repo));
    }
    Ok(())
}

fn cmd_fetch(registry: &Registry, raw: &str) -> CliResult {
    let descriptor = resolve(registry, raw)?;
    let path = registry.artifact_file(&NullMonitor, &descriptor)?;
    eprintln!("    Fetched {descriptor}");
    println!("{}", path.display());
    Ok(())
}

fn render_descriptor(descriptor: &Descriptor) -> String {
    let mut out = String::new();
    let source = descriptor
        .source()
        .map_or_else(|| "?".to_owned(), |r| r.id().to_owned());
    let _ = writeln!(out, "{descriptor} ({}) from {source}", descriptor.packaging());
    if let Some(name) = descriptor.name() {
        let _ = writeln!(out, "  name: {name}");
    }
    if let Some(url) = descriptor.url() {
        let _ = writeln!(out, "  url: {url}");
    }
    for license in descriptor.licenses() {
        let label = match (&license.name, &license.url) {
            (Some(name), Some(url)) => format!("{name} <{url}>"),
            (Some(name), None) => name.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => continue,
        };
        let _ = writeln!(out, "  license: {label}");
    }
    for ancestor in descriptor.lineage().skip(1) {
        let _ = writeln!(out, "  parent: {ancestor}");
    }
    for import in descriptor.imports() {
        let _ = writeln!(out, "  import: {import}");
    }

    let dependencies = descriptor.dependencies();
    if !dependencies.is_empty() {
        let _ = writeln!(out, "  dependencies:");
        for dependency in dependencies {
            let _ = writeln!(out, "    {} ({})", dependency.coordinate, dependency.scope);
        }
    }
    out
}

fn render_repository(repo: &Repository) -> String {
    let mut line = format!(
        "{:<20} {:<8} {:>6}  {}",
        repo.id(),
        repo.kind().label(),
        repo.order(),
        repo.url()
    );
    if !repo.is_enabled() {
        line.push_str("  (disabled)");
    }
    if !repo.scopes().is_empty() {
        let _ = write!(line, "  [{}]", repo.scopes().join(", "));
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;
    use quarry_config::BuiltinRepository;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_resolve() {
        let cli = Cli::try_parse_from(["quarry", "resolve", "org.slf4j:slf4j-api:[2.0,)"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
        match cli.command {
            Command::Resolve { coordinate } => assert_eq!(coordinate, "org.slf4j:slf4j-api:[2.0,)"),
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[test]
    fn parse_resolve_requires_coordinate() {
        let err = Cli::try_parse_from(["quarry", "resolve"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parse_versions_with_filter() {
        let cli = Cli::try_parse_from(["quarry", "versions", "com.h2database:h2", "[2.0,)"]).unwrap();
        match cli.command {
            Command::Versions { coordinate, filter } => {
                assert_eq!(coordinate, "com.h2database:h2");
                assert_eq!(filter.as_deref(), Some("[2.0,)"));
            }
            other => panic!("expected Versions, got {other:?}"),
        }
    }

    #[test]
    fn parse_versions_without_filter() {
        let cli = Cli::try_parse_from(["quarry", "versions", "com.h2database:h2"]).unwrap();
        match cli.command {
            Command::Versions { filter, .. } => assert!(filter.is_none()),
            other => panic!("expected Versions, got {other:?}"),
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quarry",
            "fetch",
            "g:a:1",
            "--config",
            "/etc/quarry.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/quarry.toml")));
        match cli.command {
            Command::Fetch { coordinate } => assert_eq!(coordinate, "g:a:1"),
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[test]
    fn parse_repos() {
        let cli = Cli::try_parse_from(["quarry", "repos"]).unwrap();
        assert!(matches!(cli.command, Command::Repos));
    }

    #[test]
    fn parse_unknown_subcommand() {
        let err = Cli::try_parse_from(["quarry", "publish"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn load_config_prefers_explicit_then_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let fallback = dir.path().join("quarry.toml");
        std::fs::write(&explicit, "jdk_version = \"21\"\n").unwrap();
        std::fs::write(&fallback, "jdk_version = \"11\"\n").unwrap();

        assert_eq!(load_config(Some(&explicit), &fallback).unwrap().jdk_version, "21");
        assert_eq!(load_config(None, &fallback).unwrap().jdk_version, "11");

        let missing = dir.path().join("absent.toml");
        assert_eq!(load_config(None, &missing).unwrap(), RegistryConfig::default());
        assert!(load_config(Some(&missing), &fallback).is_err());
    }

    fn write_pom(root: &Path, group: &str, artifact: &str, version: &str, body: &str) {
        let dir = root
            .join(group.replace('.', "/"))
            .join(artifact)
            .join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{artifact}-{version}.pom")),
            format!(
                "<project><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
                 <version>{version}</version>{body}</project>"
            ),
        )
        .unwrap();
    }

    #[test]
    fn resolve_and_render_from_file_repository() {
        let remote = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write_pom(
            remote.path(),
            "org.acme",
            "parent",
            "3",
            "<packaging>pom</packaging>",
        );
        write_pom(
            remote.path(),
            "org.acme",
            "tool",
            "1.4",
            r"<parent><groupId>org.acme</groupId><artifactId>parent</artifactId><version>3</version></parent>
              <name>Acme   Tool</name>
              <licenses><license><name>MIT</name></license></licenses>
              <dependencies>
                <dependency><groupId>org.acme</groupId><artifactId>core</artifactId><version>1.4</version></dependency>
                <dependency><groupId>junit</groupId><artifactId>junit</artifactId><version>4.13</version><scope>test</scope></dependency>
              </dependencies>",
        );

        let mut config = RegistryConfig::with_data_dir(data.path());
        config.repositories = vec![BuiltinRepository {
            id: "files".to_owned(),
            name: None,
            url: format!("file://{}/", remote.path().display()),
            order: 0,
            scopes: Vec::new(),
        }];
        let registry = Registry::with_http(&config).unwrap();

        let rendered = render_descriptor(&resolve(&registry, "org.acme:tool:1.4").unwrap());
        assert_eq!(
            rendered,
            "org.acme:tool:1.4 (jar) from files\n\
             \x20 name: Acme Tool\n\
             \x20 license: MIT\n\
             \x20 parent: org.acme:parent:3\n\
             \x20 dependencies:\n\
             \x20   org.acme:core:1.4 (compile)\n"
        );

        let repos: Vec<String> = registry
            .repositories()
            .iter()
            .map(|r| render_repository(r))
            .collect();
        assert_eq!(repos.len(), 1);
        assert!(repos.first().unwrap().starts_with("files"));
        assert!(resolve(&registry, "org.acme:missing:1").is_err());
    }
}
