mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use fp_av::{CapabilityCatalog, DependencyProvisioner, FfmpegFramework, Framework, MediaStream};
use fp_core::{Config, Platform};
use fp_pipeline::{CommandStatus, Job, JobState, PluginRegistry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "forgepack=trace,fp_pipeline=trace,fp_av=debug,fp_core=debug".to_string()
        } else {
            "forgepack=info,fp_pipeline=info,fp_av=warn,fp_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run {
            input,
            plugins,
            dry_run,
        } => run_file(&input, config_path, plugins, dry_run),
        Commands::Probe { file, json } => probe_file(&file, config_path, json),
        Commands::Codecs { json } => list_codecs(config_path, json),
        Commands::Formats { json } => list_formats(config_path, json),
        Commands::Provision { names } => provision(config_path, names),
        Commands::CheckTools => check_tools(config_path),
        Commands::Status { state_file, json } => show_status(&state_file, json),
        Commands::Plugins => list_plugins(),
        Commands::Version => {
            println!("forgepack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load_or_default(path).context("failed to load configuration")
}

fn bind_framework(config: &Config) -> Result<FfmpegFramework> {
    let provisioner = DependencyProvisioner::new(&config.provisioner);
    FfmpegFramework::bind(&provisioner, &Platform::current(), &config.probe)
        .context("failed to bind the ffmpeg framework")
}

fn run_file(
    input: &Path,
    config_path: Option<&Path>,
    requested: Vec<String>,
    dry_run: bool,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let config = load_config(config_path)?;
    let framework: Arc<dyn Framework> = Arc::new(bind_framework(&config)?);
    let registry = PluginRegistry::with_builtins();

    let names: Vec<String> = if !requested.is_empty() {
        requested
    } else if !config.plugins.is_empty() {
        config.plugins.keys().cloned().collect()
    } else {
        registry.names().into_iter().map(String::from).collect()
    };

    let mut job = Job::open(input, &config.job, framework)
        .with_context(|| format!("failed to open job for {}", input.display()))?;
    for name in &names {
        let plugin = registry.create(name, &config.plugin_options(name))?;
        job.attach(plugin)
            .with_context(|| format!("failed to attach plugin '{name}'"))?;
    }

    println!("Job {} -> {}", job.id(), job.output_dir().display());
    println!("Plugins: {}", job.plugin_names().join(", "));
    println!("Commands: {}", job.commands().len());
    for (i, cmd) in job.commands().iter().enumerate() {
        println!("  {}. {} ({})", i + 1, cmd.name(), cmd.dependency());
    }

    if dry_run {
        let cancelled = job.cancel_pending()?;
        job.close()?;
        println!("\n[DRY RUN] Would execute {cancelled} commands");
        return Ok(());
    }

    let result = job.run();
    let state = job.close()?;
    println!(
        "\n{} succeeded, {} failed, {} cancelled, {} queued",
        state.count(CommandStatus::Succeeded),
        state.count(CommandStatus::Failed),
        state.count(CommandStatus::Cancelled),
        state.count(CommandStatus::Queued),
    );
    println!("State: {}", job.state_path().display());
    result.with_context(|| format!("job {} failed", state.id))
}

fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let config = load_config(config_path)?;
    let framework = bind_framework(&config)?;
    let info = framework.probe(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File: {}", info.source().display());
    if let Some(format) = info.format_name() {
        println!("Format: {format}");
    }
    if let Some(duration) = info.reference_duration() {
        println!("Duration: {duration:.3}s");
    }

    let preferred = info.preferred();
    println!("\nStreams: {}", info.streams().len());
    for stream in info.streams() {
        let id = stream.id();
        let marker = if [preferred.video, preferred.audio, preferred.text].contains(&Some(id)) {
            " [preferred]"
        } else {
            ""
        };
        match stream {
            MediaStream::Video {
                codec,
                width,
                height,
                frame_rate,
                ..
            } => {
                print!("  [{id}] video {codec} {width}x{height}");
                if let Some(fps) = frame_rate {
                    print!(" {fps:.3} fps");
                }
            }
            MediaStream::Audio {
                codec,
                channels,
                bit_rate,
                ..
            } => {
                print!("  [{id}] audio {codec} {channels}ch");
                if *bit_rate > 0 {
                    print!(" {} kb/s", bit_rate / 1000);
                }
            }
            MediaStream::Text {
                codec, language, ..
            } => print!("  [{id}] text {codec} ({language})"),
        }
        println!("{marker}");
    }

    Ok(())
}

fn collect_catalog(config_path: Option<&Path>) -> Result<CapabilityCatalog> {
    let config = load_config(config_path)?;
    let provisioner = DependencyProvisioner::new(&config.provisioner);
    let ffmpeg = provisioner.resolve(FfmpegFramework::FFMPEG, &Platform::current())?;
    CapabilityCatalog::collect(ffmpeg.path()?).context("failed to read ffmpeg capabilities")
}

fn list_codecs(config_path: Option<&Path>, json: bool) -> Result<()> {
    let catalog = collect_catalog(config_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.codecs())?);
        return Ok(());
    }

    for codec in catalog.codecs() {
        let flags = format!(
            "{}{}",
            if codec.can_decode() { 'D' } else { '.' },
            if codec.can_encode() { 'E' } else { '.' }
        );
        println!(
            "{flags} {:<10} {:<20} {}",
            codec.stream_type.to_string(),
            codec.name,
            codec.description
        );
    }
    println!("\n{} codecs", catalog.codecs().len());
    Ok(())
}

fn list_formats(config_path: Option<&Path>, json: bool) -> Result<()> {
    let catalog = collect_catalog(config_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.containers())?);
        return Ok(());
    }

    for container in catalog.containers() {
        println!(
            "{}{} {:<20} {}",
            if container.decode { 'D' } else { '.' },
            if container.encode { 'E' } else { '.' },
            container.extensions.join(","),
            container.description
        );
    }
    println!("\n{} formats", catalog.containers().len());
    Ok(())
}

fn provision(config_path: Option<&Path>, names: Vec<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let provisioner = DependencyProvisioner::new(&config.provisioner);
    let platform = Platform::current();

    let names = if names.is_empty() {
        let mut all: Vec<String> = Vec::new();
        for spec in provisioner.manifest() {
            if spec.platform.matches(&platform) && !all.contains(&spec.name) {
                all.push(spec.name.clone());
            }
        }
        all
    } else {
        names
    };

    for name in &names {
        let dep = provisioner
            .resolve(name, &platform)
            .with_context(|| format!("failed to provision {name}"))?;
        println!(
            "{} {} ({}) - {}",
            dep.name(),
            dep.version()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unversioned".into()),
            dep.state,
            dep.path()?.display()
        );
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let provisioner = DependencyProvisioner::new(&config.provisioner);
    let tools = provisioner.check_all(&Platform::current());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        if let Some(ref error) = tool.error {
            print!(" - {error}");
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them or configure a download url.");
    }

    Ok(())
}

fn show_status(path: &Path, json: bool) -> Result<()> {
    let state = JobState::load(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    println!("Job: {}", state.id);
    println!("Source: {}", state.source.display());
    println!("Output: {}", state.output_dir.display());
    println!("Started: {}", state.started_at.to_rfc3339());
    match (state.finished_at, state.duration_secs) {
        (Some(end), Some(secs)) => println!("Finished: {} ({secs:.1}s)", end.to_rfc3339()),
        (Some(end), None) => println!("Finished: {}", end.to_rfc3339()),
        _ => println!("Finished: -"),
    }
    println!("Plugins: {}", state.plugins.join(", "));

    println!("\nCommands: {}", state.commands.len());
    for cmd in &state.commands {
        println!("  {:<10} {}", cmd.status().to_string(), cmd.name());
    }
    if let Some(failed) = state.failed_command() {
        println!("\nFailed: {}", failed.name());
        for line in failed.log().lines().take(20) {
            println!("  {line}");
        }
    }
    Ok(())
}

fn list_plugins() -> Result<()> {
    let registry = PluginRegistry::with_builtins();
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}
