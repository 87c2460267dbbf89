use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use whw::{inspect_file, Host, HostOptions, MemorySource, StdSystem};
use whw_runtime::{layout, BindingMode};

/// whw: random-access stores over isolated linear memory.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the store header size and field offsets
    Layout,
    /// Resolve the store surface of a WebAssembly module
    Inspect {
        /// Store module (.wasm)
        module: PathBuf,
    },
    /// Write a payload, read it back, and compare
    Smoke(SmokeArgs),
}

#[derive(clap::Args, Debug)]
struct SmokeArgs {
    /// Take heap base, binding and memory size from this module
    #[arg(long)]
    module: Option<PathBuf>,

    /// Tail length in bytes
    #[arg(long, default_value_t = 32)]
    tail: u32,

    /// Logical offset of the payload
    #[arg(long, default_value_t = 8)]
    offset: u32,

    /// Payload
    #[arg(long, default_value = "hello")]
    data: String,

    /// Extent window to format the store with
    #[arg(long, default_value_t = 0)]
    extent_capacity: u32,

    /// Keep the extended store in this file
    #[arg(long)]
    backing_file: Option<PathBuf>,

    /// Bind through the system interface
    #[arg(long)]
    system_interface: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Layout => print_layout(),
        Command::Inspect { module } => inspect(&module)?,
        Command::Smoke(args) => smoke(args)?,
    }
    Ok(())
}

fn print_layout() {
    println!("header_size {}", layout::header_size());
    for (name, offset) in layout::FIELDS {
        println!("  {offset:>3}  {name}");
    }
}

fn inspect(module: &std::path::Path) -> Result<()> {
    let surface = inspect_file(module)?;
    println!("binding      {:?}", surface.binding);
    match &surface.memory {
        MemorySource::Imported {
            module_name,
            name,
            limits,
        } => println!(
            "memory       imported {module_name}.{name} ({} pages)",
            limits.initial_pages
        ),
        MemorySource::Exported { name, limits } => {
            println!("memory       exported {name} ({} pages)", limits.initial_pages)
        }
    }
    match surface.heap_base {
        Some(base) => println!("heap_base    {base}"),
        None => println!("heap_base    (not exported)"),
    }
    println!("sizeof       {}", surface.sizeof_export);
    println!("write        {}", surface.write_export);
    println!("read         {}", surface.read_export);
    if let Some(init) = &surface.init_export {
        println!("init         {init}");
    }
    if !surface.system_imports.is_empty() {
        println!("system       {}", surface.system_imports.join(", "));
    }
    Ok(())
}

fn smoke(args: SmokeArgs) -> Result<()> {
    let mut options = HostOptions {
        tail_len: args.tail,
        extent_capacity: args.extent_capacity,
        backing_file: args.backing_file,
        ..HostOptions::default()
    };
    if let Some(module) = &args.module {
        options.adopt(&inspect_file(module)?);
    }
    if args.system_interface {
        options.binding = BindingMode::SystemInterface;
    }

    let mut host = Host::new(options)?;
    let mut sys = StdSystem::from_env();
    host.initialize(&mut sys)?;
    host.init_store()?;

    let report = host.smoke(args.data.as_bytes(), args.offset)?;
    if !report.matches(args.data.as_bytes()) {
        bail!(
            "read back {:?}, expected {:?}",
            String::from_utf8_lossy(&report.read_back),
            args.data
        );
    }

    if host.instance().mode() == BindingMode::SystemInterface {
        host.announce(&mut sys, &report)?;
    } else {
        println!(
            "read {} bytes at offset {}: {}",
            report.read,
            report.offset,
            String::from_utf8_lossy(&report.read_back)
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["whw", "smoke"]);
        let Command::Smoke(args) = cli.command else {
            panic!("expected smoke");
        };
        assert_eq!(args.tail, 32);
        assert_eq!(args.offset, 8);
        assert_eq!(args.data, "hello");
        assert!(!args.system_interface);
        assert!(args.module.is_none());
    }

    #[test]
    fn cli_parses_inspect() {
        let cli = Cli::parse_from(["whw", "inspect", "store.wasm"]);
        assert!(matches!(cli.command, Command::Inspect { module } if module == PathBuf::from("store.wasm")));
    }

    #[test]
    fn cli_parses_smoke_flags() {
        let cli = Cli::parse_from([
            "whw",
            "smoke",
            "--extent-capacity",
            "4096",
            "--offset",
            "100",
            "--system-interface",
        ]);
        let Command::Smoke(args) = cli.command else {
            panic!("expected smoke");
        };
        assert_eq!(args.extent_capacity, 4096);
        assert_eq!(args.offset, 100);
        assert!(args.system_interface);
    }
}
