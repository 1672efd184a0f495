//! Coroscope CLI - コマンドラインインターフェース
//!
//! ELFバイナリのデバッグ情報を読み込み、アドレス解決やシンボル検索、
//! 型消去エグゼキュータの保持型の一覧をREPLで提供します。

use anyhow::Result;
use clap::Parser;
use coroscope_core::parse::parse_address;
use coroscope_core::{CommandError, DecodeConfig, Extension, ExtensionConfig, WalkConfig};
use coroscope_dwarf::{ElfSymbolizer, Symbol};
use coroscope_target::{DebugInfoProvider, MemoryImage, SnapshotTarget, TypeTable};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Coroscope - asio awaitable and executor inspector
#[derive(Parser)]
#[command(name = "coroscope")]
#[command(version)]
#[command(about = "Inspect C++20 awaitable chains and type-erased asio executors", long_about = None)]
struct Cli {
    /// Path to the ELF binary with debug information
    binary: String,

    /// Runtime load address minus link-time address (for PIE binaries)
    #[arg(long, value_parser = parse_address, default_value = "0")]
    load_bias: u64,

    /// Maximum number of awaitable frames to walk
    #[arg(long, default_value_t = 256)]
    max_depth: usize,

    /// Print only the file name instead of the full path
    #[arg(long)]
    basename_only: bool,

    /// Extra function-table symbol pattern; capture group 1 is the target type (repeatable)
    #[arg(long = "table-pattern", value_name = "REGEX")]
    table_patterns: Vec<String>,

    /// Log filter (overrides RUST_LOG, default: warn)
    #[arg(long)]
    log_level: Option<String>,
}

/// 読み込んだバイナリに対するセッション
struct Session {
    host: SnapshotTarget<ElfSymbolizer>,
    extension: Extension,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    println!("Coroscope - asio awaitable and executor inspector");
    println!("Version {}", env!("CARGO_PKG_VERSION"));
    println!();

    let session = init_session(&cli)?;
    run_repl(&session)?;

    Ok(())
}

/// ログ出力を初期化する
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// バイナリを読み込み、拡張を初期化する
fn init_session(cli: &Cli) -> Result<Session> {
    println!("Loading binary: {}", cli.binary);

    let symbolizer = ElfSymbolizer::load(&cli.binary)?.with_load_bias(cli.load_bias);
    info!(
        binary = %cli.binary,
        symbols = symbolizer.symbols().all_symbols().count(),
        pie = symbolizer.symbols().is_pie(),
        "loaded debug information"
    );
    if symbolizer.symbols().is_pie() && cli.load_bias == 0 {
        println!("Note: binary is position independent; pass --load-bias to resolve runtime addresses");
    }

    // ライブのプロセスがないので、メモリと物理スタックは空
    let host = SnapshotTarget::with_symbolizer(MemoryImage::new(), TypeTable::new(), symbolizer);

    let extension = Extension::init(ExtensionConfig {
        walk: WalkConfig {
            max_depth: cli.max_depth,
            basename_only: cli.basename_only,
        },
        decode: DecodeConfig {
            extra_table_patterns: cli.table_patterns.clone(),
            ..DecodeConfig::default()
        },
        ..ExtensionConfig::default()
    })?;

    println!("Loaded DWARF information from {}", cli.binary);
    println!();
    Ok(Session { host, extension })
}

/// REPLループを実行する
fn run_repl(session: &Session) -> Result<()> {
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("(coroscope) ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match handle_command(session, line) {
                    Ok(true) => {}
                    Ok(false) => {
                        println!("Goodbye!");
                        break;
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

/// コマンドを処理する（終了コマンドならfalse）
fn handle_command(session: &Session, line: &str) -> Result<bool> {
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match (head, rest) {
        ("quit" | "q" | "exit", _) => return Ok(false),
        ("resolve" | "r", addr) if !addr.is_empty() => handle_resolve(session, addr)?,
        ("find", pattern) if !pattern.is_empty() => {
            let symbols = session.host.symbolizer().symbols().find_symbols(pattern);
            let title = format!("Symbols matching '{}'", pattern);
            print_symbol_list(&title, &symbols, Some(10));
        }
        ("match", type_name) if !type_name.is_empty() => handle_match(session, type_name),
        ("tables", _) => handle_tables(session),
        ("help" | "h" | "?", _) => print_help(session),
        _ => handle_extension_command(session, line),
    }

    Ok(true)
}

/// アドレスを関数・ファイル・行に解決する
fn handle_resolve(session: &Session, addr: &str) -> Result<()> {
    let address = parse_address(addr)?;
    match session.host.resolve(address) {
        Ok(location) => println!(
            "0x{:016x} {} at {}:{}",
            address, location.function_name, location.file, location.line
        ),
        Err(e) => {
            // 行情報がなくてもシンボル名だけは表示する
            match session.host.symbolizer().symbol_at(address) {
                Some(symbol) => println!("0x{:016x} {} (no line info)", address, symbol.display_name()),
                None => println!("{}", e),
            }
        }
    }
    Ok(())
}

/// 型名にマッチするプリンタを表示する
fn handle_match(session: &Session, type_name: &str) {
    match session.extension.printers().lookup(type_name) {
        Some(printer) => println!("'{}' is printed by '{}' ({:?})", type_name, printer.name, printer.kind),
        None => println!("No printer matches '{}'", type_name),
    }
}

/// バイナリ内の関数テーブルから、型消去されうる保持型を列挙する
fn handle_tables(session: &Session) {
    let decoder = session.extension.printers().type_erasure();
    let mut targets: Vec<(String, u64)> = session
        .host
        .symbolizer()
        .symbols()
        .all_symbols()
        .filter_map(|symbol| {
            decoder
                .target_type_name(&format!("<{}>", symbol.display_name()))
                .map(|target| (target, symbol.address))
        })
        .collect();
    targets.sort();
    targets.dedup_by(|a, b| a.0 == b.0);
    debug!(count = targets.len(), "scanned function tables");

    if targets.is_empty() {
        println!("No type-erased executor targets found");
        return;
    }
    println!("Type-erased executor targets ({} found):", targets.len());
    for (i, (target, address)) in targets.iter().enumerate() {
        println!("  {}. {} (table @ 0x{:x})", i + 1, target, address);
    }
}

/// 拡張に登録されたコマンドを実行する
fn handle_extension_command(session: &Session, line: &str) {
    match session.extension.invoke(&session.host, line) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(CommandError::UnknownCommand(name)) => {
            println!("Unknown command: {}", name);
            println!("Type 'help' for available commands.");
        }
        Err(e) => println!("Error: {}", e),
    }
}

/// シンボルリストを表示するヘルパー関数
fn print_symbol_list(title: &str, symbols: &[Symbol], limit: Option<usize>) {
    if symbols.is_empty() {
        println!("No {} found", title);
        return;
    }

    let display_limit = limit.unwrap_or(symbols.len());
    println!("{} ({} found):", title, symbols.len());

    for (i, sym) in symbols.iter().take(display_limit).enumerate() {
        if sym.size > 0 {
            println!("  {}. {} @ 0x{:x} (size: {})", i + 1, sym.display_name(), sym.address, sym.size);
        } else {
            println!("  {}. {} @ 0x{:x}", i + 1, sym.display_name(), sym.address);
        }
    }

    if symbols.len() > display_limit {
        println!("  ... and {} more", symbols.len() - display_limit);
    }
}

fn print_help(session: &Session) {
    println!("Available commands:");
    println!();
    println!("  help             - Show this help message");
    println!("  quit/exit/q      - Exit");
    println!();
    println!("Binary commands:");
    println!("  resolve <addr>   - Resolve a runtime address to function, file and line");
    println!("  find <pattern>   - Find symbols matching pattern");
    println!("  tables           - List target types of type-erased executors in the binary");
    println!("  match <type>     - Show which printer handles a type name");
    println!();
    println!("Extension commands:");
    for info in session.extension.commands() {
        println!("  {:<16} - {}", info.usage, info.help);
    }
    println!();
    println!("Examples:");
    println!("  resolve 0x555555559a10");
    println!("  find awaitable_frame_base");
    println!("  match asio::any_io_executor");
}
