//! 拡張コマンドのテスト

use coroscope_core::{CommandError, Extension, ExtensionConfig};
use coroscope_target::{
    MemoryImage, SnapshotTarget, SnapshotType, SnapshotValue, StructLayout, SymbolTable,
    TypeTable,
};

const FRAME_BASE: &str = "asio::detail::awaitable_frame_base<asio::any_io_executor>";
const HANDLE: &str = "std::__n4861::coroutine_handle<void>";

/// `echo` が `read_line` を await している状態
fn suspended_target(with_anchor: bool) -> SnapshotTarget {
    let mut types = TypeTable::new();
    types
        .add_struct(StructLayout::new(HANDLE, 8).field("_M_fr_ptr", 0, SnapshotType::Void.pointer()))
        .add_struct(
            StructLayout::new(FRAME_BASE, 0x20)
                .field("coro_", 0, SnapshotType::named(HANDLE))
                .field("caller_", 8, SnapshotType::named(FRAME_BASE).pointer()),
        );

    let mut memory = MemoryImage::new();
    memory.map_zeroed(0x1000, 0x100);
    // 活性化レコード
    memory.store(0x1000, 0x1080u64).unwrap();
    memory.store(0x1008, 0x1020u64).unwrap();
    memory.store(0x1020, 0x1090u64).unwrap();
    // コルーチンフレームの先頭ワード
    memory.store(0x1080, 0x5555_0000_4a10u64).unwrap();
    memory.store(0x1090, 0x5555_0000_4c24u64).unwrap();
    // this
    memory.store(0x10f0, 0x1000u64).unwrap();

    let mut symbols = SymbolTable::new();
    symbols
        .add_function("read_line(asio::ip::tcp::socket&)", 0x5555_0000_4a00, 0x100, "/src/echo/line.cpp", 17)
        .add_function("echo(asio::ip::tcp::socket)", 0x5555_0000_4c00, 0x100, "/src/echo/main.cpp", 42);

    let mut target = SnapshotTarget::with_symbolizer(memory, types, symbols);
    target.push_frame(
        "read_line(asio::ip::tcp::socket&) [clone .actor]",
        0x5555_0000_4a10,
        vec![(
            "frame".to_string(),
            SnapshotValue::at(0x1000, SnapshotType::named(FRAME_BASE)),
        )],
    );
    if with_anchor {
        target.push_frame(
            format!("{}::resume()", FRAME_BASE),
            0x5555_0000_9000,
            vec![(
                "this".to_string(),
                SnapshotValue::at(0x10f0, SnapshotType::named(FRAME_BASE).pointer()),
            )],
        );
    }
    target.push_frame("main", 0x5555_0000_1000, Vec::new());
    target
}

#[test]
fn test_abt() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let target = suspended_target(true);

    let lines = extension.invoke(&target, "abt").unwrap();
    assert_eq!(
        lines,
        vec![
            "#0   0x0000555500004a10 read_line(asio::ip::tcp::socket&) at /src/echo/line.cpp:17",
            "#1   0x0000555500004c24 echo(asio::ip::tcp::socket) at /src/echo/main.cpp:42",
        ]
    );
}

#[test]
fn test_abt_basename_only() {
    let mut config = ExtensionConfig::default();
    config.walk.basename_only = true;
    let extension = Extension::init(config).unwrap();

    let lines = extension.invoke(&suspended_target(true), "abt").unwrap();
    assert!(lines[0].ends_with("at line.cpp:17"));
    assert!(lines[1].ends_with("at main.cpp:42"));
}

#[test]
fn test_abt_outside_coroutine() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let lines = extension.invoke(&suspended_target(false), "abt").unwrap();
    assert_eq!(lines, vec!["not in an awaitable"]);
}

#[test]
fn test_abt_unreadable_receiver() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let source = suspended_target(true);
    let mut memory = source.memory().clone();
    memory.store(0x10f0, 0xdead_0000u64).unwrap();

    let mut target = SnapshotTarget::with_symbolizer(memory, source.types().clone(), source.symbolizer().clone());
    target.push_frame(
        format!("{}::resume()", FRAME_BASE),
        0x5555_0000_9000,
        vec![(
            "this".to_string(),
            SnapshotValue::at(0x10f0, SnapshotType::named(FRAME_BASE).pointer()),
        )],
    );

    let lines = extension.invoke(&target, "abt").unwrap();
    assert_eq!(
        lines,
        vec!["(cannot read the current awaitable frame: cannot access memory at address 0xdead0000)"]
    );
}

#[test]
fn test_print_expression() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let target = suspended_target(true);

    let lines = extension.invoke(&target, "print frame.caller_").unwrap();
    assert_eq!(lines, vec![format!("frame.caller_ = ({} *) 0x1020", FRAME_BASE)]);

    let lines = extension.invoke(&target, "p frame.caller_->coro_").unwrap();
    assert_eq!(lines, vec![format!("frame.caller_->coro_ = {} @ 0x1020", HANDLE)]);
}

#[test]
fn test_print_errors() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let target = suspended_target(true);

    assert!(matches!(
        extension.invoke(&target, "print nothing"),
        Err(CommandError::Target(_))
    ));
    assert!(matches!(
        extension.invoke(&target, "print"),
        Err(CommandError::MissingArgument { command: "print", .. })
    ));
    assert!(matches!(
        extension.invoke(&target, "print a[1]"),
        Err(CommandError::InvalidExpression(_))
    ));
}

#[test]
fn test_unknown_command() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let target = suspended_target(true);

    match extension.invoke(&target, "bt full") {
        Err(CommandError::UnknownCommand(name)) => assert_eq!(name, "bt"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_help_and_printers() {
    let extension = Extension::init(ExtensionConfig::default()).unwrap();
    let target = suspended_target(true);

    let help = extension.invoke(&target, "help").unwrap();
    assert_eq!(help.len(), extension.commands().len());
    assert!(help[0].contains("abt"));

    let printers = extension.invoke(&target, "printers").unwrap();
    assert_eq!(printers.len(), 4);
    assert!(printers[3].contains("io_context executor"));
}
