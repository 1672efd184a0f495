//! 拡張コマンド

/// 拡張コマンド
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 論理スタック（awaitチェーン）表示
    AwaitableBacktrace,
    /// 最内フレームで式を評価し、プリンタを通して表示
    Print(String),
    /// 登録済みプリンタの一覧
    Printers,
    /// ヘルプ表示
    Help,
}

/// コマンドの登録情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
}

/// 登録するコマンドの一覧
pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        name: "abt",
        aliases: &[],
        usage: "abt",
        help: "Print a backtrace for the current awaitable function",
    },
    CommandInfo {
        name: "print",
        aliases: &["p"],
        usage: "print <expr>",
        help: "Evaluate an expression in the innermost frame using the registered printers",
    },
    CommandInfo {
        name: "printers",
        aliases: &[],
        usage: "printers",
        help: "List registered printers in lookup order",
    },
    CommandInfo {
        name: "help",
        aliases: &["h", "?"],
        usage: "help",
        help: "Show this help message",
    },
];

impl Command {
    /// コマンド文字列をパースする
    ///
    /// 引数が足りない場合も None を返します。
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };

        match head {
            "abt" => Some(Command::AwaitableBacktrace),
            "print" | "p" => {
                if rest.is_empty() {
                    None
                } else {
                    Some(Command::Print(rest.to_string()))
                }
            }
            "printers" => Some(Command::Printers),
            "help" | "h" | "?" => Some(Command::Help),
            _ => None,
        }
    }
}
